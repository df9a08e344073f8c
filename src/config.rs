use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// URL scheme that selects the in-process record store instead of PostgreSQL
pub const MEMORY_STORE_URL: &str = "memory://";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
    pub run_migrations: bool,
}

/// Retry policy applied to transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_ms: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub log_level: String,
    pub http_port: u16,
    pub environment: String,
    pub models_dir: PathBuf,
    pub features_dir: PathBuf,
    pub audit_log_dir: Option<PathBuf>,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let config = Self {
            url,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30),
            idle_timeout_secs: parse_env("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600), // 10 minutes
            max_lifetime_secs: parse_env("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800), // 30 minutes
            test_before_acquire: parse_env("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true),
            run_migrations: parse_env("RUN_MIGRATIONS").unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// True when the URL asks for the in-memory store
    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_STORE_URL)
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/price_forecast".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
            run_migrations: true,
        }
    }
}

impl RetryConfig {
    /// Create retry config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let attempts = parse_env("STORE_RETRY_ATTEMPTS").unwrap_or(3);
        let backoff_ms = parse_env("STORE_RETRY_BACKOFF_MS").unwrap_or(50);

        if attempts == 0 {
            return Err("STORE_RETRY_ATTEMPTS must be at least 1".to_string());
        }

        Ok(Self {
            attempts,
            backoff_ms,
        })
    }

    /// Delay before the given retry (1-based), growing linearly
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(retry)))
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 50,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let retry = RetryConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_port = parse_env("PORT").unwrap_or(5000);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let models_dir = env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string());
        let features_dir = env::var("FEATURES_DIR").unwrap_or_else(|_| "data".to_string());
        let audit_log_dir = env::var("AUDIT_LOG_DIR").ok().filter(|s| !s.is_empty());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            retry,
            log_level: log_level.to_lowercase(),
            http_port,
            environment: environment.to_lowercase(),
            models_dir: PathBuf::from(models_dir),
            features_dir: PathBuf::from(features_dir),
            audit_log_dir: audit_log_dir.map(PathBuf::from),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            log_level: "info".to_string(),
            http_port: 5000,
            environment: "development".to_string(),
            models_dir: PathBuf::from("models"),
            features_dir: PathBuf::from("data"),
            audit_log_dir: None,
        }
    }
}
