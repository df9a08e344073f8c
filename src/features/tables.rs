use super::FeatureError;
use crate::models::Competitor;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const SALES_FILE: &str = "sales.csv";
pub const PRICES_FILE: &str = "prices.csv";
pub const CAMPAIGNS_FILE: &str = "campaigns.csv";

/// Number of product hierarchy levels carried per sku
pub const STRUCTURE_LEVELS: usize = 4;

/// Product hierarchy codes of a sku
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkuStructure {
    pub sku: String,
    pub structure_level_1: i64,
    pub structure_level_2: i64,
    pub structure_level_3: i64,
    pub structure_level_4: i64,
}

impl SkuStructure {
    pub fn levels(&self) -> [i64; STRUCTURE_LEVELS] {
        [
            self.structure_level_1,
            self.structure_level_2,
            self.structure_level_3,
            self.structure_level_4,
        ]
    }
}

/// One historical price point of a sku
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceObservation {
    pub sku: String,
    pub target_price: f64,
}

/// A competitor campaign, active on `[start_date, end_date]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Campaign {
    pub competitor: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub chain_campaign: String,
}

impl Campaign {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Summary statistics of a sku's price history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl PriceStats {
    /// Sample standard deviation; zero for a single observation
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }
        let n = prices.len() as f64;
        let mean = prices.iter().sum::<f64>() / n;
        let std = if prices.len() > 1 {
            let var = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, std, min, max })
    }
}

/// Immutable lookup tables backing feature resolution
#[derive(Debug, Default)]
pub struct FeatureTables {
    structures: HashMap<String, SkuStructure>,
    price_stats: HashMap<String, PriceStats>,
    level_avg_price: [HashMap<i64, f64>; STRUCTURE_LEVELS],
    campaigns: [Vec<Campaign>; Competitor::COUNT],
}

impl FeatureTables {
    /// Build tables from already-parsed rows
    pub fn from_parts(
        sales: Vec<SkuStructure>,
        prices: Vec<PriceObservation>,
        campaigns: Vec<Campaign>,
    ) -> Result<Self, FeatureError> {
        let mut tables = Self::default();

        // First row wins for a sku listed more than once
        for row in sales {
            if row.sku.is_empty() {
                return Err(FeatureError::Invalid("sales row with empty sku".to_string()));
            }
            tables.structures.entry(row.sku.clone()).or_insert(row);
        }

        let mut by_sku: HashMap<String, Vec<f64>> = HashMap::new();
        let mut by_level: [HashMap<i64, (f64, usize)>; STRUCTURE_LEVELS] = Default::default();
        for obs in prices {
            if !obs.target_price.is_finite() {
                return Err(FeatureError::Invalid(format!(
                    "non-finite price for sku {}",
                    obs.sku
                )));
            }
            if let Some(structure) = tables.structures.get(&obs.sku) {
                for (level, code) in structure.levels().into_iter().enumerate() {
                    let slot = by_level[level].entry(code).or_insert((0.0, 0));
                    slot.0 += obs.target_price;
                    slot.1 += 1;
                }
            }
            by_sku.entry(obs.sku).or_default().push(obs.target_price);
        }

        tables.price_stats = by_sku
            .into_iter()
            .filter_map(|(sku, prices)| PriceStats::from_prices(&prices).map(|s| (sku, s)))
            .collect();

        for (level, sums) in by_level.into_iter().enumerate() {
            tables.level_avg_price[level] = sums
                .into_iter()
                .map(|(code, (sum, count))| (code, sum / count as f64))
                .collect();
        }

        for campaign in campaigns {
            if campaign.end_date < campaign.start_date {
                return Err(FeatureError::Invalid(format!(
                    "campaign {} ends before it starts",
                    campaign.chain_campaign
                )));
            }
            match campaign.competitor.parse::<Competitor>() {
                Ok(competitor) => tables.campaigns[competitor.index()].push(campaign),
                Err(_) => warn!(
                    "Skipping campaign {} for unknown competitor {}",
                    campaign.chain_campaign, campaign.competitor
                ),
            }
        }

        Ok(tables)
    }

    /// Load `sales.csv`, `prices.csv` and optional `campaigns.csv` from a directory
    pub fn load(dir: &Path) -> Result<Self, FeatureError> {
        let sales: Vec<SkuStructure> = read_table(&dir.join(SALES_FILE))?;
        let prices: Vec<PriceObservation> = read_table(&dir.join(PRICES_FILE))?;

        let campaigns_path = dir.join(CAMPAIGNS_FILE);
        let campaigns: Vec<Campaign> = if campaigns_path.exists() {
            read_table(&campaigns_path)?
        } else {
            info!("No {} in {:?}, campaign features default to 0", CAMPAIGNS_FILE, dir);
            Vec::new()
        };

        info!(
            "Loaded feature tables: {} skus, {} prices, {} campaigns",
            sales.len(),
            prices.len(),
            campaigns.len()
        );

        Self::from_parts(sales, prices, campaigns)
    }

    pub fn structure(&self, sku: &str) -> Option<&SkuStructure> {
        self.structures.get(sku)
    }

    pub fn price_stats(&self, sku: &str) -> Option<PriceStats> {
        self.price_stats.get(sku).copied()
    }

    /// Mean price over all skus sharing `code` at hierarchy `level` (0-based)
    pub fn level_avg_price(&self, level: usize, code: i64) -> Option<f64> {
        self.level_avg_price.get(level)?.get(&code).copied()
    }

    /// First campaign of the competitor, in table order, active on `date`
    pub fn active_campaign(&self, competitor: Competitor, date: NaiveDate) -> Option<&str> {
        self.campaigns[competitor.index()]
            .iter()
            .find(|c| c.is_active_on(date))
            .map(|c| c.chain_campaign.as_str())
    }

    pub fn sku_count(&self) -> usize {
        self.structures.len()
    }
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, FeatureError> {
    let table_err = |source: csv::Error| FeatureError::Table {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(table_err)?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(table_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(sku: &str, levels: [i64; 4]) -> SkuStructure {
        SkuStructure {
            sku: sku.to_string(),
            structure_level_1: levels[0],
            structure_level_2: levels[1],
            structure_level_3: levels[2],
            structure_level_4: levels[3],
        }
    }

    fn price(sku: &str, target_price: f64) -> PriceObservation {
        PriceObservation {
            sku: sku.to_string(),
            target_price,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_price_stats() {
        let stats = PriceStats::from_prices(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.std, 10.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);

        let single = PriceStats::from_prices(&[7.5]).unwrap();
        assert_eq!(single.std, 0.0);
        assert!(PriceStats::from_prices(&[]).is_none());
    }

    #[test]
    fn test_level_averages_group_by_code() {
        let tables = FeatureTables::from_parts(
            vec![structure("1", [1, 10, 100, 1000]), structure("2", [1, 20, 200, 2000])],
            vec![price("1", 10.0), price("1", 20.0), price("2", 30.0)],
            vec![],
        )
        .unwrap();

        assert_eq!(tables.level_avg_price(0, 1), Some(20.0));
        assert_eq!(tables.level_avg_price(1, 10), Some(15.0));
        assert_eq!(tables.level_avg_price(1, 20), Some(30.0));
        assert_eq!(tables.level_avg_price(1, 99), None);
    }

    #[test]
    fn test_first_sales_row_wins() {
        let tables = FeatureTables::from_parts(
            vec![structure("1", [1, 1, 1, 1]), structure("1", [2, 2, 2, 2])],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(tables.sku_count(), 1);
        assert_eq!(tables.structure("1").unwrap().structure_level_1, 1);
    }

    #[test]
    fn test_active_campaign_is_per_competitor() {
        let campaigns = vec![
            Campaign {
                competitor: "competitorA".into(),
                start_date: date("2025-05-01"),
                end_date: date("2025-05-31"),
                chain_campaign: "spring".into(),
            },
            Campaign {
                competitor: "competitorC".into(),
                start_date: date("2025-05-01"),
                end_date: date("2025-05-31"),
                chain_campaign: "ignored".into(),
            },
        ];
        let tables = FeatureTables::from_parts(vec![], vec![], campaigns).unwrap();

        assert_eq!(tables.active_campaign(Competitor::A, date("2025-05-31")), Some("spring"));
        assert_eq!(tables.active_campaign(Competitor::A, date("2025-06-01")), None);
        assert_eq!(tables.active_campaign(Competitor::B, date("2025-05-20")), None);
    }

    #[test]
    fn test_rejects_inverted_campaign() {
        let campaigns = vec![Campaign {
            competitor: "competitorA".into(),
            start_date: date("2025-05-31"),
            end_date: date("2025-05-01"),
            chain_campaign: "broken".into(),
        }];
        assert!(FeatureTables::from_parts(vec![], vec![], campaigns).is_err());
    }

    #[test]
    fn test_load_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SALES_FILE),
            "sku,structure_level_1,structure_level_2,structure_level_3,structure_level_4\n4443,1,11,111,1111\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(PRICES_FILE),
            "sku,competitor,target_price\n4443,competitorA,120.0\n4443,competitorB,130.0\n",
        )
        .unwrap();

        let tables = FeatureTables::load(dir.path()).unwrap();
        assert_eq!(tables.sku_count(), 1);
        assert_eq!(tables.price_stats("4443").unwrap().mean, 125.0);
        assert_eq!(tables.active_campaign(Competitor::A, date("2025-05-20")), None);
    }

    #[test]
    fn test_load_missing_sales_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FeatureTables::load(dir.path()),
            Err(FeatureError::Table { .. })
        ));
    }
}
