use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Downstream price source forecast independently by its own model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Competitor {
    #[serde(rename = "competitorA")]
    A,
    #[serde(rename = "competitorB")]
    B,
}

impl Competitor {
    /// Number of competitors served
    pub const COUNT: usize = 2;

    /// All competitors in declaration order
    pub const ALL: [Competitor; Competitor::COUNT] = [Competitor::A, Competitor::B];

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Competitor::A => "competitorA",
            Competitor::B => "competitorB",
        }
    }

    /// Slot of this competitor in fixed-size per-competitor tables
    pub fn index(self) -> usize {
        match self {
            Competitor::A => 0,
            Competitor::B => 1,
        }
    }

    /// Response field carrying the forecast, e.g. `pvp_is_competitorA`
    pub fn price_field(&self) -> String {
        format!("pvp_is_{}", self.as_str())
    }

    /// Request/response field carrying the observed price
    pub fn actual_price_field(&self) -> String {
        format!("pvp_is_{}_actual", self.as_str())
    }
}

impl FromStr for Competitor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "competitorA" => Ok(Competitor::A),
            "competitorB" => Ok(Competitor::B),
            other => Err(AppError::UnknownCompetitor(other.to_string())),
        }
    }
}

impl fmt::Display for Competitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_competitors() {
        assert_eq!("competitorA".parse::<Competitor>().unwrap(), Competitor::A);
        assert_eq!("competitorB".parse::<Competitor>().unwrap(), Competitor::B);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "competitorC".parse::<Competitor>().unwrap_err();
        assert!(matches!(err, AppError::UnknownCompetitor(ref s) if s == "competitorC"));
        assert!("CompetitorA".parse::<Competitor>().is_err());
    }

    #[test]
    fn test_indices_cover_table() {
        for (i, competitor) in Competitor::ALL.iter().enumerate() {
            assert_eq!(competitor.index(), i);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Competitor::B).unwrap(), "\"competitorB\"");
        assert_eq!(Competitor::A.price_field(), "pvp_is_competitorA");
        assert_eq!(Competitor::A.actual_price_field(), "pvp_is_competitorA_actual");
    }
}
