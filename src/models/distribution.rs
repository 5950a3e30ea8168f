use crate::constants::LIMIT_THRESHOLD_PCT;
use serde::{Deserialize, Serialize};

/// Which side of the market a distribution describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Rise,
    Fall,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Rise => "rise",
            Side::Fall => "fall",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rise" => Some(Side::Rise),
            "fall" => Some(Side::Fall),
            _ => None,
        }
    }
}

/// One half-open magnitude band `[min, max)`; `max == None` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: Option<f64>,
    pub label: String,
}

impl Band {
    pub fn new(min: f64, max: Option<f64>, label: &str) -> Self {
        Self {
            min,
            max,
            label: label.to_string(),
        }
    }
}

/// Ordered band layout for one side, plus the saturating limit band.
///
/// The limit band is evaluated before the generic bands and owns every row
/// at or beyond its threshold, so a limit-up row is never also counted in
/// the unbounded band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    pub bands: Vec<Band>,
    pub limit_label: String,
    pub limit_threshold: f64,
}

impl BandConfig {
    pub fn new(bands: Vec<Band>, limit_label: &str, limit_threshold: f64) -> Self {
        Self {
            bands,
            limit_label: limit_label.to_string(),
            limit_threshold,
        }
    }

    pub fn default_rise() -> Self {
        Self::new(
            vec![
                Band::new(0.0, Some(2.0), "0-2%"),
                Band::new(2.0, Some(5.0), "2-5%"),
                Band::new(5.0, Some(7.0), "5-7%"),
                Band::new(7.0, None, "7%+"),
            ],
            "limit-up",
            LIMIT_THRESHOLD_PCT,
        )
    }

    pub fn default_fall() -> Self {
        Self::new(
            vec![
                Band::new(0.0, Some(2.0), "0-2%"),
                Band::new(2.0, Some(5.0), "2-5%"),
                Band::new(5.0, Some(7.0), "5-7%"),
                Band::new(7.0, None, "7%+"),
            ],
            "limit-down",
            LIMIT_THRESHOLD_PCT,
        )
    }
}

/// Count and whole-market share for one labeled band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStat {
    pub label: String,
    pub count: i64,
    /// Share of the full instrument universe that day, not of the side
    pub percentage: f64,
}

/// The persisted distribution for one date, both sides in band order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    pub date: String,
    pub rise: Vec<BucketStat>,
    pub fall: Vec<BucketStat>,
}
