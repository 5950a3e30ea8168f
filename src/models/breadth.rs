use serde::{Deserialize, Serialize};

/// Single-day market breadth: how many instruments rose, fell, stayed flat.
///
/// Invariant: `rise + fall + flat == total`. Sign classification is exact
/// (`pct_chg > 0`, `< 0`, `== 0`), no epsilon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBreadthStats {
    pub date: String,
    pub total: i64,
    pub rise: i64,
    pub fall: i64,
    pub flat: i64,
    /// `rise / total * 100`, rounded to 2 decimals; 0 for an empty day
    pub rise_ratio: f64,
}

/// Averages over a trailing set of daily snapshots. Counts are rounded to
/// the nearest integer, the ratio to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageStats {
    pub rise: i64,
    pub fall: i64,
    pub flat: i64,
    pub total: i64,
    pub rise_ratio: f64,
}
