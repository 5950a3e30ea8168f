use crate::constants::{ALL_TIME_WINDOW_YEARS, PRIMARY_WINDOW_YEARS, WINDOW_ALL_TIME, WINDOW_PRIMARY};
use serde::{Deserialize, Serialize};

/// A trailing lookback window for new-high detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSpec {
    pub id: String,
    pub years: i64,
}

impl WindowSpec {
    pub fn new(id: &str, years: i64) -> Self {
        Self {
            id: id.to_string(),
            years,
        }
    }

    /// The configured scan windows: 3-year primary plus the long reference
    /// window backing the all-time-high flag.
    pub fn defaults() -> Vec<WindowSpec> {
        vec![
            WindowSpec::new(WINDOW_PRIMARY, PRIMARY_WINDOW_YEARS),
            WindowSpec::new(WINDOW_ALL_TIME, ALL_TIME_WINDOW_YEARS),
        ]
    }
}

/// Outcome of one window scan. Windows with no retrievable history are
/// omitted from the result map entirely rather than reported as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStat {
    pub is_high: bool,
    pub window_max: f64,
}

/// Persisted row of the cached high-rise scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighRiseStock {
    pub code: String,
    pub name: String,
    pub current_price: f64,
    pub pct_chg: f64,
    pub is_3y_high: bool,
    pub is_all_time_high: bool,
    pub max_3y: f64,
    /// Absent when the long reference window had no history
    pub max_all: Option<f64>,
}

/// Result row of the relaxed live scan (near-high with tolerance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearHighStock {
    pub code: String,
    pub name: String,
    pub close: f64,
    pub pct_chg: f64,
    pub volume: f64,
    pub amount: f64,
    pub recent_high: f64,
}

/// One point of the close series returned by the live highest check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    pub close: f64,
    pub pct_chg: f64,
}

/// Full result of the live cache-bypassing highest-today check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighestCheck {
    pub code: String,
    pub name: Option<String>,
    pub market: String,
    pub trade_date: String,
    pub today_close: f64,
    pub max_close: f64,
    pub min_close: f64,
    pub is_highest: bool,
    pub pct_chg: f64,
    pub volume: f64,
    pub amount: f64,
    pub history: Vec<HistoryPoint>,
    pub data_period: String,
    pub total_days: usize,
}
