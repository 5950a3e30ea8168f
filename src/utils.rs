use crate::error::{AppError, Result};
use chrono::{Duration, NaiveDate, Utc};
use std::path::PathBuf;

/// Get snapshot database path from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("MARKET_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("market.db"))
}

/// Get provider API base URL from environment variable or use default
pub fn get_provider_base_url() -> String {
    std::env::var("PROVIDER_BASE_URL").unwrap_or_else(|_| "http://api.tushare.pro".to_string())
}

/// Get provider API token (empty string when unset; the provider rejects it)
pub fn get_provider_token() -> String {
    std::env::var("PROVIDER_TOKEN").unwrap_or_default()
}

/// Get background refresh interval in seconds
pub fn get_refresh_interval_secs() -> u64 {
    std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(crate::constants::DEFAULT_REFRESH_INTERVAL_SECS)
}

/// Today's date in compact `YYYYMMDD` form, the ordering key used everywhere.
pub fn today_compact() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

pub fn parse_compact(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map_err(|e| AppError::Parse(format!("invalid trade date '{}': {}", date, e)))
}

pub fn to_compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Shift a compact date by a number of calendar days (negative = back).
pub fn shift_days(date: &str, days: i64) -> Result<String> {
    Ok(to_compact(parse_compact(date)? + Duration::days(days)))
}

/// Start of a trailing window of `years` ending at `date` (365 days/year).
pub fn years_back(date: &str, years: i64) -> Result<String> {
    shift_days(date, -years * 365)
}

/// Round to 2 decimal places, the precision served for ratios/percentages.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
