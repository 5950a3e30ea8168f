//! Analysis thresholds and default band layout.
//!
//! Values mirror mainland-market conventions: the daily price limit for most
//! listed instruments is 10%, and a close at or beyond 9.8% is treated as
//! limit-up/limit-down to absorb rounding in the provider's pct_chg field.

/// Magnitude (in percent) at or above which a move counts as limit-up/down.
pub const LIMIT_THRESHOLD_PCT: f64 = 9.8;

/// Daily gain (in percent) above which an instrument is a high-rise candidate.
pub const HIGH_RISE_THRESHOLD_PCT: f64 = 7.0;

/// Calendar lookback when resolving the latest trading date.
pub const CALENDAR_LOOKBACK_DAYS: i64 = 30;

/// Wider lookback used when walking the trailing stats window, so that
/// holidays cannot starve the requested number of open days.
pub const TRAILING_CALENDAR_LOOKBACK_DAYS: i64 = 60;

/// How many of the most recent open calendar days to probe for actual data.
/// The calendar can mark a date open before that date's rows are published.
pub const MAX_PROBE_DATES: usize = 5;

/// Number of trailing daily snapshots averaged for the unified view.
pub const TRAILING_DAYS: usize = 5;

/// Primary new-high lookback window.
pub const PRIMARY_WINDOW_YEARS: i64 = 3;

/// Long reference window used for the all-time-high flag.
pub const ALL_TIME_WINDOW_YEARS: i64 = 10;

/// Window identifiers as persisted and served.
pub const WINDOW_PRIMARY: &str = "3y";
pub const WINDOW_ALL_TIME: &str = "all";

/// Tolerance factor for the relaxed near-high check: a close within 5% of
/// the window maximum passes. Only the live endpoint uses this; the cached
/// scan is strict.
pub const NEAR_HIGH_TOLERANCE: f64 = 0.95;

/// Sentinel name when the reference-data lookup fails or has no entry.
pub const UNKNOWN_NAME: &str = "unknown";

/// Provider request budget (sliding one-minute window).
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

/// Default refresh cadence for the background worker.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
