use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One instrument's daily bar as published by the provider.
///
/// Rows are validated at the fetch boundary: anything missing a code, close
/// or trade date never makes it past the provider client. `pct_chg` defaults
/// to 0 because some venue feeds (HK/US dailies) omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentRow {
    /// Instrument code with market suffix, e.g. `000001.SZ`, `AAPL.US`
    pub code: String,

    /// Closing price
    pub close: f64,

    /// Percentage change vs the previous close (already in percent units)
    pub pct_chg: f64,

    /// Trading volume
    pub volume: f64,

    /// Traded amount
    pub amount: f64,

    /// Trading date in compact `YYYYMMDD` form
    pub trade_date: String,
}

impl InstrumentRow {
    /// Build a row from one provider item array, using the response's field
    /// index. Returns `None` when a required field is missing or malformed;
    /// the caller drops such rows with a warning instead of failing the run.
    pub fn from_item(index: &HashMap<String, usize>, item: &[Value]) -> Option<Self> {
        let get = |name: &str| index.get(name).and_then(|&i| item.get(i));
        let as_f64 = |v: &Value| v.as_f64();

        let code = get("ts_code")?.as_str()?.to_string();
        let trade_date = get("trade_date")?.as_str()?.to_string();
        let close = get("close").and_then(as_f64)?;
        let pct_chg = get("pct_chg").and_then(as_f64).unwrap_or(0.0);
        let volume = get("vol").and_then(as_f64).unwrap_or(0.0);
        let amount = get("amount").and_then(as_f64).unwrap_or(0.0);

        Some(Self {
            code,
            close,
            pct_chg,
            volume,
            amount,
            trade_date,
        })
    }
}

/// One entry of the provider's trading calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub is_open: bool,
}
