use crate::error::{AppError, Result};
use crate::models::{HighestCheck, HistoryPoint, WindowSpec, WindowStat};
use crate::services::provider::{DataProvider, Market, ReferenceData};
use crate::utils::{today_compact, years_back};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Scans an instrument's trailing history for window maxima.
pub struct ExtremumScanner {
    provider: Arc<dyn DataProvider>,
    reference: Arc<dyn ReferenceData>,
}

/// Relaxed membership test used only by the live near-high endpoint. The
/// cached scan compares strictly against the window maximum.
pub fn near_high(window_max: f64, current_price: f64, tolerance: f64) -> bool {
    window_max > 0.0 && current_price >= window_max * tolerance
}

impl ExtremumScanner {
    pub fn new(provider: Arc<dyn DataProvider>, reference: Arc<dyn ReferenceData>) -> Self {
        Self { provider, reference }
    }

    pub fn reference(&self) -> &Arc<dyn ReferenceData> {
        &self.reference
    }

    /// Per-window maxima for one instrument as of `date`. A window whose
    /// history cannot be fetched, or comes back empty, is omitted from the
    /// map. `is_high` is a strict `current_price >= window_max`.
    pub async fn scan(
        &self,
        code: &str,
        current_price: f64,
        date: &str,
        windows: &[WindowSpec],
    ) -> BTreeMap<String, WindowStat> {
        let mut out = BTreeMap::new();

        for window in windows {
            let start = match years_back(date, window.years) {
                Ok(s) => s,
                Err(e) => {
                    warn!(code, window = %window.id, error = %e, "bad window start");
                    continue;
                }
            };
            match self.provider.fetch_daily_range(code, &start, date).await {
                Ok(rows) if !rows.is_empty() => {
                    let window_max = rows.iter().map(|r| r.close).fold(f64::MIN, f64::max);
                    out.insert(
                        window.id.clone(),
                        WindowStat {
                            is_high: current_price >= window_max,
                            window_max,
                        },
                    );
                }
                Ok(_) => {
                    debug!(code, window = %window.id, "no history in window, omitting");
                }
                Err(e) => {
                    warn!(code, window = %window.id, error = %e, "window fetch failed, omitting");
                }
            }
        }

        out
    }

    /// Live cache-bypassing check: is this instrument's newest close its
    /// highest over the primary trailing window? Returns the full close
    /// series so callers can plot it.
    pub async fn check_highest(&self, code: &str) -> Result<HighestCheck> {
        let market = Market::from_code(code)?;
        let end = today_compact();
        let start = years_back(&end, crate::constants::PRIMARY_WINDOW_YEARS)?;

        let mut rows = self.provider.fetch_daily_range(code, &start, &end).await?;
        if rows.is_empty() {
            return Err(AppError::NoData(format!(
                "no history for {} in [{}, {}]",
                code, start, end
            )));
        }
        rows.sort_by(|a, b| a.trade_date.cmp(&b.trade_date));

        let latest = &rows[rows.len() - 1];
        let max_close = rows.iter().map(|r| r.close).fold(f64::MIN, f64::max);
        let min_close = rows.iter().map(|r| r.close).fold(f64::MAX, f64::min);

        let name = match self.reference.lookup_name(code).await {
            Ok(n) => n,
            Err(e) => {
                warn!(code, error = %e, "name lookup failed for highest check");
                None
            }
        };

        let history: Vec<HistoryPoint> = rows
            .iter()
            .map(|r| HistoryPoint {
                date: r.trade_date.clone(),
                close: r.close,
                pct_chg: r.pct_chg,
            })
            .collect();

        Ok(HighestCheck {
            code: code.to_string(),
            name,
            market: market.label().to_string(),
            trade_date: latest.trade_date.clone(),
            today_close: latest.close,
            max_close,
            min_close,
            is_highest: latest.close >= max_close,
            pct_chg: latest.pct_chg,
            volume: latest.volume,
            amount: latest.amount,
            data_period: format!("{} - {}", rows[0].trade_date, latest.trade_date),
            total_days: rows.len(),
            history,
        })
    }
}
