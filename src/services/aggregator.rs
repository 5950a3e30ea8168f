use crate::constants::TRAILING_CALENDAR_LOOKBACK_DAYS;
use crate::error::Result;
use crate::models::{AverageStats, DailyBreadthStats, InstrumentRow};
use crate::services::calendar::CalendarResolver;
use crate::services::provider::DataProvider;
use crate::utils::round2;
use std::sync::Arc;
use tracing::warn;

/// Computes daily breadth counts and their trailing average.
pub struct SnapshotAggregator {
    provider: Arc<dyn DataProvider>,
    resolver: CalendarResolver,
}

/// Sign-exact breadth counts for one date's rows.
pub fn daily_stats(date: &str, rows: &[InstrumentRow]) -> DailyBreadthStats {
    let mut rise = 0i64;
    let mut fall = 0i64;
    let mut flat = 0i64;
    for row in rows {
        if row.pct_chg > 0.0 {
            rise += 1;
        } else if row.pct_chg < 0.0 {
            fall += 1;
        } else {
            flat += 1;
        }
    }
    let total = rows.len() as i64;
    DailyBreadthStats {
        date: date.to_string(),
        total,
        rise,
        fall,
        flat,
        rise_ratio: if total == 0 {
            0.0
        } else {
            round2(rise as f64 / total as f64 * 100.0)
        },
    }
}

/// Mean of a trailing run of daily snapshots. Counts round to the nearest
/// integer; `None` when the input is empty.
pub fn trailing_average(stats: &[DailyBreadthStats]) -> Option<AverageStats> {
    if stats.is_empty() {
        return None;
    }
    let n = stats.len() as f64;
    let mean = |f: fn(&DailyBreadthStats) -> i64| {
        (stats.iter().map(f).sum::<i64>() as f64 / n).round() as i64
    };
    Some(AverageStats {
        rise: mean(|s| s.rise),
        fall: mean(|s| s.fall),
        flat: mean(|s| s.flat),
        total: mean(|s| s.total),
        rise_ratio: round2(stats.iter().map(|s| s.rise_ratio).sum::<f64>() / n),
    })
}

impl SnapshotAggregator {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        let resolver = CalendarResolver::new(provider.clone());
        Self { provider, resolver }
    }

    /// Breadth for up to `days` recent open dates, newest first. Dates whose
    /// fetch fails or yields nothing are skipped, so the result may be
    /// shorter than requested.
    pub async fn recent_stats(&self, days: usize) -> Result<Vec<DailyBreadthStats>> {
        let dates = self
            .resolver
            .recent_open_dates(TRAILING_CALENDAR_LOOKBACK_DAYS, days)
            .await?;

        let mut out = Vec::with_capacity(dates.len());
        for date in dates {
            match self.provider.fetch_daily(&date).await {
                Ok(rows) if !rows.is_empty() => out.push(daily_stats(&date, &rows)),
                Ok(_) => warn!(date, "no rows for trailing date, skipping"),
                Err(e) => warn!(date, error = %e, "trailing fetch failed, skipping"),
            }
        }
        Ok(out)
    }
}
