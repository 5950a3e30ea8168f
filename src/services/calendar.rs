use crate::constants::MAX_PROBE_DATES;
use crate::error::Result;
use crate::models::InstrumentRow;
use crate::services::provider::DataProvider;
use crate::utils::{shift_days, today_compact};
use std::sync::Arc;
use tracing::{debug, warn};

/// The latest trading date that actually has published rows, plus those rows.
/// Resolving and fetching are one step so callers never re-fetch the probe's
/// winning day.
#[derive(Debug)]
pub struct ResolvedDay {
    pub date: String,
    pub rows: Vec<InstrumentRow>,
}

/// Resolves "the latest trading date" against both the exchange calendar and
/// the provider's publication lag.
pub struct CalendarResolver {
    provider: Arc<dyn DataProvider>,
}

impl CalendarResolver {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    /// Most recent open dates within `lookback_days` of today, newest first,
    /// at most `n` of them.
    pub async fn recent_open_dates(&self, lookback_days: i64, n: usize) -> Result<Vec<String>> {
        let end = today_compact();
        let start = shift_days(&end, -lookback_days)?;
        let calendar = self.provider.fetch_trading_calendar(&start, &end).await?;

        let mut open: Vec<String> = calendar
            .into_iter()
            .filter(|d| d.is_open)
            .map(|d| d.date)
            .collect();
        open.sort_unstable_by(|a, b| b.cmp(a));
        open.truncate(n);
        Ok(open)
    }

    /// Walk the newest open dates and return the first one whose daily fetch
    /// yields rows. A failed or empty probe falls through to the next
    /// candidate; `Ok(None)` means nothing in the probe budget had data.
    pub async fn resolve_latest(&self, lookback_days: i64) -> Result<Option<ResolvedDay>> {
        let candidates = self.recent_open_dates(lookback_days, MAX_PROBE_DATES).await?;

        for date in candidates {
            match self.provider.fetch_daily(&date).await {
                Ok(rows) if !rows.is_empty() => {
                    debug!(date, rows = rows.len(), "resolved latest trading date");
                    return Ok(Some(ResolvedDay { date, rows }));
                }
                Ok(_) => {
                    debug!(date, "open date has no published rows yet, probing older");
                }
                Err(e) => {
                    warn!(date, error = %e, "daily probe failed, trying older date");
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::testing::MockProvider;

    fn recent(offset: i64) -> String {
        shift_days(&today_compact(), -offset).unwrap()
    }

    #[tokio::test]
    async fn skips_open_date_without_rows() {
        let d0 = recent(0);
        let d1 = recent(1);
        let mut provider = MockProvider::default();
        provider.calendar = vec![
            MockProvider::open_day(&d1),
            MockProvider::open_day(&d0),
        ];
        provider
            .daily_by_date
            .insert(d1.clone(), vec![MockProvider::row("000001.SZ", &d1, 10.0, 1.0)]);
        // d0 is open but has no rows published yet

        let resolver = CalendarResolver::new(Arc::new(provider));
        let resolved = resolver.resolve_latest(30).await.unwrap().unwrap();
        assert_eq!(resolved.date, d1);
        assert_eq!(resolved.rows.len(), 1);
    }

    #[tokio::test]
    async fn failed_probe_falls_through_to_older_date() {
        let d0 = recent(0);
        let d1 = recent(1);
        let mut provider = MockProvider::default();
        provider.calendar = vec![
            MockProvider::open_day(&d1),
            MockProvider::open_day(&d0),
        ];
        provider.failing_dates.insert(d0.clone());
        provider
            .daily_by_date
            .insert(d1.clone(), vec![MockProvider::row("000001.SZ", &d1, 10.0, 1.0)]);

        let resolver = CalendarResolver::new(Arc::new(provider));
        let resolved = resolver.resolve_latest(30).await.unwrap().unwrap();
        assert_eq!(resolved.date, d1);
    }

    #[tokio::test]
    async fn none_when_no_probe_yields_data() {
        let mut provider = MockProvider::default();
        provider.calendar = vec![
            MockProvider::open_day(&recent(0)),
            MockProvider::closed_day(&recent(1)),
        ];

        let resolver = CalendarResolver::new(Arc::new(provider));
        assert!(resolver.resolve_latest(30).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn probe_budget_is_bounded() {
        // Seven open dates, data only on the seventh. The probe budget is
        // five, so resolution gives up before reaching it.
        let mut provider = MockProvider::default();
        for offset in 0..7 {
            provider.calendar.push(MockProvider::open_day(&recent(offset)));
        }
        let oldest = recent(6);
        provider
            .daily_by_date
            .insert(oldest.clone(), vec![MockProvider::row("000001.SZ", &oldest, 10.0, 1.0)]);

        let resolver = CalendarResolver::new(Arc::new(provider));
        assert!(resolver.resolve_latest(30).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_open_dates_sorted_newest_first() {
        let d0 = recent(0);
        let d2 = recent(2);
        let d3 = recent(3);
        let mut provider = MockProvider::default();
        provider.calendar = vec![
            MockProvider::open_day(&d3),
            MockProvider::closed_day(&recent(1)),
            MockProvider::open_day(&d0),
            MockProvider::open_day(&d2),
        ];

        let resolver = CalendarResolver::new(Arc::new(provider));
        let dates = resolver.recent_open_dates(30, 2).await.unwrap();
        assert_eq!(dates, vec![d0, d2]);
    }
}
