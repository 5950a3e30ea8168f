use crate::constants::{NEAR_HIGH_TOLERANCE, UNKNOWN_NAME, WINDOW_ALL_TIME, WINDOW_PRIMARY};
use crate::models::{HighRiseStock, InstrumentRow, NearHighStock, WindowSpec};
use crate::services::extremum::{near_high, ExtremumScanner};
use tracing::{debug, info, warn};

/// Finds the day's big gainers and checks whether they printed window highs.
pub struct HighRiseScanner {
    scanner: ExtremumScanner,
}

impl HighRiseScanner {
    pub fn new(scanner: ExtremumScanner) -> Self {
        Self { scanner }
    }

    /// Cached-scan semantics: candidates are rows with `pct_chg > threshold`
    /// (strictly), highs are strict window-max hits. An instrument whose
    /// primary window has no usable history is skipped entirely.
    pub async fn find_high_rise(
        &self,
        date: &str,
        rows: &[InstrumentRow],
        threshold: f64,
    ) -> Vec<HighRiseStock> {
        let windows = WindowSpec::defaults();
        let candidates: Vec<&InstrumentRow> =
            rows.iter().filter(|r| r.pct_chg > threshold).collect();
        info!(date, candidates = candidates.len(), "scanning high-rise candidates");

        let mut out = Vec::new();
        for row in candidates {
            let stats = self.scanner.scan(&row.code, row.close, date, &windows).await;
            let primary = match stats.get(WINDOW_PRIMARY) {
                Some(stat) => *stat,
                None => {
                    debug!(code = %row.code, "no primary-window history, skipping candidate");
                    continue;
                }
            };

            let name = self.lookup_name(&row.code).await;
            let all_time = stats.get(WINDOW_ALL_TIME);
            out.push(HighRiseStock {
                code: row.code.clone(),
                name,
                current_price: row.close,
                pct_chg: row.pct_chg,
                is_3y_high: primary.is_high,
                is_all_time_high: all_time.map_or(false, |s| s.is_high),
                max_3y: primary.window_max,
                max_all: all_time.map(|s| s.window_max),
            });
        }
        out
    }

    /// Live-scan semantics: same candidate filter, but membership is the
    /// relaxed near-high test against the primary window only.
    pub async fn find_near_high_live(
        &self,
        date: &str,
        rows: &[InstrumentRow],
        threshold: f64,
    ) -> Vec<NearHighStock> {
        let windows = vec![WindowSpec::new(
            WINDOW_PRIMARY,
            crate::constants::PRIMARY_WINDOW_YEARS,
        )];

        let mut out = Vec::new();
        for row in rows.iter().filter(|r| r.pct_chg > threshold) {
            let stats = self.scanner.scan(&row.code, row.close, date, &windows).await;
            let Some(primary) = stats.get(WINDOW_PRIMARY) else {
                continue;
            };
            if near_high(primary.window_max, row.close, NEAR_HIGH_TOLERANCE) {
                out.push(NearHighStock {
                    code: row.code.clone(),
                    name: self.lookup_name(&row.code).await,
                    close: row.close,
                    pct_chg: row.pct_chg,
                    volume: row.volume,
                    amount: row.amount,
                    recent_high: primary.window_max,
                });
            }
        }
        out
    }

    async fn lookup_name(&self, code: &str) -> String {
        match self.scanner.reference().lookup_name(code).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_NAME.to_string(),
            Err(e) => {
                warn!(code, error = %e, "name lookup failed");
                UNKNOWN_NAME.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HIGH_RISE_THRESHOLD_PCT;
    use crate::services::provider::testing::MockProvider;
    use crate::utils::{shift_days, today_compact};
    use std::sync::Arc;

    fn recent(offset: i64) -> String {
        shift_days(&today_compact(), -offset).unwrap()
    }

    fn scanner_for(provider: MockProvider) -> HighRiseScanner {
        let provider = Arc::new(provider);
        HighRiseScanner::new(ExtremumScanner::new(provider.clone(), provider))
    }

    #[tokio::test]
    async fn threshold_is_strictly_greater() {
        let date = recent(0);
        let mut provider = MockProvider::default();
        provider.history_by_code.insert(
            "000001.SZ".to_string(),
            vec![MockProvider::row("000001.SZ", &recent(10), 10.0, 0.0)],
        );
        let rows = vec![
            MockProvider::row("000001.SZ", &date, 12.0, 7.0), // exactly 7.0, excluded
        ];
        let scanner = scanner_for(provider);
        let found = scanner
            .find_high_rise(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn candidate_without_primary_history_is_skipped() {
        let date = recent(0);
        let provider = MockProvider::default(); // no history at all
        let rows = vec![MockProvider::row("000001.SZ", &date, 12.0, 8.0)];
        let scanner = scanner_for(provider);
        let found = scanner
            .find_high_rise(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn reports_window_flags_and_name() {
        let date = recent(0);
        let mut provider = MockProvider::default();
        provider.history_by_code.insert(
            "000001.SZ".to_string(),
            vec![
                MockProvider::row("000001.SZ", &recent(400), 11.0, 0.0),
                MockProvider::row("000001.SZ", &recent(10), 10.0, 0.0),
            ],
        );
        provider
            .names
            .insert("000001.SZ".to_string(), "Ping An Bank".to_string());
        let rows = vec![MockProvider::row("000001.SZ", &date, 12.0, 8.0)];
        let scanner = scanner_for(provider);
        let found = scanner
            .find_high_rise(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert_eq!(found.len(), 1);
        let stock = &found[0];
        assert_eq!(stock.name, "Ping An Bank");
        assert!(stock.is_3y_high);
        assert!(stock.is_all_time_high);
        assert_eq!(stock.max_3y, 11.0);
        assert_eq!(stock.max_all, Some(11.0));
    }

    #[tokio::test]
    async fn missing_name_falls_back_to_sentinel() {
        let date = recent(0);
        let mut provider = MockProvider::default();
        provider.history_by_code.insert(
            "000001.SZ".to_string(),
            vec![MockProvider::row("000001.SZ", &recent(10), 10.0, 0.0)],
        );
        let rows = vec![MockProvider::row("000001.SZ", &date, 12.0, 8.0)];
        let scanner = scanner_for(provider);
        let found = scanner
            .find_high_rise(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert_eq!(found[0].name, UNKNOWN_NAME);
    }

    #[tokio::test]
    async fn live_scan_accepts_near_highs() {
        let date = recent(0);
        let mut provider = MockProvider::default();
        provider.history_by_code.insert(
            "000001.SZ".to_string(),
            vec![MockProvider::row("000001.SZ", &recent(10), 100.0, 0.0)],
        );
        // Close of 95 is within 5% of the 100 maximum
        let rows = vec![MockProvider::row("000001.SZ", &date, 95.0, 8.0)];
        let scanner = scanner_for(provider);
        let found = scanner
            .find_near_high_live(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].recent_high, 100.0);

        // But the strict cached scan rejects the same row
        let cached = scanner
            .find_high_rise(&date, &rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        assert_eq!(cached.len(), 1);
        assert!(!cached[0].is_3y_high);
    }
}
