use crate::constants::{CALENDAR_LOOKBACK_DAYS, HIGH_RISE_THRESHOLD_PCT, TRAILING_DAYS};
use crate::error::Result;
use crate::models::{BandConfig, Side, SnapshotKind, UnifiedSnapshot};
use crate::services::aggregator::{daily_stats, trailing_average, SnapshotAggregator};
use crate::services::calendar::{CalendarResolver, ResolvedDay};
use crate::services::classifier::classify;
use crate::services::extremum::ExtremumScanner;
use crate::services::high_rise::HighRiseScanner;
use crate::services::provider::{DataProvider, ReferenceData};
use crate::services::store::SnapshotStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Orchestrates snapshot recomputation and persistence. One refresh runs per
/// kind at a time; a trigger that arrives mid-run waits on the kind's lock
/// and then recomputes, it is never silently dropped.
pub struct RefreshCoordinator {
    store: Arc<SnapshotStore>,
    resolver: CalendarResolver,
    aggregator: SnapshotAggregator,
    high_rise: HighRiseScanner,
    locks: HashMap<SnapshotKind, Arc<TokioMutex<()>>>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SnapshotStore>,
        provider: Arc<dyn DataProvider>,
        reference: Arc<dyn ReferenceData>,
    ) -> Self {
        let resolver = CalendarResolver::new(provider.clone());
        let aggregator = SnapshotAggregator::new(provider.clone());
        let high_rise =
            HighRiseScanner::new(ExtremumScanner::new(provider.clone(), reference));
        let locks = SnapshotKind::ALL
            .iter()
            .map(|&kind| (kind, Arc::new(TokioMutex::new(()))))
            .collect();
        Self {
            store,
            resolver,
            aggregator,
            high_rise,
            locks,
        }
    }

    /// Spawn a refresh of one kind. The returned handle is awaitable by
    /// callers that need completion; HTTP handlers just drop it.
    pub fn trigger(self: &Arc<Self>, kind: SnapshotKind) -> JoinHandle<Result<()>> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let result = coordinator.refresh(kind).await;
            if let Err(ref e) = result {
                error!(kind = %kind, error = %e, "snapshot refresh failed");
            }
            result
        })
    }

    /// Recompute and persist one snapshot kind. When no trading date with
    /// published data exists in the lookback, the stored snapshot is left
    /// untouched and the refresh completes successfully.
    pub async fn refresh(&self, kind: SnapshotKind) -> Result<()> {
        let lock = self.locks[&kind].clone();
        let _guard = lock.lock().await;

        let Some(day) = self.resolver.resolve_latest(CALENDAR_LOOKBACK_DAYS).await? else {
            info!(kind = %kind, "no resolvable trading date, keeping existing snapshot");
            return Ok(());
        };

        info!(kind = %kind, date = %day.date, rows = day.rows.len(), "refreshing snapshot");
        match kind {
            SnapshotKind::Breadth => self.refresh_breadth(&day).await,
            SnapshotKind::Distribution => self.refresh_distribution(&day).await,
            SnapshotKind::HighRise => self.refresh_high_rise(&day).await,
            SnapshotKind::Unified => self.refresh_unified(&day).await,
        }
    }

    async fn refresh_breadth(&self, day: &ResolvedDay) -> Result<()> {
        let stats = daily_stats(&day.date, &day.rows);
        self.store.upsert_breadth(&stats).await
    }

    async fn refresh_distribution(&self, day: &ResolvedDay) -> Result<()> {
        let rise = classify(&day.rows, Side::Rise, &BandConfig::default_rise());
        let fall = classify(&day.rows, Side::Fall, &BandConfig::default_fall());
        self.store.replace_distribution(&day.date, &rise, &fall).await
    }

    async fn refresh_high_rise(&self, day: &ResolvedDay) -> Result<()> {
        let stocks = self
            .high_rise
            .find_high_rise(&day.date, &day.rows, HIGH_RISE_THRESHOLD_PCT)
            .await;
        self.store.replace_high_rise(&day.date, &stocks).await
    }

    async fn refresh_unified(&self, day: &ResolvedDay) -> Result<()> {
        let breadth = daily_stats(&day.date, &day.rows);
        let rise = classify(&day.rows, Side::Rise, &BandConfig::default_rise());
        let fall = classify(&day.rows, Side::Fall, &BandConfig::default_fall());
        let recent = self.aggregator.recent_stats(TRAILING_DAYS).await?;
        let average = trailing_average(&recent);

        self.store
            .upsert_unified(&UnifiedSnapshot {
                date: day.date.clone(),
                breadth,
                rise,
                fall,
                recent,
                average,
            })
            .await
    }

    /// Refresh every kind in sequence, logging failures without aborting the
    /// remaining kinds.
    pub async fn refresh_all(&self) {
        for kind in SnapshotKind::ALL {
            if let Err(e) = self.refresh(kind).await {
                error!(kind = %kind, error = %e, "refresh failed, continuing with next kind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::testing::MockProvider;
    use crate::utils::{shift_days, today_compact};
    use tempfile::tempdir;

    fn recent(offset: i64) -> String {
        shift_days(&today_compact(), -offset).unwrap()
    }

    async fn coordinator_with(provider: MockProvider, dir: &tempfile::TempDir) -> Arc<RefreshCoordinator> {
        let store = Arc::new(
            SnapshotStore::new(dir.path().join("test.db")).await.unwrap(),
        );
        let provider = Arc::new(provider);
        Arc::new(RefreshCoordinator::new(store.clone(), provider.clone(), provider))
    }

    fn provider_with_day(date: &str) -> MockProvider {
        let mut provider = MockProvider::default();
        provider.calendar.push(MockProvider::open_day(date));
        provider.daily_by_date.insert(
            date.to_string(),
            vec![
                MockProvider::row("000001.SZ", date, 10.0, 1.5),
                MockProvider::row("000002.SZ", date, 20.0, -0.5),
                MockProvider::row("000003.SZ", date, 30.0, 0.0),
            ],
        );
        provider
    }

    #[tokio::test]
    async fn breadth_refresh_persists_counts() {
        let date = recent(0);
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider_with_day(&date), &dir).await;

        coordinator.refresh(SnapshotKind::Breadth).await.unwrap();

        let stats = coordinator.store.latest_breadth().await.unwrap().unwrap();
        assert_eq!(stats.date, date);
        assert_eq!(stats.rise, 1);
        assert_eq!(stats.fall, 1);
        assert_eq!(stats.flat, 1);
    }

    #[tokio::test]
    async fn refresh_without_data_keeps_existing_snapshot() {
        let date = recent(0);
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider_with_day(&date), &dir).await;
        coordinator.refresh(SnapshotKind::Breadth).await.unwrap();

        // Second coordinator over the same db sees no trading data at all
        let empty = MockProvider::default();
        let store = Arc::new(
            SnapshotStore::new(dir.path().join("test.db")).await.unwrap(),
        );
        let empty = Arc::new(empty);
        let second = RefreshCoordinator::new(store.clone(), empty.clone(), empty);
        second.refresh(SnapshotKind::Breadth).await.unwrap();

        let stats = store.latest_breadth().await.unwrap().unwrap();
        assert_eq!(stats.date, date);
    }

    #[tokio::test]
    async fn unified_refresh_composes_all_sections() {
        let date = recent(0);
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider_with_day(&date), &dir).await;

        coordinator.refresh(SnapshotKind::Unified).await.unwrap();

        let snap = coordinator.store.latest_unified().await.unwrap().unwrap();
        assert_eq!(snap.date, date);
        assert_eq!(snap.breadth.total, 3);
        assert_eq!(snap.rise.len(), 5);
        assert_eq!(snap.fall.len(), 5);
        assert_eq!(snap.recent.len(), 1);
        let average = snap.average.unwrap();
        assert_eq!(average.total, 3);
    }

    #[tokio::test]
    async fn trigger_handle_is_awaitable() {
        let date = recent(0);
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider_with_day(&date), &dir).await;

        let handle = coordinator.trigger(SnapshotKind::Distribution);
        handle.await.unwrap().unwrap();

        let snap = coordinator
            .store
            .latest_distribution()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.date, date);
        assert_eq!(snap.rise.len(), 5);
    }

    #[tokio::test]
    async fn concurrent_triggers_serialize_per_kind() {
        let date = recent(0);
        let mut provider = provider_with_day(&date);
        // One candidate above the rise threshold, with enough history for
        // the primary window
        provider
            .daily_by_date
            .get_mut(&date)
            .unwrap()
            .push(MockProvider::row("000004.SZ", &date, 15.0, 8.0));
        provider.history_by_code.insert(
            "000004.SZ".to_string(),
            vec![MockProvider::row("000004.SZ", &recent(10), 14.0, 0.0)],
        );
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider, &dir).await;

        let h1 = coordinator.trigger(SnapshotKind::HighRise);
        let h2 = coordinator.trigger(SnapshotKind::HighRise);
        h1.await.unwrap().unwrap();
        h2.await.unwrap().unwrap();

        // Each refresh rewrites the date's whole set inside the per-kind
        // lock, so two racing triggers land exactly one copy of the result,
        // never an interleaved delete+insert with duplicated rows.
        let (stored_date, stocks) = coordinator
            .store
            .latest_high_rise()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored_date, date);
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0].code, "000004.SZ");
        assert!(stocks[0].is_3y_high);
        assert_eq!(stocks[0].max_3y, 14.0);
    }

    #[tokio::test]
    async fn refresh_all_covers_every_kind() {
        let date = recent(0);
        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(provider_with_day(&date), &dir).await;

        coordinator.refresh_all().await;

        assert!(coordinator.store.latest_breadth().await.unwrap().is_some());
        assert!(coordinator.store.latest_distribution().await.unwrap().is_some());
        assert!(coordinator.store.latest_high_rise().await.unwrap().is_some());
        assert!(coordinator.store.latest_unified().await.unwrap().is_some());
    }
}
