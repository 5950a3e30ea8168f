use crate::services::RefreshCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Background loop recomputing every snapshot kind on a fixed cadence.
/// Individual failures are logged inside `refresh_all`; the loop never exits.
pub async fn run(coordinator: Arc<RefreshCoordinator>, interval_secs: u64) {
    info!(interval_secs, "Starting refresh worker");

    let mut iteration_count = 0u64;

    loop {
        iteration_count += 1;
        let loop_start = std::time::Instant::now();

        info!(iteration = iteration_count, "Refresh worker: starting cycle");
        coordinator.refresh_all().await;
        info!(
            iteration = iteration_count,
            elapsed_secs = loop_start.elapsed().as_secs(),
            "Refresh worker: cycle completed"
        );

        sleep(Duration::from_secs(interval_secs)).await;
    }
}
