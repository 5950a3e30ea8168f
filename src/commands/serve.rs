use crate::error::Result;
use crate::server::{self, AppState};
use crate::services::{
    CalendarResolver, ExtremumScanner, HighRiseScanner, RefreshCoordinator,
};
use crate::utils::get_refresh_interval_secs;
use crate::worker;
use std::sync::Arc;

pub async fn run(port: u16) -> Result<()> {
    println!("Starting marketbreadth server on port {}", port);

    let provider = super::provider_from_env()?;
    let store = super::store_from_env().await?;

    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        provider.clone(),
        provider.clone(),
    ));

    let refresh_interval = get_refresh_interval_secs();
    println!("Background refresh every {} seconds", refresh_interval);
    let worker_coordinator = coordinator.clone();
    tokio::spawn(async move {
        worker::run_refresh_worker(worker_coordinator, refresh_interval).await;
    });

    let state = AppState {
        store,
        coordinator,
        scanner: Arc::new(ExtremumScanner::new(provider.clone(), provider.clone())),
        high_rise: Arc::new(HighRiseScanner::new(ExtremumScanner::new(
            provider.clone(),
            provider.clone(),
        ))),
        resolver: Arc::new(CalendarResolver::new(provider)),
    };

    server::serve(state, port).await
}
