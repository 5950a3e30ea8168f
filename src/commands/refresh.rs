use crate::error::{AppError, Result};
use crate::models::SnapshotKind;
use crate::services::RefreshCoordinator;
use std::str::FromStr;
use std::sync::Arc;

pub async fn run(kind: Option<String>) -> Result<()> {
    let provider = super::provider_from_env()?;
    let store = super::store_from_env().await?;
    let coordinator = Arc::new(RefreshCoordinator::new(
        store,
        provider.clone(),
        provider,
    ));

    match kind {
        Some(kind) => {
            let kind = SnapshotKind::from_str(&kind).map_err(AppError::Config)?;
            println!("Refreshing {} snapshot...", kind);
            coordinator.refresh(kind).await?;
            println!("Done.");
        }
        None => {
            println!("Refreshing all snapshots...");
            coordinator.refresh_all().await;
            println!("Done.");
        }
    }
    Ok(())
}
