pub mod check;
pub mod refresh;
pub mod serve;
pub mod status;

use crate::error::{AppError, Result};
use crate::services::{ProApiClient, SnapshotStore};
use crate::utils::{get_database_path, get_provider_base_url, get_provider_token};
use std::sync::Arc;

/// Build the provider client from the environment. The token is required;
/// everything else has defaults.
pub(crate) fn provider_from_env() -> Result<Arc<ProApiClient>> {
    let token = get_provider_token();
    if token.is_empty() {
        return Err(AppError::Config(
            "PROVIDER_TOKEN is not set".to_string(),
        ));
    }
    Ok(Arc::new(ProApiClient::new(
        get_provider_base_url(),
        token,
        crate::constants::DEFAULT_RATE_LIMIT_PER_MINUTE,
    )?))
}

pub(crate) async fn store_from_env() -> Result<Arc<SnapshotStore>> {
    Ok(Arc::new(SnapshotStore::new(get_database_path()).await?))
}
