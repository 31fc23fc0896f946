use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::StoreStats;
use crate::security::verify_shared_token;
use crate::{AppError, AppState, error::Result};

/// Query parameters for admin stats endpoint
#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    /// Admin secret key for authentication
    #[serde(default)]
    pub key: String,
}

/// Admin stats endpoint
///
/// Returns alias, tombstone and subdomain counts for monitoring.
/// Requires admin secret key passed as query parameter.
///
/// GET /admin/stats?key=<admin_secret_key>
pub async fn admin_stats(
    State(state): State<AppState>,
    Query(params): Query<AdminQuery>,
) -> Result<Json<StoreStats>> {
    // Check if admin endpoints are enabled
    let admin_key = state
        .config
        .admin_secret_key
        .as_ref()
        .ok_or(AppError::Unauthorized)?;

    if !verify_shared_token(&params.key, admin_key) {
        tracing::warn!("Invalid admin key attempt");
        return Err(AppError::Unauthorized);
    }

    let stats = state.store.stats().await?;

    tracing::info!(
        "Admin stats requested: {} aliases, {} tombstones, {} subdomains",
        stats.active_addresses,
        stats.tombstones,
        stats.active_subdomains
    );

    Ok(Json(stats))
}
