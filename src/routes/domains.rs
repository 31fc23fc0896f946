use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::RelayDomain;
use crate::AppState;

/// GET /api/v1/domains
pub async fn list_domains(State(state): State<AppState>) -> Result<Json<Vec<RelayDomain>>> {
    Ok(Json(state.store.list_domains().await?))
}
