use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ValidationError};
use crate::services::Delivery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct DestinationQuery {
    #[serde(default)]
    pub token: String,
    pub relay_address: String,
}

#[derive(Debug, Serialize)]
pub struct DestinationResponse {
    pub user_id: i64,
}

/// POST /inbound?token=...
///
/// Unroutable mail is answered with 200 and `success: false` so the provider
/// does not keep retrying it.
pub async fn receive_mail(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    body: String,
) -> Result<Json<Value>> {
    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| ValidationError::Malformed(format!("invalid JSON body: {}", e)))?;

    let response = match state.inbound.handle(&query.token, payload).await? {
        Delivery::Forwarded { .. } => json!({ "success": true }),
        Delivery::Unresolved(reason) => json!({ "success": false, "error": reason }),
    };

    Ok(Json(response))
}

/// GET /inbound/destination?token=...&relay_address=...
pub async fn destination(
    State(state): State<AppState>,
    Query(query): Query<DestinationQuery>,
) -> Result<Json<DestinationResponse>> {
    let user_id = state
        .inbound
        .destination(&query.token, &query.relay_address)
        .await?;
    Ok(Json(DestinationResponse { user_id }))
}
