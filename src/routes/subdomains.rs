use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::validation::AuthenticatedUser;
use crate::error::Result;
use crate::models::{RelaySubdomain, SubdomainDetail};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSubdomainRequest {
    pub label: String,
    /// Parent relay domain; defaults to the first configured one
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSubdomainRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct UseSubdomainRequest {
    pub use_subdomain: bool,
}

/// GET /api/v1/subdomains
pub async fn list_subdomains(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
) -> Result<Json<Vec<SubdomainDetail>>> {
    Ok(Json(state.subdomains.list(owner).await?))
}

/// POST /api/v1/subdomains
pub async fn create_subdomain(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Json(payload): Json<CreateSubdomainRequest>,
) -> Result<(StatusCode, Json<SubdomainDetail>)> {
    let subdomain = state
        .subdomains
        .create(owner, &payload.label, payload.domain.as_deref())
        .await?;
    let detail = SubdomainDetail::new(subdomain, Default::default());
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/subdomains/:id
pub async fn get_subdomain(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SubdomainDetail>> {
    Ok(Json(state.subdomains.get(owner, id).await?))
}

/// PATCH /api/v1/subdomains/:id
///
/// Renaming destroys every alias on the old label.
pub async fn rename_subdomain(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<RenameSubdomainRequest>,
) -> Result<Json<SubdomainDetail>> {
    state.subdomains.rename(owner, id, &payload.label).await?;
    Ok(Json(state.subdomains.get(owner, id).await?))
}

/// DELETE /api/v1/subdomains/:id
pub async fn delete_subdomain(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.subdomains.destroy(owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/subdomains/:id/use
pub async fn use_subdomain(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UseSubdomainRequest>,
) -> Result<Json<RelaySubdomain>> {
    let subdomain = state
        .subdomains
        .set_use_subdomain(owner, id, payload.use_subdomain)
        .await?;
    Ok(Json(subdomain))
}
