use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::validation::{AuthenticatedUser, ListQuery};
use crate::error::{Result, ValidationError};
use crate::models::{AddressUpdate, AliasTarget, RelayAddress};
use crate::AppState;

/// Body of `POST /api/v1/relayaddresses`
#[derive(Debug, Default, Deserialize)]
pub struct CreateAddressRequest {
    /// Relay domain name; defaults to the owner's preferred target
    pub domain: Option<String>,
    pub subdomain_id: Option<i64>,
    /// Only allowed on the owner's own subdomain
    pub local_part: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct RelayAddressResponse {
    #[serde(flatten)]
    pub address: RelayAddress,
    pub full_address: String,
}

impl From<RelayAddress> for RelayAddressResponse {
    fn from(address: RelayAddress) -> Self {
        Self {
            full_address: address.full_address(),
            address,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Plain array, or `{data, meta}` when `paginate=true`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AddressListResponse {
    All(Vec<RelayAddressResponse>),
    Paginated {
        data: Vec<RelayAddressResponse>,
        meta: PaginationMeta,
    },
}

/// GET /api/v1/relayaddresses
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<AddressListResponse>> {
    let page = query.page();
    let data: Vec<RelayAddressResponse> = state
        .aliases
        .list(owner, page)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let response = match page {
        Some(page) => AddressListResponse::Paginated {
            data,
            meta: PaginationMeta {
                page: page.page,
                per_page: page.per_page,
                total: state.aliases.count(owner).await?,
            },
        },
        None => AddressListResponse::All(data),
    };

    Ok(Json(response))
}

/// POST /api/v1/relayaddresses
pub async fn create_address(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<RelayAddressResponse>)> {
    let target = state
        .aliases
        .resolve_target(owner, payload.domain.as_deref(), payload.subdomain_id)
        .await?;

    let address = match (payload.local_part.as_deref(), &target) {
        (Some(local_part), AliasTarget::Subdomain(subdomain)) => {
            state
                .aliases
                .create_named(owner, subdomain, local_part, &payload.description)
                .await?
        }
        (Some(_), AliasTarget::Domain(_)) => {
            return Err(ValidationError::Malformed(
                "a chosen local part requires one of your subdomains".to_string(),
            )
            .into())
        }
        (None, _) => {
            state
                .aliases
                .create(owner, &target, &payload.description)
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(address.into())))
}

/// GET /api/v1/relayaddresses/:id
pub async fn get_address(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RelayAddressResponse>> {
    let address = state.aliases.get(owner, id).await?;
    Ok(Json(address.into()))
}

/// PATCH /api/v1/relayaddresses/:id
pub async fn update_address(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(changes): Json<AddressUpdate>,
) -> Result<Json<RelayAddressResponse>> {
    let address = state.aliases.update(owner, id, changes).await?;
    Ok(Json(address.into()))
}

/// DELETE /api/v1/relayaddresses/:id
pub async fn delete_address(
    State(state): State<AppState>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.aliases.delete(owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
