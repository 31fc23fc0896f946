use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Deserialize;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OWNER_HEADER};
use crate::error::AppError;
use crate::models::Page;

/// Owning user, identified by the header the authentication layer sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Request without owner header");
                AppError::Unauthorized
            })?;

        parse_owner(raw).map(AuthenticatedUser).ok_or_else(|| {
            tracing::warn!("Malformed owner header");
            AppError::Unauthorized
        })
    }
}

/// Positive user id from the owner header
pub fn parse_owner(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

/// `?paginate=true&page=&per_page=` on listing endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub paginate: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListQuery {
    /// Requested page, clamped; `None` when pagination is off
    pub fn page(&self) -> Option<Page> {
        if !self.paginate {
            return None;
        }
        Some(Page {
            page: self.page.unwrap_or(1).max(1),
            per_page: self
                .per_page
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        })
    }
}
