pub mod addresses;
pub mod admin;
pub mod domains;
pub mod health;
pub mod inbound;
pub mod subdomains;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};

pub use addresses::{create_address, delete_address, get_address, list_addresses, update_address};
pub use admin::admin_stats;
pub use domains::list_domains;
pub use health::health_check;
pub use inbound::{destination, receive_mail};
pub use subdomains::{
    create_subdomain, delete_subdomain, get_subdomain, list_subdomains, rename_subdomain,
    use_subdomain,
};
pub use validation::AuthenticatedUser;

use crate::AppState;

/// All routes of the service, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/admin/stats", get(admin_stats))
        .route("/api/v1/domains", get(list_domains))
        .route(
            "/api/v1/relayaddresses",
            get(list_addresses).post(create_address),
        )
        .route(
            "/api/v1/relayaddresses/:id",
            get(get_address)
                .patch(update_address)
                .delete(delete_address),
        )
        .route(
            "/api/v1/subdomains",
            get(list_subdomains).post(create_subdomain),
        )
        .route(
            "/api/v1/subdomains/:id",
            get(get_subdomain)
                .patch(rename_subdomain)
                .delete(delete_subdomain),
        )
        .route("/api/v1/subdomains/:id/use", put(use_subdomain))
        .route("/inbound", post(receive_mail))
        .route("/inbound/destination", get(destination))
        .with_state(state)
}
