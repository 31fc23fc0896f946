//! Relay Alias Server Library
//!
//! Disposable email aliases, per-user relay subdomains, a permanent deletion
//! ledger and the inbound webhook that routes mail to alias owners.

pub mod config;
pub mod constants;
pub mod db;
pub mod directory;
pub mod error;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

pub use config::Config;
pub use db::{MemoryStore, PgStore, RelayStore};
pub use error::{AppError, Result};

use std::sync::Arc;

use directory::UserDirectory;
use jobs::JobSinks;
use services::{AliasAllocator, DeletionLedger, MailRouter, QuotaGuard, SubdomainManager};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RelayStore>,
    pub aliases: AliasAllocator,
    pub subdomains: SubdomainManager,
    pub inbound: MailRouter,
}

impl AppState {
    /// Wire the services over one store, user directory and pair of job sinks
    pub fn new(
        config: Config,
        store: Arc<dyn RelayStore>,
        directory: Arc<dyn UserDirectory>,
        sinks: JobSinks,
    ) -> Self {
        let default_domain = config.default_domain().to_string();
        let ledger = DeletionLedger::new(store.clone());
        let quota = QuotaGuard::new(store.clone(), directory.clone(), config.max_free_aliases);
        let aliases = AliasAllocator::new(store.clone(), ledger, quota.clone(), &default_domain);
        let subdomains = SubdomainManager::new(
            store.clone(),
            aliases.clone(),
            quota,
            sinks.provisioning,
            &default_domain,
        );
        let inbound = MailRouter::new(
            aliases.clone(),
            directory,
            sinks.forwarding,
            config.inbound_token.clone(),
        );

        Self {
            config,
            store,
            aliases,
            subdomains,
            inbound,
        }
    }
}
