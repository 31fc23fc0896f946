//! Storage seam for aliases, subdomains and the deletion ledger.
//!
//! `PgStore` backs the running service; `MemoryStore` keeps the same semantics
//! in process for tests. Allocation paths go through a [`UserScope`], which
//! holds the owning user's exclusive lock until it is committed or dropped.

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    Counter, DeletedRelayAddress, NewRelayAddress, NewRelaySubdomain, Page, RelayAddress,
    RelayDomain, RelaySubdomain, SubdomainTotals, TargetRef,
};

/// Row counts reported by `/admin/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active_addresses: i64,
    pub tombstones: i64,
    pub active_subdomains: i64,
    pub deleted_subdomains: i64,
}

/// Persistent state of the relay subsystem
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // Domain catalog
    // -------------------------------------------------------------------------

    /// Insert catalog domains that are not present yet
    async fn seed_domains(&self, names: &[String]) -> Result<()>;

    async fn list_domains(&self) -> Result<Vec<RelayDomain>>;

    async fn domain_by_name(&self, name: &str) -> Result<Option<RelayDomain>>;

    // -------------------------------------------------------------------------
    // Locked allocation scope
    // -------------------------------------------------------------------------

    /// Take the exclusive per-user lock; fails with NotFound for unknown users
    async fn lock_user(&self, user_id: i64) -> Result<Box<dyn UserScope>>;

    // -------------------------------------------------------------------------
    // Addresses
    // -------------------------------------------------------------------------

    async fn address_by_id(&self, id: i64) -> Result<Option<RelayAddress>>;

    /// Active alias with this local part on the target
    async fn find_address(&self, local_part: &str, target: TargetRef)
        -> Result<Option<RelayAddress>>;

    /// Owner's aliases, oldest first
    async fn list_addresses(&self, user_id: i64, page: Option<Page>) -> Result<Vec<RelayAddress>>;

    async fn count_addresses(&self, user_id: i64) -> Result<i64>;

    /// Owner's earliest-created alias
    async fn earliest_address(&self, user_id: i64) -> Result<Option<RelayAddress>>;

    async fn addresses_on_subdomain(&self, subdomain_id: i64) -> Result<Vec<RelayAddress>>;

    /// Persist local part, description and enabled flag of an existing alias
    async fn update_address(&self, address: &RelayAddress) -> Result<RelayAddress>;

    async fn delete_address(&self, id: i64) -> Result<()>;

    async fn increment_counter(&self, id: i64, counter: Counter) -> Result<()>;

    // -------------------------------------------------------------------------
    // Deletion ledger (append-only)
    // -------------------------------------------------------------------------

    async fn tombstone_exists(&self, address_hash: &str) -> Result<bool>;

    async fn insert_tombstone(&self, tombstone: &DeletedRelayAddress) -> Result<()>;

    // -------------------------------------------------------------------------
    // Subdomains
    // -------------------------------------------------------------------------

    async fn subdomain_by_id(&self, id: i64) -> Result<Option<RelaySubdomain>>;

    /// Any row holding this label on the domain, deleted or not
    async fn subdomain_by_label(&self, label: &str, domain_id: i64)
        -> Result<Option<RelaySubdomain>>;

    /// Owner's non-deleted subdomains
    async fn list_subdomains(&self, user_id: i64) -> Result<Vec<RelaySubdomain>>;

    async fn subdomain_totals(&self, subdomain_id: i64) -> Result<SubdomainTotals>;

    /// Move the row to `new_label` and persist a deleted row holding `old_label`
    async fn relabel_subdomain(
        &self,
        id: i64,
        new_label: &str,
        old_label: &str,
    ) -> Result<RelaySubdomain>;

    async fn mark_subdomain_deleted(&self, id: i64) -> Result<()>;

    async fn set_use_subdomain(&self, id: i64, use_subdomain: bool) -> Result<RelaySubdomain>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Operations available while holding a user's allocation lock
///
/// Dropping the scope without [`UserScope::commit`] rolls back its writes and
/// releases the lock.
#[async_trait]
pub trait UserScope: Send {
    fn user_id(&self) -> i64;

    async fn count_addresses(&mut self) -> Result<i64>;

    async fn address_taken(&mut self, local_part: &str, target: TargetRef) -> Result<bool>;

    async fn tombstone_exists(&mut self, address_hash: &str) -> Result<bool>;

    async fn insert_address(&mut self, address: &NewRelayAddress) -> Result<RelayAddress>;

    async fn count_active_subdomains(&mut self) -> Result<i64>;

    async fn subdomain_by_label(&mut self, label: &str, domain_id: i64)
        -> Result<Option<RelaySubdomain>>;

    async fn insert_subdomain(&mut self, subdomain: &NewRelaySubdomain) -> Result<RelaySubdomain>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
