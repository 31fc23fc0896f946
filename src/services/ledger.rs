use std::sync::Arc;

use crate::db::{RelayStore, UserScope};
use crate::error::Result;
use crate::models::{Counters, DeletedRelayAddress};
use crate::security::address_hash;

/// Append-only record of every alias ever deleted
///
/// Rows are keyed by the content hash of the full address, so a literal that
/// was deleted once stays unavailable to every user on that domain.
#[derive(Clone)]
pub struct DeletionLedger {
    store: Arc<dyn RelayStore>,
}

impl DeletionLedger {
    pub fn new(store: Arc<dyn RelayStore>) -> Self {
        Self { store }
    }

    pub async fn is_tombstoned(&self, local_part: &str, full_domain: &str) -> Result<bool> {
        self.store
            .tombstone_exists(&address_hash(local_part, full_domain))
            .await
    }

    /// Same check through a locked user scope, for use inside allocation
    pub async fn is_tombstoned_in(
        &self,
        scope: &mut dyn UserScope,
        local_part: &str,
        full_domain: &str,
    ) -> Result<bool> {
        scope
            .tombstone_exists(&address_hash(local_part, full_domain))
            .await
    }

    pub async fn tombstone(
        &self,
        local_part: &str,
        full_domain: &str,
        counters: Counters,
    ) -> Result<()> {
        let tombstone = DeletedRelayAddress::new(local_part, full_domain, counters);
        self.store.insert_tombstone(&tombstone).await?;
        tracing::info!("Tombstoned alias {}", tombstone.address_hash);
        Ok(())
    }
}
