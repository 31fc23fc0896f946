use std::future::Future;
use std::sync::Arc;

use crate::constants::MAX_ACTIVE_SUBDOMAINS;
use crate::db::{RelayStore, UserScope};
use crate::directory::UserDirectory;
use crate::error::{AppError, Result};

/// Serializes allocation for one user and enforces their limits
///
/// The lock is exclusive per owning user and spans the whole check-then-insert,
/// so concurrent creates for one user cannot both see spare quota. Rename and
/// destroy do not take it; they rely on single-row update semantics instead.
#[derive(Clone)]
pub struct QuotaGuard {
    store: Arc<dyn RelayStore>,
    directory: Arc<dyn UserDirectory>,
    max_free_aliases: i64,
}

/// Locked scope handed to a [`QuotaGuard::with_user_lock`] action
///
/// Returning the lease from the action commits its writes; dropping it rolls
/// them back and releases the lock.
pub struct UserLease {
    scope: Box<dyn UserScope>,
}

impl QuotaGuard {
    pub fn new(
        store: Arc<dyn RelayStore>,
        directory: Arc<dyn UserDirectory>,
        max_free_aliases: i64,
    ) -> Self {
        Self {
            store,
            directory,
            max_free_aliases,
        }
    }

    /// Run `action` while holding the owner's exclusive lock
    pub async fn with_user_lock<T, F, Fut>(&self, user_id: i64, action: F) -> Result<T>
    where
        F: FnOnce(UserLease) -> Fut,
        Fut: Future<Output = Result<(UserLease, T)>>,
    {
        let scope = self.store.lock_user(user_id).await?;
        let (lease, value) = action(UserLease { scope }).await?;
        lease.scope.commit().await?;
        Ok(value)
    }

    /// Alias limit for the owner, `None` when their plan is unlimited
    pub async fn alias_limit(&self, user_id: i64) -> Result<Option<i64>> {
        let unlimited = self
            .directory
            .has_unlimited_aliases(user_id)
            .await
            .map_err(|e| AppError::ExternalDependency(format!("plan lookup: {}", e)))?;

        Ok(if unlimited {
            None
        } else {
            Some(self.max_free_aliases)
        })
    }
}

impl UserLease {
    pub fn user_id(&self) -> i64 {
        self.scope.user_id()
    }

    pub fn scope(&mut self) -> &mut dyn UserScope {
        self.scope.as_mut()
    }

    /// Fail unless one more alias fits under `limit`
    pub async fn ensure_alias_capacity(&mut self, limit: Option<i64>) -> Result<()> {
        let Some(limit) = limit else {
            return Ok(());
        };

        let current = self.scope.count_addresses().await?;
        if current >= limit {
            tracing::warn!(
                "User {} hit the alias quota ({}/{})",
                self.user_id(),
                current,
                limit
            );
            return Err(AppError::QuotaExceeded {
                resource: "aliases",
                limit,
            });
        }
        Ok(())
    }

    /// Fail if the owner already holds a live subdomain
    pub async fn ensure_subdomain_capacity(&mut self) -> Result<()> {
        let current = self.scope.count_active_subdomains().await?;
        if current >= MAX_ACTIVE_SUBDOMAINS {
            tracing::warn!("User {} already has an active subdomain", self.user_id());
            return Err(AppError::QuotaExceeded {
                resource: "subdomains",
                limit: MAX_ACTIVE_SUBDOMAINS,
            });
        }
        Ok(())
    }
}
