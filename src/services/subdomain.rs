use std::sync::Arc;

use super::allocator::AliasAllocator;
use super::blocklist;
use super::quota::QuotaGuard;
use crate::db::RelayStore;
use crate::error::{AppError, Result, ValidationError};
use crate::jobs::{Job, JobSink};
use crate::models::{NewRelaySubdomain, RelayDomain, RelaySubdomain, SubdomainDetail};

/// Lifecycle of per-user subdomains and their DNS identities
#[derive(Clone)]
pub struct SubdomainManager {
    store: Arc<dyn RelayStore>,
    aliases: AliasAllocator,
    quota: QuotaGuard,
    provisioning: Arc<dyn JobSink>,
    default_domain: String,
}

impl SubdomainManager {
    pub fn new(
        store: Arc<dyn RelayStore>,
        aliases: AliasAllocator,
        quota: QuotaGuard,
        provisioning: Arc<dyn JobSink>,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            aliases,
            quota,
            provisioning,
            default_domain: default_domain.into(),
        }
    }

    /// Claim `label` under `domain` (or the default relay domain)
    pub async fn create(
        &self,
        owner: i64,
        label: &str,
        domain: Option<&str>,
    ) -> Result<RelaySubdomain> {
        let label = blocklist::normalize(label);
        blocklist::check(&label)?;
        let domain = self.parent_domain(domain).await?;

        let subdomain = self
            .quota
            .with_user_lock(owner, |mut lease| async move {
                lease.ensure_subdomain_capacity().await?;
                match lease.scope().subdomain_by_label(&label, domain.id).await? {
                    Some(existing) if existing.is_deleted => {
                        return Err(ValidationError::Tombstoned.into())
                    }
                    Some(_) => return Err(ValidationError::Duplicate.into()),
                    None => {}
                }
                let subdomain = lease
                    .scope()
                    .insert_subdomain(&NewRelaySubdomain {
                        label,
                        user_id: owner,
                        domain_id: domain.id,
                    })
                    .await?;
                Ok::<_, AppError>((lease, subdomain))
            })
            .await?;

        tracing::info!(
            "User {} claimed subdomain {}",
            owner,
            subdomain.full_domain()
        );
        self.provision(&subdomain).await?;

        Ok(subdomain)
    }

    /// Move the subdomain to `new_label`
    ///
    /// Every alias on the old label is destroyed first. Mail to the subdomain
    /// is unroutable between the delete and create identity jobs; the worker
    /// closes that gap eventually.
    pub async fn rename(&self, owner: i64, id: i64, new_label: &str) -> Result<RelaySubdomain> {
        let subdomain = self.owned(owner, id).await?;
        let new_label = blocklist::normalize(new_label);
        if new_label == subdomain.label {
            return Ok(subdomain);
        }

        blocklist::check(&new_label)?;
        self.ensure_label_free(&new_label, subdomain.domain_id)
            .await?;

        let destroyed = self.destroy_aliases(&subdomain).await?;
        self.provisioning
            .send(Job::delete_identity(subdomain.full_domain()))
            .await?;
        let renamed = self
            .store
            .relabel_subdomain(subdomain.id, &new_label, &subdomain.label)
            .await?;
        self.provision(&renamed).await?;

        tracing::info!(
            "Renamed subdomain {} to {} ({} aliases destroyed)",
            subdomain.full_domain(),
            renamed.full_domain(),
            destroyed
        );
        Ok(renamed)
    }

    /// Destroy every alias on the subdomain and retire its label for good
    pub async fn destroy(&self, owner: i64, id: i64) -> Result<()> {
        let subdomain = self.owned(owner, id).await?;

        let destroyed = self.destroy_aliases(&subdomain).await?;
        self.provisioning
            .send(Job::delete_identity(subdomain.full_domain()))
            .await?;
        self.store.mark_subdomain_deleted(subdomain.id).await?;

        tracing::info!(
            "Deleted subdomain {} ({} aliases destroyed)",
            subdomain.full_domain(),
            destroyed
        );
        Ok(())
    }

    pub async fn list(&self, owner: i64) -> Result<Vec<SubdomainDetail>> {
        let subdomains = self.store.list_subdomains(owner).await?;
        let mut details = Vec::with_capacity(subdomains.len());
        for subdomain in subdomains {
            let totals = self.store.subdomain_totals(subdomain.id).await?;
            details.push(SubdomainDetail::new(subdomain, totals));
        }
        Ok(details)
    }

    pub async fn get(&self, owner: i64, id: i64) -> Result<SubdomainDetail> {
        let subdomain = self.owned(owner, id).await?;
        let totals = self.store.subdomain_totals(subdomain.id).await?;
        Ok(SubdomainDetail::new(subdomain, totals))
    }

    /// Toggle whether new aliases default to this subdomain
    pub async fn set_use_subdomain(
        &self,
        owner: i64,
        id: i64,
        use_subdomain: bool,
    ) -> Result<RelaySubdomain> {
        let subdomain = self.owned(owner, id).await?;
        self.store
            .set_use_subdomain(subdomain.id, use_subdomain)
            .await
    }

    /// Live subdomain `id`, checked against `owner`
    pub async fn owned(&self, owner: i64, id: i64) -> Result<RelaySubdomain> {
        let subdomain = self
            .store
            .subdomain_by_id(id)
            .await?
            .filter(|s| !s.is_deleted)
            .ok_or(AppError::NotFound("subdomain"))?;
        if subdomain.user_id != owner {
            return Err(AppError::PermissionDenied(
                "subdomain belongs to another user".to_string(),
            ));
        }
        Ok(subdomain)
    }

    /// Emit the create identity job for a subdomain already stored under its label
    ///
    /// A retry by the client cannot re-emit it (the label is taken), so a
    /// failure is logged with the domain for manual re-provisioning.
    async fn provision(&self, subdomain: &RelaySubdomain) -> Result<()> {
        let domain = subdomain.full_domain();
        if let Err(e) = self.provisioning.send(Job::create_identity(&domain)).await {
            tracing::error!(
                "Subdomain {} of user {} stored without its identity job: {}",
                domain,
                subdomain.user_id,
                e
            );
            return Err(e);
        }
        Ok(())
    }

    async fn parent_domain(&self, domain: Option<&str>) -> Result<RelayDomain> {
        let name = domain
            .map(|d| d.trim().to_lowercase())
            .unwrap_or_else(|| self.default_domain.clone());
        self.store
            .domain_by_name(&name)
            .await?
            .ok_or(AppError::NotFound("domain"))
    }

    /// Labels are claimed once per domain, including by deleted rows
    async fn ensure_label_free(&self, label: &str, domain_id: i64) -> Result<()> {
        match self.store.subdomain_by_label(label, domain_id).await? {
            Some(existing) if existing.is_deleted => Err(ValidationError::Tombstoned.into()),
            Some(_) => Err(ValidationError::Duplicate.into()),
            None => Ok(()),
        }
    }

    async fn destroy_aliases(&self, subdomain: &RelaySubdomain) -> Result<usize> {
        let addresses = self.aliases.addresses_on(subdomain).await?;
        for address in &addresses {
            self.aliases.destroy(address).await?;
        }
        Ok(addresses.len())
    }
}
