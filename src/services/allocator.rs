use rand::Rng;
use std::sync::Arc;

use super::blocklist;
use super::ledger::DeletionLedger;
use super::quota::QuotaGuard;
use crate::constants::{
    ALIAS_CANDIDATE_LENGTH, ALIAS_CHARSET, ALIAS_FALLBACK_LENGTH, ERR_RENAME_NOT_FIRST,
    MAX_CANDIDATE_ATTEMPTS,
};
use crate::db::{RelayStore, UserScope};
use crate::error::{AppError, Result, ValidationError};
use crate::models::{
    AddressUpdate, AliasTarget, Counter, NewRelayAddress, Page, RelayAddress, RelaySubdomain,
    TargetRef,
};

/// Creates, edits and destroys relay addresses
#[derive(Clone)]
pub struct AliasAllocator {
    store: Arc<dyn RelayStore>,
    ledger: DeletionLedger,
    quota: QuotaGuard,
    default_domain: String,
}

/// Random lowercase alphanumeric local part
fn generate_candidate(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALIAS_CHARSET[rng.random_range(0..ALIAS_CHARSET.len())] as char)
        .collect()
}

impl AliasAllocator {
    pub fn new(
        store: Arc<dyn RelayStore>,
        ledger: DeletionLedger,
        quota: QuotaGuard,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            quota,
            default_domain: default_domain.into(),
        }
    }

    pub fn ledger(&self) -> &DeletionLedger {
        &self.ledger
    }

    // =========================================================================
    // Creation (locked)
    // =========================================================================

    /// Allocate a random alias on `target` for `owner`
    pub async fn create(
        &self,
        owner: i64,
        target: &AliasTarget,
        description: &str,
    ) -> Result<RelayAddress> {
        ensure_target_owned(owner, target)?;
        let description = checked_description(description)?;
        let limit = self.quota.alias_limit(owner).await?;
        let target_ref = target.reference();
        let full_domain = target.full_domain();

        let address = self
            .quota
            .with_user_lock(owner, |mut lease| async move {
                lease.ensure_alias_capacity(limit).await?;
                let local_part = self
                    .pick_candidate(lease.scope(), target_ref, &full_domain, generate_candidate)
                    .await?;
                let address = lease
                    .scope()
                    .insert_address(&NewRelayAddress {
                        local_part,
                        user_id: owner,
                        target: target_ref,
                        full_domain,
                        description,
                    })
                    .await?;
                Ok::<_, AppError>((lease, address))
            })
            .await?;

        tracing::info!("User {} created alias {}", owner, address.id);
        Ok(address)
    }

    /// Allocate an alias with an owner-chosen local part on their own subdomain
    pub async fn create_named(
        &self,
        owner: i64,
        subdomain: &RelaySubdomain,
        local_part: &str,
        description: &str,
    ) -> Result<RelayAddress> {
        let target = AliasTarget::Subdomain(subdomain.clone());
        ensure_target_owned(owner, &target)?;
        let description = checked_description(description)?;
        let local_part = blocklist::normalize(local_part);
        blocklist::check(&local_part)?;

        let limit = self.quota.alias_limit(owner).await?;
        let target_ref = target.reference();
        let full_domain = target.full_domain();

        let address = self
            .quota
            .with_user_lock(owner, |mut lease| async move {
                lease.ensure_alias_capacity(limit).await?;
                if lease.scope().address_taken(&local_part, target_ref).await? {
                    return Err(ValidationError::Duplicate.into());
                }
                if self
                    .ledger
                    .is_tombstoned_in(lease.scope(), &local_part, &full_domain)
                    .await?
                {
                    tracing::info!("Rejected tombstoned literal on {}", full_domain);
                    return Err(ValidationError::Tombstoned.into());
                }
                let address = lease
                    .scope()
                    .insert_address(&NewRelayAddress {
                        local_part,
                        user_id: owner,
                        target: target_ref,
                        full_domain,
                        description,
                    })
                    .await?;
                Ok::<_, AppError>((lease, address))
            })
            .await?;

        tracing::info!("User {} created named alias {}", owner, address.id);
        Ok(address)
    }

    /// Draw candidates until one is valid, free and never used before
    ///
    /// `MAX_CANDIDATE_ATTEMPTS` at the base length, the same again at the
    /// fallback length, then `AllocationExhausted`.
    async fn pick_candidate(
        &self,
        scope: &mut dyn UserScope,
        target: TargetRef,
        full_domain: &str,
        mut next_candidate: impl FnMut(usize) -> String + Send,
    ) -> Result<String> {
        for length in [ALIAS_CANDIDATE_LENGTH, ALIAS_FALLBACK_LENGTH] {
            for _ in 0..MAX_CANDIDATE_ATTEMPTS {
                let candidate = next_candidate(length);
                if !blocklist::validate(&candidate) {
                    continue;
                }
                if scope.address_taken(&candidate, target).await? {
                    continue;
                }
                if self
                    .ledger
                    .is_tombstoned_in(scope, &candidate, full_domain)
                    .await?
                {
                    continue;
                }
                return Ok(candidate);
            }
            tracing::warn!(
                "No free alias after {} attempts at length {} on {}",
                MAX_CANDIDATE_ATTEMPTS,
                length,
                full_domain
            );
        }

        Err(AppError::AllocationExhausted)
    }

    /// Pick where a new alias goes
    ///
    /// An explicit subdomain or domain wins; otherwise the owner's subdomain if
    /// they opted into using it, else the default relay domain.
    pub async fn resolve_target(
        &self,
        owner: i64,
        domain: Option<&str>,
        subdomain_id: Option<i64>,
    ) -> Result<AliasTarget> {
        match (domain, subdomain_id) {
            (Some(_), Some(_)) => Err(ValidationError::Malformed(
                "choose either a domain or a subdomain".to_string(),
            )
            .into()),
            (None, Some(id)) => {
                let subdomain = self
                    .store
                    .subdomain_by_id(id)
                    .await?
                    .filter(|s| !s.is_deleted)
                    .ok_or(AppError::NotFound("subdomain"))?;
                let target = AliasTarget::Subdomain(subdomain);
                ensure_target_owned(owner, &target)?;
                Ok(target)
            }
            (Some(name), None) => self
                .store
                .domain_by_name(&name.trim().to_lowercase())
                .await?
                .map(AliasTarget::Domain)
                .ok_or(AppError::NotFound("domain")),
            (None, None) => {
                let preferred = self
                    .store
                    .list_subdomains(owner)
                    .await?
                    .into_iter()
                    .find(|s| s.use_subdomain);
                if let Some(subdomain) = preferred {
                    return Ok(AliasTarget::Subdomain(subdomain));
                }
                self.store
                    .domain_by_name(&self.default_domain)
                    .await?
                    .map(AliasTarget::Domain)
                    .ok_or(AppError::NotFound("domain"))
            }
        }
    }

    // =========================================================================
    // Edits and deletion (row-level only)
    // =========================================================================
    //
    // These never take the owner lock. Two concurrent renames can race on
    // the uniqueness check; the unique index on (local_part, target) decides.

    /// Change the local part of the owner's earliest alias
    pub async fn rename(&self, existing: &RelayAddress, new_local_part: &str) -> Result<RelayAddress> {
        let Some(local_part) = self.checked_rename(existing, new_local_part).await? else {
            return Ok(existing.clone());
        };

        let mut renamed = existing.clone();
        renamed.local_part = local_part;
        let renamed = self.store.update_address(&renamed).await?;

        tracing::info!("Renamed alias {} of user {}", renamed.id, renamed.user_id);
        Ok(renamed)
    }

    /// Apply owner edits in one write; only the local part is restricted to
    /// the first alias
    pub async fn update(&self, owner: i64, id: i64, changes: AddressUpdate) -> Result<RelayAddress> {
        let description = changes
            .description
            .as_deref()
            .map(checked_description)
            .transpose()?;

        let existing = self.get(owner, id).await?;
        let local_part = match changes.local_part.as_deref() {
            Some(local_part) => self.checked_rename(&existing, local_part).await?,
            None => None,
        };

        if local_part.is_none() && description.is_none() && changes.enabled.is_none() {
            return Ok(existing);
        }

        let mut address = existing;
        let renamed = local_part.is_some();
        if let Some(local_part) = local_part {
            address.local_part = local_part;
        }
        if let Some(description) = description {
            address.description = description;
        }
        if let Some(enabled) = changes.enabled {
            address.enabled = enabled;
        }
        let address = self.store.update_address(&address).await?;

        if renamed {
            tracing::info!("Renamed alias {} of user {}", address.id, address.user_id);
        }
        Ok(address)
    }

    /// Validated new local part, `None` when it equals the current one
    async fn checked_rename(
        &self,
        existing: &RelayAddress,
        new_local_part: &str,
    ) -> Result<Option<String>> {
        let local_part = blocklist::normalize(new_local_part);
        if local_part == existing.local_part {
            return Ok(None);
        }

        let earliest = self.store.earliest_address(existing.user_id).await?;
        if earliest.map(|a| a.id) != Some(existing.id) {
            return Err(AppError::PermissionDenied(ERR_RENAME_NOT_FIRST.to_string()));
        }

        blocklist::check(&local_part)?;
        if self
            .store
            .find_address(&local_part, existing.target())
            .await?
            .is_some()
        {
            return Err(ValidationError::Duplicate.into());
        }
        if self
            .ledger
            .is_tombstoned(&local_part, &existing.full_domain)
            .await?
        {
            return Err(ValidationError::Tombstoned.into());
        }

        // The old literal is not tombstoned, unlike a subdomain rename. This
        // asymmetry is intentional but unverified.
        Ok(Some(local_part))
    }

    /// Tombstone the alias, then remove its row
    ///
    /// Tombstoning first means a failure in between leaves the literal blocked
    /// rather than reusable.
    pub async fn destroy(&self, alias: &RelayAddress) -> Result<()> {
        self.ledger
            .tombstone(&alias.local_part, &alias.full_domain, alias.counters())
            .await?;
        self.store.delete_address(alias.id).await?;

        tracing::info!("Destroyed alias {} of user {}", alias.id, alias.user_id);
        Ok(())
    }

    pub async fn delete(&self, owner: i64, id: i64) -> Result<()> {
        let address = self.get(owner, id).await?;
        self.destroy(&address).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Resolve `local@domain` to an active alias
    ///
    /// System domains are tried first, then `label.domain` subdomains.
    pub async fn lookup(&self, full_address: &str) -> Result<Option<RelayAddress>> {
        let normalized = full_address.trim().to_lowercase();
        let Some((local_part, domain)) = normalized.rsplit_once('@') else {
            return Ok(None);
        };
        if local_part.is_empty() || domain.is_empty() {
            return Ok(None);
        }

        if let Some(relay_domain) = self.store.domain_by_name(domain).await? {
            return self
                .store
                .find_address(local_part, TargetRef::Domain(relay_domain.id))
                .await;
        }

        let Some((label, parent)) = domain.split_once('.') else {
            return Ok(None);
        };
        let Some(parent) = self.store.domain_by_name(parent).await? else {
            return Ok(None);
        };
        let subdomain = self
            .store
            .subdomain_by_label(label, parent.id)
            .await?
            .filter(|s| !s.is_deleted);

        match subdomain {
            Some(subdomain) => {
                self.store
                    .find_address(local_part, TargetRef::Subdomain(subdomain.id))
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn list(&self, owner: i64, page: Option<Page>) -> Result<Vec<RelayAddress>> {
        self.store.list_addresses(owner, page).await
    }

    pub async fn count(&self, owner: i64) -> Result<i64> {
        self.store.count_addresses(owner).await
    }

    pub async fn get(&self, owner: i64, id: i64) -> Result<RelayAddress> {
        let address = self
            .store
            .address_by_id(id)
            .await?
            .ok_or(AppError::NotFound("alias"))?;
        if address.user_id != owner {
            return Err(AppError::PermissionDenied(
                "alias belongs to another user".to_string(),
            ));
        }
        Ok(address)
    }

    pub async fn addresses_on(&self, subdomain: &RelaySubdomain) -> Result<Vec<RelayAddress>> {
        self.store.addresses_on_subdomain(subdomain.id).await
    }

    /// Bump one activity counter of an alias
    pub async fn record(&self, address: &RelayAddress, counter: Counter) -> Result<()> {
        self.store.increment_counter(address.id, counter).await
    }
}

fn ensure_target_owned(owner: i64, target: &AliasTarget) -> Result<()> {
    match target {
        AliasTarget::Subdomain(subdomain) if subdomain.is_deleted => {
            Err(AppError::NotFound("subdomain"))
        }
        AliasTarget::Subdomain(subdomain) if subdomain.user_id != owner => Err(
            AppError::PermissionDenied("subdomain belongs to another user".to_string()),
        ),
        _ => Ok(()),
    }
}

fn checked_description(description: &str) -> Result<String> {
    let description = description.trim();
    if !RelayAddress::validate_description(description) {
        return Err(ValidationError::Malformed(
            "description must be at most 64 characters without control characters".to_string(),
        )
        .into());
    }
    Ok(description.to_string())
}
