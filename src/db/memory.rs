//! In-process relay store.
//!
//! Mirrors the PostgreSQL semantics closely enough for tests: per-user async
//! mutexes stand in for `SELECT ... FOR UPDATE`, and scope writes are staged
//! until commit so a dropped scope rolls back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use super::{RelayStore, StoreStats, UserScope};
use crate::directory::UserDirectory;
use crate::error::{AppError, Result, ValidationError};
use crate::models::{
    Counter, DeletedRelayAddress, NewRelayAddress, NewRelaySubdomain, Page, RelayAddress,
    RelayDomain, RelaySubdomain, SubdomainTotals, TargetRef, UserRecord,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, UserRecord>,
    domains: Vec<RelayDomain>,
    subdomains: Vec<RelaySubdomain>,
    addresses: Vec<RelayAddress>,
    tombstones: Vec<DeletedRelayAddress>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn address_taken(&self, local_part: &str, target: TargetRef) -> bool {
        self.addresses
            .iter()
            .any(|a| a.local_part == local_part && a.target() == target)
    }

    fn subdomain_by_label(&self, label: &str, domain_id: i64) -> Option<RelaySubdomain> {
        self.subdomains
            .iter()
            .find(|s| s.label == label && s.domain_id == domain_id)
            .cloned()
    }

    fn full_domain(&self, target: TargetRef) -> Option<String> {
        match target {
            TargetRef::Domain(id) => self
                .domains
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.name.clone()),
            TargetRef::Subdomain(id) => self
                .subdomains
                .iter()
                .find(|s| s.id == id)
                .map(RelaySubdomain::full_domain),
        }
    }
}

/// Relay store and user directory held entirely in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    user_locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owning user (normally done by the account service)
    pub fn add_user(&self, id: i64, email: Option<&str>, premium: bool) {
        self.tables().users.insert(
            id,
            UserRecord {
                id,
                email: email.map(str::to_string),
                premium,
            },
        );
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn user_lock(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id).or_default().clone()
    }

    fn sorted_user_addresses(&self, user_id: i64) -> Vec<RelayAddress> {
        let mut addresses: Vec<RelayAddress> = self
            .tables()
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by_key(|a| (a.created_at, a.id));
        addresses
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn seed_domains(&self, names: &[String]) -> Result<()> {
        let mut tables = self.tables();
        for name in names {
            if tables.domains.iter().any(|d| &d.name == name) {
                continue;
            }
            let id = tables.next_id();
            tables.domains.push(RelayDomain {
                id,
                name: name.clone(),
            });
        }
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<RelayDomain>> {
        Ok(self.tables().domains.clone())
    }

    async fn domain_by_name(&self, name: &str) -> Result<Option<RelayDomain>> {
        Ok(self.tables().domains.iter().find(|d| d.name == name).cloned())
    }

    async fn lock_user(&self, user_id: i64) -> Result<Box<dyn UserScope>> {
        if !self.tables().users.contains_key(&user_id) {
            return Err(AppError::NotFound("user"));
        }

        let guard = self.user_lock(user_id).lock_owned().await;

        Ok(Box::new(MemoryUserScope {
            tables: self.tables.clone(),
            user_id,
            _guard: guard,
            staged_addresses: Vec::new(),
            staged_subdomains: Vec::new(),
        }))
    }

    async fn address_by_id(&self, id: i64) -> Result<Option<RelayAddress>> {
        Ok(self.tables().addresses.iter().find(|a| a.id == id).cloned())
    }

    async fn find_address(
        &self,
        local_part: &str,
        target: TargetRef,
    ) -> Result<Option<RelayAddress>> {
        Ok(self
            .tables()
            .addresses
            .iter()
            .find(|a| a.local_part == local_part && a.target() == target)
            .cloned())
    }

    async fn list_addresses(&self, user_id: i64, page: Option<Page>) -> Result<Vec<RelayAddress>> {
        let addresses = self.sorted_user_addresses(user_id);
        Ok(match page {
            Some(page) => addresses
                .into_iter()
                .skip(page.offset().max(0) as usize)
                .take(page.per_page.max(0) as usize)
                .collect(),
            None => addresses,
        })
    }

    async fn count_addresses(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .tables()
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .count() as i64)
    }

    async fn earliest_address(&self, user_id: i64) -> Result<Option<RelayAddress>> {
        Ok(self.sorted_user_addresses(user_id).into_iter().next())
    }

    async fn addresses_on_subdomain(&self, subdomain_id: i64) -> Result<Vec<RelayAddress>> {
        Ok(self
            .tables()
            .addresses
            .iter()
            .filter(|a| a.subdomain_id == Some(subdomain_id))
            .cloned()
            .collect())
    }

    async fn update_address(&self, address: &RelayAddress) -> Result<RelayAddress> {
        let mut tables = self.tables();

        let clash = tables.addresses.iter().any(|a| {
            a.id != address.id
                && a.local_part == address.local_part
                && a.target() == address.target()
        });
        if clash {
            return Err(ValidationError::Duplicate.into());
        }

        let stored = tables
            .addresses
            .iter_mut()
            .find(|a| a.id == address.id)
            .ok_or(AppError::NotFound("alias"))?;
        stored.local_part = address.local_part.clone();
        stored.description = address.description.clone();
        stored.enabled = address.enabled;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_address(&self, id: i64) -> Result<()> {
        self.tables().addresses.retain(|a| a.id != id);
        Ok(())
    }

    async fn increment_counter(&self, id: i64, counter: Counter) -> Result<()> {
        let mut tables = self.tables();
        let address = tables
            .addresses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AppError::NotFound("alias"))?;
        match counter {
            Counter::Forwarded => address.num_forwarded += 1,
            Counter::Blocked => address.num_blocked += 1,
            Counter::Replied => address.num_replied += 1,
            Counter::Spam => address.num_spam += 1,
        }
        Ok(())
    }

    async fn tombstone_exists(&self, address_hash: &str) -> Result<bool> {
        Ok(self
            .tables()
            .tombstones
            .iter()
            .any(|t| t.address_hash == address_hash))
    }

    async fn insert_tombstone(&self, tombstone: &DeletedRelayAddress) -> Result<()> {
        self.tables().tombstones.push(tombstone.clone());
        Ok(())
    }

    async fn subdomain_by_id(&self, id: i64) -> Result<Option<RelaySubdomain>> {
        Ok(self.tables().subdomains.iter().find(|s| s.id == id).cloned())
    }

    async fn subdomain_by_label(
        &self,
        label: &str,
        domain_id: i64,
    ) -> Result<Option<RelaySubdomain>> {
        Ok(self.tables().subdomain_by_label(label, domain_id))
    }

    async fn list_subdomains(&self, user_id: i64) -> Result<Vec<RelaySubdomain>> {
        Ok(self
            .tables()
            .subdomains
            .iter()
            .filter(|s| s.user_id == user_id && !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn subdomain_totals(&self, subdomain_id: i64) -> Result<SubdomainTotals> {
        let tables = self.tables();
        let totals = tables
            .addresses
            .iter()
            .filter(|a| a.subdomain_id == Some(subdomain_id))
            .fold(SubdomainTotals::default(), |mut totals, a| {
                totals.num_addresses += 1;
                totals.num_forwarded += a.num_forwarded;
                totals.num_blocked += a.num_blocked;
                totals.num_spam += a.num_spam;
                totals
            });
        Ok(totals)
    }

    async fn relabel_subdomain(
        &self,
        id: i64,
        new_label: &str,
        old_label: &str,
    ) -> Result<RelaySubdomain> {
        let mut tables = self.tables();

        let current = tables
            .subdomains
            .iter()
            .find(|s| s.id == id && !s.is_deleted)
            .cloned()
            .ok_or(AppError::NotFound("subdomain"))?;

        if tables
            .subdomain_by_label(new_label, current.domain_id)
            .is_some()
        {
            return Err(ValidationError::Duplicate.into());
        }

        let tombstone_id = tables.next_id();
        tables.subdomains.push(RelaySubdomain {
            id: tombstone_id,
            label: old_label.to_string(),
            created_at: Utc::now(),
            is_deleted: true,
            use_subdomain: false,
            ..current.clone()
        });

        let stored = tables
            .subdomains
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("subdomain"))?;
        stored.label = new_label.to_string();
        Ok(stored.clone())
    }

    async fn mark_subdomain_deleted(&self, id: i64) -> Result<()> {
        if let Some(subdomain) = self.tables().subdomains.iter_mut().find(|s| s.id == id) {
            subdomain.is_deleted = true;
            subdomain.use_subdomain = false;
        }
        Ok(())
    }

    async fn set_use_subdomain(&self, id: i64, use_subdomain: bool) -> Result<RelaySubdomain> {
        let mut tables = self.tables();
        let subdomain = tables
            .subdomains
            .iter_mut()
            .find(|s| s.id == id && !s.is_deleted)
            .ok_or(AppError::NotFound("subdomain"))?;
        subdomain.use_subdomain = use_subdomain;
        Ok(subdomain.clone())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.tables();
        let deleted_subdomains = tables.subdomains.iter().filter(|s| s.is_deleted).count() as i64;
        Ok(StoreStats {
            active_addresses: tables.addresses.len() as i64,
            tombstones: tables.tombstones.len() as i64,
            active_subdomains: tables.subdomains.len() as i64 - deleted_subdomains,
            deleted_subdomains,
        })
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>> {
        Ok(self.tables().users.get(&user_id).cloned())
    }
}

/// Holds one user's async mutex; writes land in the shared tables on commit
struct MemoryUserScope {
    tables: Arc<Mutex<Tables>>,
    user_id: i64,
    _guard: OwnedMutexGuard<()>,
    staged_addresses: Vec<RelayAddress>,
    staged_subdomains: Vec<RelaySubdomain>,
}

impl MemoryUserScope {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserScope for MemoryUserScope {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    async fn count_addresses(&mut self) -> Result<i64> {
        let committed = self
            .tables()
            .addresses
            .iter()
            .filter(|a| a.user_id == self.user_id)
            .count();
        Ok((committed + self.staged_addresses.len()) as i64)
    }

    async fn address_taken(&mut self, local_part: &str, target: TargetRef) -> Result<bool> {
        let staged = self
            .staged_addresses
            .iter()
            .any(|a| a.local_part == local_part && a.target() == target);
        Ok(staged || self.tables().address_taken(local_part, target))
    }

    async fn tombstone_exists(&mut self, address_hash: &str) -> Result<bool> {
        Ok(self
            .tables()
            .tombstones
            .iter()
            .any(|t| t.address_hash == address_hash))
    }

    async fn insert_address(&mut self, address: &NewRelayAddress) -> Result<RelayAddress> {
        if self.address_taken(&address.local_part, address.target).await? {
            return Err(ValidationError::Duplicate.into());
        }

        let (id, full_domain) = {
            let mut tables = self.tables();
            let full_domain = tables
                .full_domain(address.target)
                .unwrap_or_else(|| address.full_domain.clone());
            (tables.next_id(), full_domain)
        };

        let (domain_id, subdomain_id) = match address.target {
            TargetRef::Domain(id) => (Some(id), None),
            TargetRef::Subdomain(id) => (None, Some(id)),
        };
        let now = Utc::now();
        let inserted = RelayAddress {
            id,
            local_part: address.local_part.clone(),
            user_id: address.user_id,
            domain_id,
            subdomain_id,
            full_domain,
            enabled: true,
            description: address.description.clone(),
            created_at: now,
            updated_at: now,
            num_forwarded: 0,
            num_blocked: 0,
            num_replied: 0,
            num_spam: 0,
        };
        self.staged_addresses.push(inserted.clone());
        Ok(inserted)
    }

    async fn count_active_subdomains(&mut self) -> Result<i64> {
        let committed = self
            .tables()
            .subdomains
            .iter()
            .filter(|s| s.user_id == self.user_id && !s.is_deleted)
            .count();
        Ok((committed + self.staged_subdomains.len()) as i64)
    }

    async fn subdomain_by_label(
        &mut self,
        label: &str,
        domain_id: i64,
    ) -> Result<Option<RelaySubdomain>> {
        if let Some(staged) = self
            .staged_subdomains
            .iter()
            .find(|s| s.label == label && s.domain_id == domain_id)
        {
            return Ok(Some(staged.clone()));
        }
        Ok(self.tables().subdomain_by_label(label, domain_id))
    }

    async fn insert_subdomain(&mut self, subdomain: &NewRelaySubdomain) -> Result<RelaySubdomain> {
        if self
            .subdomain_by_label(&subdomain.label, subdomain.domain_id)
            .await?
            .is_some()
        {
            return Err(ValidationError::Duplicate.into());
        }

        let inserted = {
            let mut tables = self.tables();
            let domain = tables
                .domains
                .iter()
                .find(|d| d.id == subdomain.domain_id)
                .map(|d| d.name.clone())
                .ok_or(AppError::NotFound("domain"))?;
            RelaySubdomain {
                id: tables.next_id(),
                label: subdomain.label.clone(),
                user_id: subdomain.user_id,
                domain_id: subdomain.domain_id,
                domain,
                created_at: Utc::now(),
                is_deleted: false,
                use_subdomain: false,
            }
        };
        self.staged_subdomains.push(inserted.clone());
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUserScope {
            tables,
            staged_addresses,
            staged_subdomains,
            _guard,
            ..
        } = *self;

        let mut tables = tables.lock().unwrap_or_else(PoisonError::into_inner);
        // Unique (label, domain) and (local_part, target) across concurrent scopes
        let conflict = staged_addresses
            .iter()
            .any(|a| tables.address_taken(&a.local_part, a.target()))
            || staged_subdomains
                .iter()
                .any(|s| tables.subdomain_by_label(&s.label, s.domain_id).is_some());
        if conflict {
            return Err(ValidationError::Duplicate.into());
        }
        tables.addresses.extend(staged_addresses);
        tables.subdomains.extend(staged_subdomains);
        drop(tables);
        drop(_guard);
        Ok(())
    }
}
