//! PostgreSQL implementation of the relay store.

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};

use super::{RelayStore, StoreStats, UserScope};
use crate::directory::UserDirectory;
use crate::error::{AppError, Result, ValidationError};
use crate::models::{
    Counter, DeletedRelayAddress, NewRelayAddress, NewRelaySubdomain, Page, RelayAddress,
    RelayDomain, RelaySubdomain, SubdomainTotals, TargetRef, UserRecord,
};

/// PostgreSQL error code for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

const ADDRESS_SELECT: &str = "SELECT a.id, a.local_part, a.user_id, a.domain_id, a.subdomain_id,
        CASE WHEN a.subdomain_id IS NULL THEN d.name ELSE s.label || '.' || sd.name END AS full_domain,
        a.enabled, a.description, a.created_at, a.updated_at,
        a.num_forwarded, a.num_blocked, a.num_replied, a.num_spam
 FROM relay_addresses a
 LEFT JOIN relay_domains d ON d.id = a.domain_id
 LEFT JOIN relay_subdomains s ON s.id = a.subdomain_id
 LEFT JOIN relay_domains sd ON sd.id = s.domain_id";

const SUBDOMAIN_SELECT: &str = "SELECT s.id, s.label, s.user_id, s.domain_id, d.name AS domain,
        s.created_at, s.is_deleted, s.use_subdomain
 FROM relay_subdomains s
 JOIN relay_domains d ON d.id = s.domain_id";

/// Relay store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Column and id matching a target reference
fn target_column(target: TargetRef) -> (&'static str, i64) {
    match target {
        TargetRef::Domain(id) => ("domain_id", id),
        TargetRef::Subdomain(id) => ("subdomain_id", id),
    }
}

/// Turn unique-index races into a duplicate validation error
fn map_unique_violation(err: sqlx::Error) -> AppError {
    let is_unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if is_unique {
        AppError::Validation(ValidationError::Duplicate)
    } else {
        AppError::Database(err)
    }
}

async fn fetch_address<'e, E>(executor: E, id: i64) -> Result<Option<RelayAddress>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("{ADDRESS_SELECT} WHERE a.id = $1");
    let address = sqlx::query_as::<_, RelayAddress>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(address)
}

async fn fetch_subdomain<'e, E>(executor: E, id: i64) -> Result<Option<RelaySubdomain>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("{SUBDOMAIN_SELECT} WHERE s.id = $1");
    let subdomain = sqlx::query_as::<_, RelaySubdomain>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(subdomain)
}

async fn fetch_subdomain_by_label<'e, E>(
    executor: E,
    label: &str,
    domain_id: i64,
) -> Result<Option<RelaySubdomain>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("{SUBDOMAIN_SELECT} WHERE s.label = $1 AND s.domain_id = $2");
    let subdomain = sqlx::query_as::<_, RelaySubdomain>(&sql)
        .bind(label)
        .bind(domain_id)
        .fetch_optional(executor)
        .await?;
    Ok(subdomain)
}

async fn tombstone_exists<'e, E>(executor: E, address_hash: &str) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM deleted_relay_addresses WHERE address_hash = $1)",
    )
    .bind(address_hash)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

async fn count_user_addresses<'e, E>(executor: E, user_id: i64) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relay_addresses WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

#[async_trait]
impl RelayStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    async fn seed_domains(&self, names: &[String]) -> Result<()> {
        for name in names {
            sqlx::query("INSERT INTO relay_domains (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(name)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<RelayDomain>> {
        let domains =
            sqlx::query_as::<_, RelayDomain>("SELECT id, name FROM relay_domains ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(domains)
    }

    async fn domain_by_name(&self, name: &str) -> Result<Option<RelayDomain>> {
        let domain =
            sqlx::query_as::<_, RelayDomain>("SELECT id, name FROM relay_domains WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(domain)
    }

    async fn lock_user(&self, user_id: i64) -> Result<Box<dyn UserScope>> {
        let mut tx = self.pool.begin().await?;

        // Held until the transaction commits or rolls back
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        if locked.is_none() {
            return Err(AppError::NotFound("user"));
        }

        Ok(Box::new(PgUserScope { tx, user_id }))
    }

    async fn address_by_id(&self, id: i64) -> Result<Option<RelayAddress>> {
        fetch_address(&self.pool, id).await
    }

    async fn find_address(
        &self,
        local_part: &str,
        target: TargetRef,
    ) -> Result<Option<RelayAddress>> {
        let (column, target_id) = target_column(target);
        let sql = format!("{ADDRESS_SELECT} WHERE a.local_part = $1 AND a.{column} = $2");
        let address = sqlx::query_as::<_, RelayAddress>(&sql)
            .bind(local_part)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(address)
    }

    async fn list_addresses(&self, user_id: i64, page: Option<Page>) -> Result<Vec<RelayAddress>> {
        let addresses = match page {
            Some(page) => {
                let sql = format!(
                    "{ADDRESS_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at, a.id LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, RelayAddress>(&sql)
                    .bind(user_id)
                    .bind(page.per_page)
                    .bind(page.offset())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{ADDRESS_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at, a.id");
                sqlx::query_as::<_, RelayAddress>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(addresses)
    }

    async fn count_addresses(&self, user_id: i64) -> Result<i64> {
        count_user_addresses(&self.pool, user_id).await
    }

    async fn earliest_address(&self, user_id: i64) -> Result<Option<RelayAddress>> {
        let sql = format!("{ADDRESS_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at, a.id LIMIT 1");
        let address = sqlx::query_as::<_, RelayAddress>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(address)
    }

    async fn addresses_on_subdomain(&self, subdomain_id: i64) -> Result<Vec<RelayAddress>> {
        let sql = format!("{ADDRESS_SELECT} WHERE a.subdomain_id = $1 ORDER BY a.id");
        let addresses = sqlx::query_as::<_, RelayAddress>(&sql)
            .bind(subdomain_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(addresses)
    }

    async fn update_address(&self, address: &RelayAddress) -> Result<RelayAddress> {
        let result = sqlx::query(
            "UPDATE relay_addresses
             SET local_part = $1, description = $2, enabled = $3, updated_at = NOW()
             WHERE id = $4",
        )
        .bind(&address.local_part)
        .bind(&address.description)
        .bind(address.enabled)
        .bind(address.id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("alias"));
        }

        fetch_address(&self.pool, address.id)
            .await?
            .ok_or(AppError::NotFound("alias"))
    }

    async fn delete_address(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM relay_addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_counter(&self, id: i64, counter: Counter) -> Result<()> {
        let column = counter.column();
        let sql = format!("UPDATE relay_addresses SET {column} = {column} + 1 WHERE id = $1");
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("alias"));
        }
        Ok(())
    }

    async fn tombstone_exists(&self, address_hash: &str) -> Result<bool> {
        tombstone_exists(&self.pool, address_hash).await
    }

    async fn insert_tombstone(&self, tombstone: &DeletedRelayAddress) -> Result<()> {
        sqlx::query(
            "INSERT INTO deleted_relay_addresses
                (address_hash, num_forwarded, num_blocked, num_replied, num_spam, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&tombstone.address_hash)
        .bind(tombstone.num_forwarded)
        .bind(tombstone.num_blocked)
        .bind(tombstone.num_replied)
        .bind(tombstone.num_spam)
        .bind(tombstone.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn subdomain_by_id(&self, id: i64) -> Result<Option<RelaySubdomain>> {
        fetch_subdomain(&self.pool, id).await
    }

    async fn subdomain_by_label(
        &self,
        label: &str,
        domain_id: i64,
    ) -> Result<Option<RelaySubdomain>> {
        fetch_subdomain_by_label(&self.pool, label, domain_id).await
    }

    async fn list_subdomains(&self, user_id: i64) -> Result<Vec<RelaySubdomain>> {
        let sql = format!("{SUBDOMAIN_SELECT} WHERE s.user_id = $1 AND NOT s.is_deleted ORDER BY s.id");
        let subdomains = sqlx::query_as::<_, RelaySubdomain>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(subdomains)
    }

    async fn subdomain_totals(&self, subdomain_id: i64) -> Result<SubdomainTotals> {
        let totals = sqlx::query_as::<_, SubdomainTotals>(
            "SELECT COUNT(*) AS num_addresses,
                    COALESCE(SUM(num_forwarded), 0)::BIGINT AS num_forwarded,
                    COALESCE(SUM(num_blocked), 0)::BIGINT AS num_blocked,
                    COALESCE(SUM(num_spam), 0)::BIGINT AS num_spam
             FROM relay_addresses WHERE subdomain_id = $1",
        )
        .bind(subdomain_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    async fn relabel_subdomain(
        &self,
        id: i64,
        new_label: &str,
        old_label: &str,
    ) -> Result<RelaySubdomain> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE relay_subdomains SET label = $1 WHERE id = $2 AND NOT is_deleted")
            .bind(new_label)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("subdomain"));
        }

        sqlx::query(
            "INSERT INTO relay_subdomains (label, user_id, domain_id, created_at, is_deleted)
             SELECT $1, user_id, domain_id, NOW(), TRUE FROM relay_subdomains WHERE id = $2",
        )
        .bind(old_label)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        fetch_subdomain(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("subdomain"))
    }

    async fn mark_subdomain_deleted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE relay_subdomains SET is_deleted = TRUE, use_subdomain = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_use_subdomain(&self, id: i64, use_subdomain: bool) -> Result<RelaySubdomain> {
        let result = sqlx::query(
            "UPDATE relay_subdomains SET use_subdomain = $1 WHERE id = $2 AND NOT is_deleted",
        )
        .bind(use_subdomain)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("subdomain"));
        }

        fetch_subdomain(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("subdomain"))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let active_addresses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relay_addresses")
            .fetch_one(&self.pool)
            .await?;
        let tombstones: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deleted_relay_addresses")
            .fetch_one(&self.pool)
            .await?;
        let active_subdomains: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM relay_subdomains WHERE NOT is_deleted")
                .fetch_one(&self.pool)
                .await?;
        let deleted_subdomains: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM relay_subdomains WHERE is_deleted")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            active_addresses,
            tombstones,
            active_subdomains,
            deleted_subdomains,
        })
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let user =
            sqlx::query_as::<_, UserRecord>("SELECT id, email, premium FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}

/// Transaction holding `FOR UPDATE` on one user row
struct PgUserScope {
    tx: Transaction<'static, Postgres>,
    user_id: i64,
}

#[async_trait]
impl UserScope for PgUserScope {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    async fn count_addresses(&mut self) -> Result<i64> {
        count_user_addresses(&mut *self.tx, self.user_id).await
    }

    async fn address_taken(&mut self, local_part: &str, target: TargetRef) -> Result<bool> {
        let (column, target_id) = target_column(target);
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM relay_addresses WHERE local_part = $1 AND {column} = $2)"
        );
        let taken: bool = sqlx::query_scalar(&sql)
            .bind(local_part)
            .bind(target_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(taken)
    }

    async fn tombstone_exists(&mut self, address_hash: &str) -> Result<bool> {
        tombstone_exists(&mut *self.tx, address_hash).await
    }

    async fn insert_address(&mut self, address: &NewRelayAddress) -> Result<RelayAddress> {
        let (domain_id, subdomain_id) = match address.target {
            TargetRef::Domain(id) => (Some(id), None),
            TargetRef::Subdomain(id) => (None, Some(id)),
        };

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO relay_addresses (local_part, user_id, domain_id, subdomain_id, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&address.local_part)
        .bind(address.user_id)
        .bind(domain_id)
        .bind(subdomain_id)
        .bind(&address.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_unique_violation)?;

        fetch_address(&mut *self.tx, id)
            .await?
            .ok_or(AppError::NotFound("alias"))
    }

    async fn count_active_subdomains(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM relay_subdomains WHERE user_id = $1 AND NOT is_deleted",
        )
        .bind(self.user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn subdomain_by_label(
        &mut self,
        label: &str,
        domain_id: i64,
    ) -> Result<Option<RelaySubdomain>> {
        fetch_subdomain_by_label(&mut *self.tx, label, domain_id).await
    }

    async fn insert_subdomain(&mut self, subdomain: &NewRelaySubdomain) -> Result<RelaySubdomain> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO relay_subdomains (label, user_id, domain_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&subdomain.label)
        .bind(subdomain.user_id)
        .bind(subdomain.domain_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_unique_violation)?;

        fetch_subdomain(&mut *self.tx, id)
            .await?
            .ok_or(AppError::NotFound("subdomain"))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
