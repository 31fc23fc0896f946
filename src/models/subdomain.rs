use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user custom label under a system relay domain
///
/// Deleted rows are never removed: they keep their label so nobody can claim it
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelaySubdomain {
    pub id: i64,
    pub label: String,
    pub user_id: i64,
    pub domain_id: i64,
    /// Name of the parent relay domain
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
    /// Owner preference: offer this subdomain when creating aliases
    pub use_subdomain: bool,
}

impl RelaySubdomain {
    pub fn full_domain(&self) -> String {
        format!("{}.{}", self.label, self.domain)
    }
}

#[derive(Debug, Clone)]
pub struct NewRelaySubdomain {
    pub label: String,
    pub user_id: i64,
    pub domain_id: i64,
}

/// Aggregate activity of the aliases bound to a subdomain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubdomainTotals {
    pub num_addresses: i64,
    pub num_forwarded: i64,
    pub num_blocked: i64,
    pub num_spam: i64,
}

/// Subdomain as shown to its owner, with activity of its aliases
#[derive(Debug, Clone, Serialize)]
pub struct SubdomainDetail {
    #[serde(flatten)]
    pub subdomain: RelaySubdomain,
    pub full_domain: String,
    #[serde(flatten)]
    pub totals: SubdomainTotals,
}

impl SubdomainDetail {
    pub fn new(subdomain: RelaySubdomain, totals: SubdomainTotals) -> Self {
        Self {
            full_domain: subdomain.full_domain(),
            subdomain,
            totals,
        }
    }
}
