use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_DESCRIPTION_LENGTH;
use crate::models::{RelayDomain, RelaySubdomain};

/// Where an alias lives: a system domain or a user's subdomain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Domain(i64),
    Subdomain(i64),
}

/// A resolved alias target with the row it points at
#[derive(Debug, Clone)]
pub enum AliasTarget {
    Domain(RelayDomain),
    Subdomain(RelaySubdomain),
}

impl AliasTarget {
    pub fn reference(&self) -> TargetRef {
        match self {
            AliasTarget::Domain(domain) => TargetRef::Domain(domain.id),
            AliasTarget::Subdomain(subdomain) => TargetRef::Subdomain(subdomain.id),
        }
    }

    /// Right-hand side of addresses on this target
    pub fn full_domain(&self) -> String {
        match self {
            AliasTarget::Domain(domain) => domain.name.clone(),
            AliasTarget::Subdomain(subdomain) => subdomain.full_domain(),
        }
    }
}

/// Relay address (alias) forwarding to its owner's real mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelayAddress {
    pub id: i64,
    pub local_part: String,
    /// Owning user
    pub user_id: i64,
    /// Set when the alias lives on a system domain
    pub domain_id: Option<i64>,
    /// Set when the alias lives on a user subdomain
    pub subdomain_id: Option<i64>,
    /// Resolved right-hand side (`relay.example` or `alice.relay.example`)
    pub full_domain: String,
    pub enabled: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub num_forwarded: i64,
    pub num_blocked: i64,
    pub num_replied: i64,
    pub num_spam: i64,
}

impl RelayAddress {
    pub fn full_address(&self) -> String {
        format!("{}@{}", self.local_part, self.full_domain)
    }

    pub fn target(&self) -> TargetRef {
        match self.subdomain_id {
            Some(id) => TargetRef::Subdomain(id),
            None => TargetRef::Domain(self.domain_id.unwrap_or_default()),
        }
    }

    pub fn counters(&self) -> Counters {
        Counters {
            num_forwarded: self.num_forwarded,
            num_blocked: self.num_blocked,
            num_replied: self.num_replied,
            num_spam: self.num_spam,
        }
    }

    /// Validate that a description fits the column and holds no control characters
    pub fn validate_description(description: &str) -> bool {
        description.chars().count() <= MAX_DESCRIPTION_LENGTH
            && !description.chars().any(char::is_control)
    }
}

/// Alias to insert; built inside the per-user lock
#[derive(Debug, Clone)]
pub struct NewRelayAddress {
    pub local_part: String,
    pub user_id: i64,
    pub target: TargetRef,
    pub full_domain: String,
    pub description: String,
}

/// Owner-editable fields of an alias
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressUpdate {
    pub local_part: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

/// Activity counters carried from an alias into its tombstone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub num_forwarded: i64,
    pub num_blocked: i64,
    pub num_replied: i64,
    pub num_spam: i64,
}

/// Single counter bumped by mail routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Forwarded,
    Blocked,
    Replied,
    Spam,
}

impl Counter {
    pub fn column(self) -> &'static str {
        match self {
            Counter::Forwarded => "num_forwarded",
            Counter::Blocked => "num_blocked",
            Counter::Replied => "num_replied",
            Counter::Spam => "num_spam",
        }
    }
}

/// Page of a listing, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(0))
    }
}
