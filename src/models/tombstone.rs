use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Counters;
use crate::security::address_hash;

/// Ledger row left behind by a permanently deleted alias
///
/// Holds no reversible identifier: only the SHA-256 of the full address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeletedRelayAddress {
    pub address_hash: String,
    pub num_forwarded: i64,
    pub num_blocked: i64,
    pub num_replied: i64,
    pub num_spam: i64,
    pub created_at: DateTime<Utc>,
}

impl DeletedRelayAddress {
    pub fn new(local_part: &str, full_domain: &str, counters: Counters) -> Self {
        Self {
            address_hash: address_hash(local_part, full_domain),
            num_forwarded: counters.num_forwarded,
            num_blocked: counters.num_blocked,
            num_replied: counters.num_replied,
            num_spam: counters.num_spam,
            created_at: Utc::now(),
        }
    }

    /// Validate that a hash is a hex-encoded SHA-256 digest (64 hex characters)
    pub fn validate_hash(hash: &str) -> bool {
        hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
    }
}
