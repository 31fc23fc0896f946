/// Length of a generated alias local part
/// 36^9 candidates keeps collisions rare for any realistic alias table
pub const ALIAS_CANDIDATE_LENGTH: usize = 9;

/// Length used once the base-length attempts are exhausted
pub const ALIAS_FALLBACK_LENGTH: usize = 12;

/// Attempts made at each candidate length before giving up
pub const MAX_CANDIDATE_ATTEMPTS: usize = 10;

/// Characters a generated local part is drawn from
pub const ALIAS_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Maximum length of a local part or subdomain label (one DNS label)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of an alias description
pub const MAX_DESCRIPTION_LENGTH: usize = 64;

/// Default free-tier alias quota
pub const DEFAULT_MAX_FREE_ALIASES: i64 = 5;

/// Active subdomains a single user may hold
pub const MAX_ACTIVE_SUBDOMAINS: i64 = 1;

/// Default page size for paginated alias listings
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Queue names used by the outbox job sink
pub const FORWARDING_QUEUE: &str = "mail_forwarding";
pub const DNS_PROVISIONING_QUEUE: &str = "dns_provisioning";

/// Header set by the upstream authentication layer
pub const OWNER_HEADER: &str = "x-user-id";

// =============================================================================
// Error Messages
// =============================================================================

/// Soft-failure message when the recipient does not resolve to an alias
pub const ERR_ADDRESS_NOT_FOUND: &str = "Address does not exist";

/// Soft-failure message when the alias exists but is disabled
pub const ERR_ADDRESS_DISABLED: &str = "Address is disabled";

/// Soft-failure message when the owner has no forwarding email
pub const ERR_NO_FORWARDING_EMAIL: &str = "User does not have a forwarding email";

/// Error message for a rename attempted on anything but the first alias
pub const ERR_RENAME_NOT_FIRST: &str = "Only your first alias can be renamed";
