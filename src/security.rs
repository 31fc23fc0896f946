use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Label mixed into the token comparison MAC
const TOKEN_CHECK_LABEL: &[u8] = b"relay-shared-token-check";

// =============================================================================
// Tombstone Identifiers
// =============================================================================

/// Content-addressed identifier of an alias
///
/// `address_hash = hex(SHA256(local_part "@" full_domain))`, lowercased first so
/// case variants of one literal collapse onto the same tombstone. This is the
/// only durable trace a deleted alias leaves behind.
pub fn address_hash(local_part: &str, full_domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(local_part.to_lowercase().as_bytes());
    hasher.update(b"@");
    hasher.update(full_domain.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// Shared Token Authentication
// =============================================================================

/// Compare a presented shared token against the configured one in constant time
///
/// Both values are run through HMAC-SHA256 keyed by the expected token and the
/// tags are compared with `verify_slice`, so the comparison time does not
/// depend on how many leading bytes match.
pub fn verify_shared_token(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        tracing::error!("Shared token is not configured");
        return false;
    }

    let expected_tag = match token_tag(expected, expected) {
        Some(tag) => tag,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(expected.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return false;
        }
    };
    mac.update(TOKEN_CHECK_LABEL);
    mac.update(provided.as_bytes());

    mac.verify_slice(&expected_tag).is_ok()
}

fn token_tag(key: &str, token: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(TOKEN_CHECK_LABEL);
    mac.update(token.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}
