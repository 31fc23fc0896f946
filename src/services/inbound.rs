//! Resolution of inbound mail from the provider webhook to a forwarding job.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::allocator::AliasAllocator;
use crate::constants::{ERR_ADDRESS_DISABLED, ERR_ADDRESS_NOT_FOUND, ERR_NO_FORWARDING_EMAIL};
use crate::directory::UserDirectory;
use crate::error::{AppError, Result, ValidationError};
use crate::jobs::{Job, JobSink};
use crate::models::{Counter, RelayAddress};
use crate::security::verify_shared_token;

/// Envelope recipient; providers send either a bare address or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Single(String),
    List(Vec<String>),
}

impl Recipient {
    /// Normalized first address
    pub fn primary(&self) -> Option<String> {
        let raw = match self {
            Recipient::Single(address) => Some(address.as_str()),
            Recipient::List(addresses) => addresses.first().map(String::as_str),
        }?;
        let address = bare_address(raw);
        if address.contains('@') {
            Some(address)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    to: Recipient,
}

/// Outcome of a webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Forwarded {
        address_id: i64,
        user_id: i64,
        destination: String,
    },
    /// Soft failure; the provider must not retry
    Unresolved(&'static str),
}

/// Strip a display name and angle brackets: `"Bob" <Bob@X.test>` -> `bob@x.test`
pub fn bare_address(raw: &str) -> String {
    let raw = raw.trim();
    let inner = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    inner.trim().to_lowercase()
}

/// Pull the recipient out of a webhook body
///
/// `envelope` is normally a JSON document encoded as a string; an inline
/// object is accepted too.
pub fn parse_recipient(payload: &Value) -> std::result::Result<String, ValidationError> {
    let envelope = payload
        .get("envelope")
        .ok_or_else(|| ValidationError::Malformed("missing envelope".to_string()))?;

    let envelope: Envelope = match envelope {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| ValidationError::Malformed(format!("invalid envelope: {}", e)))?;

    envelope
        .to
        .primary()
        .ok_or_else(|| ValidationError::Malformed("envelope has no recipient".to_string()))
}

#[derive(Clone)]
pub struct MailRouter {
    aliases: AliasAllocator,
    directory: Arc<dyn UserDirectory>,
    forwarding: Arc<dyn JobSink>,
    token: String,
}

impl MailRouter {
    pub fn new(
        aliases: AliasAllocator,
        directory: Arc<dyn UserDirectory>,
        forwarding: Arc<dyn JobSink>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            aliases,
            directory,
            forwarding,
            token: token.into(),
        }
    }

    fn authenticate(&self, token: &str) -> Result<()> {
        if !verify_shared_token(token, &self.token) {
            tracing::warn!("Rejected inbound call with an invalid token");
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }

    /// Route one webhook delivery
    ///
    /// Unknown or disabled recipients and owners without a mailbox come back as
    /// [`Delivery::Unresolved`] rather than an error.
    pub async fn handle(&self, token: &str, mut payload: Value) -> Result<Delivery> {
        self.authenticate(token)?;
        let recipient = parse_recipient(&payload)?;

        let Some(address) = self.aliases.lookup(&recipient).await? else {
            tracing::info!("Inbound mail for unknown address");
            return Ok(Delivery::Unresolved(ERR_ADDRESS_NOT_FOUND));
        };

        if !address.enabled {
            self.record_best_effort(&address, Counter::Blocked).await;
            tracing::info!("Blocked mail to disabled alias {}", address.id);
            return Ok(Delivery::Unresolved(ERR_ADDRESS_DISABLED));
        }

        let destination = self
            .directory
            .forwarding_email(address.user_id)
            .await
            .map_err(|e| AppError::ExternalDependency(format!("profile lookup: {}", e)))?;
        let Some(destination) = destination else {
            tracing::info!("User {} has no forwarding email", address.user_id);
            return Ok(Delivery::Unresolved(ERR_NO_FORWARDING_EMAIL));
        };

        if let Value::Object(fields) = &mut payload {
            fields.insert(
                "destination".to_string(),
                Value::String(destination.clone()),
            );
        }
        self.forwarding.send(Job::Forward(payload)).await?;
        // The job is queued; an error from here on would make the provider resend it
        self.record_best_effort(&address, Counter::Forwarded).await;

        tracing::info!("Forwarding mail for alias {}", address.id);
        Ok(Delivery::Forwarded {
            address_id: address.id,
            user_id: address.user_id,
            destination,
        })
    }

    async fn record_best_effort(&self, address: &RelayAddress, counter: Counter) {
        if let Err(e) = self.aliases.record(address, counter).await {
            tracing::warn!(
                "Could not bump {} for alias {}: {}",
                counter.column(),
                address.id,
                e
            );
        }
    }

    /// Owning user of `relay_address`
    pub async fn destination(&self, token: &str, relay_address: &str) -> Result<i64> {
        self.authenticate(token)?;
        self.aliases
            .lookup(&bare_address(relay_address))
            .await?
            .map(|address| address.user_id)
            .ok_or(AppError::NotFound("relay address"))
    }
}
