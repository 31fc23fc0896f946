use async_trait::async_trait;

use crate::error::Result;
use crate::models::UserRecord;

/// Read access to owning users held by the account layer
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>>;

    /// Real mailbox the user's aliases forward to, if one is usable
    async fn forwarding_email(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self
            .user(user_id)
            .await?
            .and_then(|user| user.forwarding_email().map(str::to_string)))
    }

    /// Premium users are exempt from the free alias quota
    async fn has_unlimited_aliases(&self, user_id: i64) -> Result<bool> {
        Ok(self
            .user(user_id)
            .await?
            .map(|user| user.premium)
            .unwrap_or(false))
    }
}
