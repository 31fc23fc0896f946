use serde::{Deserialize, Serialize};

/// Profile fields this service reads about an owning user
///
/// Users are owned by the external account layer; this service only reads them
/// and locks their row while allocating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    /// Real mailbox aliases forward to
    pub email: Option<String>,
    /// Premium plans have no alias quota
    pub premium: bool,
}

impl UserRecord {
    /// Forwarding email if it looks deliverable
    pub fn forwarding_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| email.contains('@'))
    }
}
