use serde::{Deserialize, Serialize};

/// System relay domain, the right-hand side of an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelayDomain {
    pub id: i64,
    pub name: String,
}
