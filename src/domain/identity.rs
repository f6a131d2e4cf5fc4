use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a marketplace participant, as resolved by the
/// authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Homeowner,
    Maid,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Homeowner => f.write_str("homeowner"),
            Role::Maid => f.write_str("maid"),
        }
    }
}

/// The authenticated caller of an engine operation.
///
/// Passed explicitly into every call; the engine holds no notion of a
/// "current" user or role between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    pub fn homeowner(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Homeowner)
    }

    pub fn maid(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Maid)
    }

    pub fn is(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}
