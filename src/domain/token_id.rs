//! Opaque token identifier.
//!
//! [`TokenId`] is a newtype over `String`. Freshly created tokens get a
//! UUID v4 rendering, but callers treat the value as opaque and the pool
//! accepts any string handed back to it.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a lease token.
///
/// Generated once by [`TokenId::new`] when the token is created and never
/// reused for the lifetime of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct TokenId(String);

impl TokenId {
    /// Creates a new random `TokenId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = TokenId::new();
        let b = TokenId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_ids_are_uuid_formatted() {
        let id = TokenId::new();
        assert!(id.as_str().parse::<uuid::Uuid>().is_ok());
    }

    #[test]
    fn arbitrary_strings_are_accepted() {
        let id = TokenId::from("not-a-uuid");
        assert_eq!(id.to_string(), "not-a-uuid");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TokenId::from("abc");
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"abc\"");
    }
}
