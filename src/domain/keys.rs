//! Store key naming.
//!
//! Every token owns one key, `token:{id}`, whose value is its status label.
//! Membership is tracked separately in two sets.

use super::TokenId;

/// Prefix shared by all token keys.
pub const TOKEN_KEY_PREFIX: &str = "token:";

/// Set holding ids of tokens waiting to be assigned.
pub const AVAILABLE_SET: &str = "tokens:available";

/// Set holding ids of leased tokens.
pub const ASSIGNED_SET: &str = "tokens:assigned";

/// Returns the store key for a token.
#[must_use]
pub fn token_key(id: &TokenId) -> String {
    format!("{TOKEN_KEY_PREFIX}{id}")
}

/// Extracts the token id from a store key, if it is a token key.
#[must_use]
pub fn token_id_from_key(key: &str) -> Option<TokenId> {
    key.strip_prefix(TOKEN_KEY_PREFIX)
        .filter(|id| !id.is_empty())
        .map(TokenId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        let id = TokenId::new();
        assert_eq!(token_id_from_key(&token_key(&id)), Some(id));
    }

    #[test]
    fn foreign_keys_are_not_tokens() {
        assert_eq!(token_id_from_key("session:123"), None);
        assert_eq!(token_id_from_key(AVAILABLE_SET), None);
        assert_eq!(token_id_from_key("token:"), None);
    }
}
