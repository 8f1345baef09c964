//! Lease status of a live token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status of a token whose key still exists in the store.
///
/// A deleted token has no status at all: the absence of its key is the
/// `Deleted` state.
///
/// Transitions:
/// - Available → Assigned (assign)
/// - Assigned → Available (free, or reclaim after the keep-alive TTL lapses)
/// - Available → deleted (TTL lapses unused, or explicit delete)
/// - Assigned → deleted (explicit delete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// In the available set, waiting to be assigned.
    Available,
    /// Leased to a consumer.
    Assigned,
}

impl TokenStatus {
    /// Label stored as the token key's value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for TokenStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "assigned" => Ok(Self::Assigned),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trips_through_from_str() {
        for status in [TokenStatus::Available, TokenStatus::Assigned] {
            assert_eq!(status.as_str().parse::<TokenStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let parsed = "deleted".parse::<TokenStatus>();
        assert_eq!(parsed, Err(ParseStatusError("deleted".to_string())));
    }
}
