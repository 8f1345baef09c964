//! Domain layer: token identity, lease status, and store key layout.
//!
//! The pool keeps no in-process state. These types describe what lives in
//! the store and what the service hands back to callers.

pub mod keys;
pub mod timings;
pub mod token_id;
pub mod token_info;
pub mod token_status;

pub use timings::LeaseTimings;
pub use token_id::TokenId;
pub use token_info::{AssignedToken, PoolStats, TokenInfo};
pub use token_status::TokenStatus;
