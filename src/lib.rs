//! # lease-pool
//!
//! Bounded pool of opaque lease tokens with automatic reclamation.
//!
//! Consumers take a token, keep it alive while they use it, and free it
//! when done. A token whose lease is abandoned is recycled once its
//! keep-alive TTL lapses; a token nobody takes is deleted once its idle
//! TTL lapses. All state lives in a key-value store with per-key TTLs:
//! the service and the reconciler hold nothing between calls.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── LeaseService (service/)      ExpiryReconciler (service/)
//!     │         │                              ▲
//!     │         ▼                              │ expired keys
//!     └── KeyValueStore (store/) ──────────────┘
//!             ├── InMemoryStore
//!             └── PostgresStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
