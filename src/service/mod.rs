//! Service layer: lease lifecycle orchestration.
//!
//! [`LeaseService`] runs the caller-driven transitions (create, assign,
//! free, delete, keep-alive, list). [`ExpiryReconciler`] runs the
//! TTL-driven ones. They share nothing but the store.

pub mod lease_service;
pub mod reconciler;

pub use lease_service::{LeaseService, MAX_CREATE_BATCH};
pub use reconciler::{ExpiryReconciler, ReconcileOutcome, ReconcilerHandle};
