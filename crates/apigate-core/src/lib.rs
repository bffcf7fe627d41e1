//! apigate core: transport-agnostic authorization primitives and error types.
//!
//! This crate defines the caller identity, the typed API calls that are subject
//! to authorization, the decision surface returned to the dispatch layer, and
//! the shared error type. It carries no async runtime or transport code so the gateway,
//! test tooling and any embedding service can share the same contracts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed caller input surfaces as `ApiGateError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod call;
pub mod decision;
pub mod error;
pub mod principal;

pub use call::{ActionName, ApiCall};
pub use decision::{Decision, DenyReason};
pub use principal::Principal;

/// Shared result type.
pub use error::{ApiGateError, Result};
