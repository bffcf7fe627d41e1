//! apigate gateway library entry.
//!
//! This crate wires configuration, the policy layer, the router
//! implementations and the authorization engine into one stack, plus a thin
//! HTTP adapter. It is consumed by the binary (`main.rs`) and by integration
//! tests.

pub mod app_state;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod resolver;
pub mod router;
pub mod routers;
pub mod transport;

pub use engine::{Authorization, AuthorizationEngine};
pub use resolver::{ApiAuthorizationRecord, AuthorizationResolver, RouterBinding};
