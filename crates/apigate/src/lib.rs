//! Top-level facade crate for apigate.
//!
//! Re-exports the core contracts and the gateway engine so an embedding
//! service can depend on a single crate and call the engine in-process.

pub mod core {
    pub use apigate_core::*;
}

pub mod gateway {
    pub use apigate_gateway::*;
}

pub use apigate_core::{ActionName, ApiCall, ApiGateError, Decision, DenyReason, Principal, Result};
pub use apigate_gateway::{
    ApiAuthorizationRecord, Authorization, AuthorizationEngine, RouterBinding,
};
