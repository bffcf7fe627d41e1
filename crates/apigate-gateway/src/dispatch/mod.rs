//! Router dispatch exports.
//!
//! Re-exports the router trait and kind registry so the engine and routers
//! can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{build_router, AdmissionHints, ApiRouter, RouterKind};
