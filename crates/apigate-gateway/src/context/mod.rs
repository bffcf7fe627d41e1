//! Per-call context types shared across layers.
//!
//! Routers see the caller and the flow ledger through `CallContext` so they
//! stay decoupled from the transport.

pub mod flows;

use apigate_core::Principal;

pub use flows::{FlowLedger, FlowRecord};

/// What a router may consult while deciding one call.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub principal: &'a Principal,
    pub ledger: &'a FlowLedger,
}

impl<'a> CallContext<'a> {
    pub fn new(principal: &'a Principal, ledger: &'a FlowLedger) -> Self {
        Self { principal, ledger }
    }

    pub fn user(&self) -> &str {
        &self.principal.user
    }
}
