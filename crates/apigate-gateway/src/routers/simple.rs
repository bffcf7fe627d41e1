use apigate_core::{ApiCall, Decision, DenyReason};

use crate::context::CallContext;
use crate::dispatch::{ApiRouter, RouterKind};

/// Refuses every call.
#[derive(Debug, Default)]
pub struct DisabledRouter;

impl ApiRouter for DisabledRouter {
    fn kind(&self) -> RouterKind {
        RouterKind::Disabled
    }

    fn authorize(&self, _ctx: &CallContext<'_>, _call: &ApiCall) -> Decision {
        Decision::Deny(DenyReason::RouterDisabled)
    }
}

/// Admits every call. For administrative users; never a default.
#[derive(Debug, Default)]
pub struct UnrestrictedRouter;

impl ApiRouter for UnrestrictedRouter {
    fn kind(&self) -> RouterKind {
        RouterKind::Unrestricted
    }

    fn authorize(&self, _ctx: &CallContext<'_>, _call: &ApiCall) -> Decision {
        Decision::Allow
    }

    fn accepts_flow(&self, _flow_name: &str) -> bool {
        true
    }
}
