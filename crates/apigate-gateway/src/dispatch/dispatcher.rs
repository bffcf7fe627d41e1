use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use apigate_core::error::{ApiGateError, Result};
use apigate_core::{ApiCall, Decision};

use crate::config::schema::RobotRouterParams;
use crate::context::CallContext;
use crate::policy::RateLimiter;
use crate::routers::{DisabledRouter, RobotRouter, UnrestrictedRouter};

/// Router implementations a configuration may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    Robot,
    Disabled,
    Unrestricted,
}

impl RouterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouterKind::Robot => "robot",
            RouterKind::Disabled => "disabled",
            RouterKind::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for RouterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouterKind {
    type Err = ApiGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "robot" => Ok(RouterKind::Robot),
            "disabled" => Ok(RouterKind::Disabled),
            "unrestricted" => Ok(RouterKind::Unrestricted),
            other => Err(ApiGateError::InvalidConfig(format!("unknown router: {other}"))),
        }
    }
}

/// Extra facts the dispatch layer needs when starting an admitted flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionHints {
    /// Flow to start in place of the default implementation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    /// Per-file byte limit the flow must apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

/// A named policy implementation. One instance per authorization record,
/// built when a configuration snapshot is published.
pub trait ApiRouter: Send + Sync {
    fn kind(&self) -> RouterKind;

    fn authorize(&self, ctx: &CallContext<'_>, call: &ApiCall) -> Decision;

    fn admission_hints(&self, _call: &ApiCall) -> AdmissionHints {
        AdmissionHints::default()
    }

    /// Robot id stamped on flows this router admits.
    fn robot_id(&self) -> Option<&str> {
        None
    }

    /// Whether callers bound to this router may record a flow of this kind.
    fn accepts_flow(&self, _flow_name: &str) -> bool {
        false
    }
}

/// Build the router implementation for a kind and its parameters.
pub fn build_router(
    kind: RouterKind,
    params: Option<&RobotRouterParams>,
    limiter: &Arc<RateLimiter>,
) -> Result<Arc<dyn ApiRouter>> {
    let router: Arc<dyn ApiRouter> = match kind {
        RouterKind::Robot => {
            let params = params.ok_or_else(|| {
                ApiGateError::InvalidConfig("robot router requires router_params".into())
            })?;
            Arc::new(RobotRouter::new(params, Arc::clone(limiter))?)
        }
        RouterKind::Disabled => Arc::new(DisabledRouter),
        RouterKind::Unrestricted => Arc::new(UnrestrictedRouter),
    };
    Ok(router)
}
