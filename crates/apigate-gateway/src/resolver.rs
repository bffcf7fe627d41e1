//! Principal -> router resolution over an ordered set of authorization records.

use std::collections::BTreeSet;
use std::sync::Arc;

use apigate_core::error::{ApiGateError, Result};
use apigate_core::Principal;
use serde::Serialize;

use crate::config::schema::RobotRouterParams;
use crate::dispatch::RouterKind;

/// One `ApiAuthorization` entry: which users and groups get which router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAuthorizationRecord {
    pub router: RouterKind,
    /// Only robot records carry parameters; `None` falls back to the
    /// snapshot's robot defaults.
    pub router_params: Option<RobotRouterParams>,
    pub users: BTreeSet<String>,
    pub groups: BTreeSet<String>,
}

impl ApiAuthorizationRecord {
    pub fn new(router: RouterKind) -> Self {
        Self {
            router,
            router_params: None,
            users: BTreeSet::new(),
            groups: BTreeSet::new(),
        }
    }

    pub fn users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn params(mut self, params: RobotRouterParams) -> Self {
        self.router_params = Some(params);
        self
    }

    /// A record with neither users nor groups matches nobody.
    pub fn validate(&self) -> Result<()> {
        if self.users.is_empty() && self.groups.is_empty() {
            return Err(ApiGateError::InvalidConfig(format!(
                "authorization for router {} names no users or groups",
                self.router
            )));
        }
        if self.router_params.is_some() && self.router != RouterKind::Robot {
            return Err(ApiGateError::InvalidConfig(format!(
                "router {} takes no router_params",
                self.router
            )));
        }
        Ok(())
    }

    pub fn matches(&self, principal: &Principal) -> bool {
        self.users.contains(&principal.user)
            || principal.groups.iter().any(|g| self.groups.contains(g))
    }
}

/// Resolved router for one principal.
#[derive(Debug, Clone, Serialize)]
pub struct RouterBinding {
    /// Index of the matching record, `None` for the default router.
    pub record: Option<usize>,
    pub router: RouterKind,
    pub router_params: Option<Arc<RobotRouterParams>>,
}

/// Immutable, ordered record set. First match wins.
#[derive(Debug, Default)]
pub struct AuthorizationResolver {
    records: Vec<ApiAuthorizationRecord>,
    params: Vec<Option<Arc<RobotRouterParams>>>,
}

impl AuthorizationResolver {
    /// Validate records and fill in robot defaults. Any invalid record
    /// rejects the whole set.
    pub fn new(
        records: Vec<ApiAuthorizationRecord>,
        robot_defaults: &RobotRouterParams,
    ) -> Result<Self> {
        let defaults = Arc::new(robot_defaults.clone());
        let mut params = Vec::with_capacity(records.len());

        for (i, r) in records.iter().enumerate() {
            r.validate()
                .map_err(|e| ApiGateError::InvalidConfig(format!("record {i}: {e}")))?;
            params.push(match (r.router, &r.router_params) {
                (RouterKind::Robot, Some(p)) => {
                    p.validate()?;
                    Some(Arc::new(p.clone()))
                }
                (RouterKind::Robot, None) => Some(Arc::clone(&defaults)),
                _ => None,
            });
        }

        Ok(Self { records, params })
    }

    pub fn resolve(&self, principal: &Principal) -> Result<RouterBinding> {
        self.records
            .iter()
            .position(|r| r.matches(principal))
            .map(|i| RouterBinding {
                record: Some(i),
                router: self.records[i].router,
                router_params: self.params[i].clone(),
            })
            .ok_or_else(|| ApiGateError::NoMatchingRouter(principal.user.clone()))
    }

    pub fn records(&self) -> &[ApiAuthorizationRecord] {
        &self.records
    }

    /// Effective parameters of record `i` (defaults applied).
    pub fn params_of(&self, i: usize) -> Option<&RobotRouterParams> {
        self.params.get(i).and_then(|p| p.as_deref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
