//! Authorization engine facade.
//!
//! Holds the active configuration snapshot behind an `ArcSwap`. A reload
//! builds and validates a complete new snapshot first and only then swaps the
//! pointer, so readers see either the old or the new configuration, never a
//! mix. A rejected reload leaves the previous snapshot in place.
//!
//! Rate-limiter state and the flow ledger are owned outside the snapshot and
//! survive reloads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use apigate_core::error::{ApiGateError, Result};
use apigate_core::{ActionName, ApiCall, Decision, DenyReason, Principal};
use arc_swap::ArcSwap;

use crate::config::{self, ApiGateConfig, RobotRouterParams};
use crate::context::{CallContext, FlowLedger, FlowRecord};
use crate::dispatch::{build_router, AdmissionHints, ApiRouter, RouterKind};
use crate::policy::RateLimiter;
use crate::resolver::{ApiAuthorizationRecord, AuthorizationResolver, RouterBinding};

/// Result of one authorization, with what the dispatch layer needs next.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub decision: Decision,
    /// `None` when no router applied.
    pub binding: Option<RouterBinding>,
    pub hints: AdmissionHints,
}

impl Authorization {
    fn denied(reason: DenyReason, binding: Option<RouterBinding>) -> Self {
        Self {
            decision: Decision::Deny(reason),
            binding,
            hints: AdmissionHints::default(),
        }
    }
}

/// Immutable compiled configuration.
struct Snapshot {
    generation: u64,
    resolver: AuthorizationResolver,
    // Parallel to the resolver's records.
    routers: Vec<Arc<dyn ApiRouter>>,
    default: Option<(RouterBinding, Arc<dyn ApiRouter>)>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            resolver: AuthorizationResolver::default(),
            routers: Vec::new(),
            default: None,
        }
    }

    fn route(&self, principal: &Principal) -> Option<(RouterBinding, Arc<dyn ApiRouter>)> {
        match self.resolver.resolve(principal) {
            Ok(binding) => {
                let router = binding.record.and_then(|i| self.routers.get(i)).cloned()?;
                Some((binding, router))
            }
            Err(_) => self.default.clone(),
        }
    }
}

pub struct AuthorizationEngine {
    snapshot: ArcSwap<Snapshot>,
    limiter: Arc<RateLimiter>,
    ledger: Arc<FlowLedger>,
    generation: AtomicU64,
}

impl AuthorizationEngine {
    /// Engine with no records: every caller is denied until a snapshot loads.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self::with_ledger(limiter, Arc::new(FlowLedger::new()))
    }

    pub fn with_ledger(limiter: Arc<RateLimiter>, ledger: Arc<FlowLedger>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            limiter,
            ledger,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(cfg: &ApiGateConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let engine = Self::new(limiter);
        engine.load_config(cfg)?;
        Ok(engine)
    }

    /// Replace the active snapshot. `robot_params` applies to robot records
    /// without parameters of their own.
    pub fn load_snapshot(
        &self,
        records: Vec<ApiAuthorizationRecord>,
        robot_params: RobotRouterParams,
    ) -> Result<()> {
        self.publish(records, &robot_params, None)
    }

    pub fn load_config(&self, cfg: &ApiGateConfig) -> Result<()> {
        let records = cfg.records()?;
        let default = cfg.engine.default_router_kind()?;
        self.publish(records, &cfg.engine.robot_defaults, default)
    }

    pub fn reload_from_file(&self, path: &str) -> Result<()> {
        let cfg = config::load_from_file(path).map_err(|e| {
            tracing::warn!(path, error = %e, "config reload rejected; keeping previous snapshot");
            e
        })?;
        self.load_config(&cfg)
    }

    fn publish(
        &self,
        records: Vec<ApiAuthorizationRecord>,
        robot_defaults: &RobotRouterParams,
        default_router: Option<RouterKind>,
    ) -> Result<()> {
        let built = self.build_snapshot(records, robot_defaults, default_router);
        let snapshot = match built {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "snapshot rejected; keeping previous snapshot");
                return Err(e);
            }
        };

        tracing::info!(
            generation = snapshot.generation,
            records = snapshot.resolver.len(),
            default_router = ?default_router,
            "authorization snapshot published"
        );
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    fn build_snapshot(
        &self,
        records: Vec<ApiAuthorizationRecord>,
        robot_defaults: &RobotRouterParams,
        default_router: Option<RouterKind>,
    ) -> Result<Snapshot> {
        if default_router == Some(RouterKind::Unrestricted) {
            return Err(ApiGateError::InvalidConfig(
                "default router must not be unrestricted".into(),
            ));
        }

        let resolver = AuthorizationResolver::new(records, robot_defaults)?;

        let mut routers = Vec::with_capacity(resolver.len());
        for (i, r) in resolver.records().iter().enumerate() {
            let router = build_router(r.router, resolver.params_of(i), &self.limiter)
                .map_err(|e| ApiGateError::InvalidConfig(format!("record {i}: {e}")))?;
            routers.push(router);
        }

        let default = match default_router {
            None => None,
            Some(kind) => {
                let params = (kind == RouterKind::Robot).then(|| Arc::new(robot_defaults.clone()));
                let router = build_router(kind, params.as_deref(), &self.limiter)?;
                let binding = RouterBinding {
                    record: None,
                    router: kind,
                    router_params: params,
                };
                Some((binding, router))
            }
        };

        Ok(Snapshot {
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
            resolver,
            routers,
            default,
        })
    }

    /// Generation of the active snapshot (0 before the first load).
    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }

    /// Router binding from the authorization records only; the default
    /// router does not apply here.
    pub fn resolve(&self, principal: &Principal) -> Result<RouterBinding> {
        self.snapshot.load().resolver.resolve(principal)
    }

    pub fn authorize(&self, principal: &Principal, call: &ApiCall) -> Decision {
        self.authorize_detailed(principal, call).decision
    }

    pub fn authorize_detailed(&self, principal: &Principal, call: &ApiCall) -> Authorization {
        let snap = self.snapshot.load();
        let Some((binding, router)) = snap.route(principal) else {
            tracing::info!(user = %principal.user, action = %call.action(), "no matching router");
            return Authorization::denied(DenyReason::NoMatchingRouter, None);
        };

        let ctx = CallContext::new(principal, &self.ledger);
        let decision = router.authorize(&ctx, call);
        match decision {
            Decision::Allow => {
                tracing::debug!(
                    user = %principal.user,
                    router = %binding.router,
                    action = %call.action(),
                    "call admitted"
                );
                Authorization {
                    decision,
                    hints: router.admission_hints(call),
                    binding: Some(binding),
                }
            }
            Decision::Deny(reason) => {
                tracing::info!(
                    user = %principal.user,
                    router = %binding.router,
                    action = %call.action(),
                    %reason,
                    "call denied"
                );
                Authorization::denied(reason, Some(binding))
            }
        }
    }

    /// Authorize an action named by string with raw JSON arguments.
    /// Unknown actions are denied; malformed arguments are a `BadRequest`.
    pub fn authorize_raw(
        &self,
        principal: &Principal,
        action: &str,
        args: serde_json::Value,
    ) -> Result<Decision> {
        Ok(self.authorize_raw_detailed(principal, action, args)?.decision)
    }

    pub fn authorize_raw_detailed(
        &self,
        principal: &Principal,
        action: &str,
        args: serde_json::Value,
    ) -> Result<Authorization> {
        let Ok(name) = action.parse::<ActionName>() else {
            let binding = self.snapshot.load().route(principal).map(|(b, _)| b);
            let reason = match binding {
                Some(_) => DenyReason::ActionDisabled,
                None => DenyReason::NoMatchingRouter,
            };
            tracing::info!(user = %principal.user, action, %reason, "unknown action denied");
            return Ok(Authorization::denied(reason, binding));
        };
        let call = ApiCall::from_parts(name, args)?;
        Ok(self.authorize_detailed(principal, &call))
    }

    /// Record a flow the dispatch layer started for `principal`, tagged with
    /// the robot id of the principal's router.
    pub fn register_flow(
        &self,
        principal: &Principal,
        client_id: &str,
        flow_id: &str,
        flow_name: &str,
    ) -> Result<FlowRecord> {
        let required = [client_id, flow_id, flow_name];
        if required.iter().any(|s| s.trim().is_empty()) {
            return Err(ApiGateError::BadRequest(
                "client_id, flow_id and flow_name are required".into(),
            ));
        }

        let snap = self.snapshot.load();
        let (_, router) = snap
            .route(principal)
            .ok_or_else(|| ApiGateError::NoMatchingRouter(principal.user.clone()))?;
        if !router.accepts_flow(flow_name) {
            tracing::info!(user = %principal.user, flow_name, "flow kind not startable by router");
            return Err(ApiGateError::NotAllowed(format!(
                "flow {flow_name} is not started by this router"
            )));
        }

        let record = FlowRecord {
            flow_name: flow_name.to_string(),
            creator: principal.user.clone(),
            robot_id: router.robot_id().map(str::to_string),
        };
        self.ledger.register(client_id, flow_id, record.clone())?;
        Ok(record)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn ledger(&self) -> &Arc<FlowLedger> {
        &self.ledger
    }
}
