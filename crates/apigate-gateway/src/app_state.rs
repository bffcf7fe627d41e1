//! Shared application state for the apigate HTTP adapter.
//!
//! Wires the authorization engine, its rate limiter and the metrics registry.
//! Startup errors come back as `Result` so `main` can report them cleanly.

use std::sync::Arc;
use std::time::Instant;

use apigate_core::error::Result;
use apigate_core::{ApiCall, Principal};

use crate::config::{ApiGateConfig, RobotRouterParams};
use crate::dispatch::RouterKind;
use crate::engine::{Authorization, AuthorizationEngine};
use crate::obs::ApiGateMetrics;
use crate::policy::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<AuthorizationEngine>,
    metrics: ApiGateMetrics,
    config_path: Option<String>,
}

impl AppState {
    /// Build application state from a validated config.
    pub fn new(cfg: &ApiGateConfig, config_path: Option<String>) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::with_system_clock());
        let engine = AuthorizationEngine::from_config(cfg, limiter)?;
        lint_config(cfg);
        Ok(Self::from_engine(Arc::new(engine), config_path))
    }

    pub fn from_engine(engine: Arc<AuthorizationEngine>, config_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine,
                metrics: ApiGateMetrics::default(),
                config_path,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.inner.engine
    }

    pub fn metrics(&self) -> &ApiGateMetrics {
        &self.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Authorize and record the outcome in metrics.
    pub fn authorize(&self, principal: &Principal, call: &ApiCall) -> Authorization {
        let started = Instant::now();
        let auth = self.inner.engine.authorize_detailed(principal, call);
        self.observe(&auth, call.action().as_str(), started);
        auth
    }

    pub fn authorize_raw(
        &self,
        principal: &Principal,
        action: &str,
        args: serde_json::Value,
    ) -> Result<Authorization> {
        let started = Instant::now();
        let auth = self
            .inner
            .engine
            .authorize_raw_detailed(principal, action, args)
            .map_err(|e| {
                self.inner
                    .metrics
                    .bad_requests
                    .inc(&[("code", e.client_code().as_str())]);
                e
            })?;
        self.observe(&auth, action, started);
        Ok(auth)
    }

    fn observe(&self, auth: &Authorization, action: &str, started: Instant) {
        let router = auth.binding.as_ref().map_or("none", |b| b.router.as_str());
        let m = &self.inner.metrics;
        m.decisions.inc(&[
            ("router", router),
            ("action", action),
            ("outcome", auth.decision.outcome()),
        ]);
        m.authorize_duration.observe(&[("router", router)], started.elapsed());
    }

    /// Re-read the config file and swap the snapshot.
    pub fn reload(&self) -> Result<u64> {
        let Some(path) = self.inner.config_path.as_deref() else {
            return Err(apigate_core::ApiGateError::BadRequest(
                "no config file to reload from".into(),
            ));
        };
        match self.inner.engine.reload_from_file(path) {
            Ok(()) => {
                self.inner.metrics.reloads.inc(&[("result", "ok")]);
                Ok(self.inner.engine.generation())
            }
            Err(e) => {
                self.inner.metrics.reloads.inc(&[("result", "rejected")]);
                Err(e)
            }
        }
    }

    /// Gauges appended to the metrics output.
    pub fn metrics_gauges(&self) -> Vec<(&'static str, u64)> {
        let engine = &self.inner.engine;
        vec![
            ("apigate_snapshot_generation", engine.generation()),
            ("apigate_rate_limiter_keys", engine.limiter().tracked_keys() as u64),
            ("apigate_flows_registered", engine.ledger().len() as u64),
        ]
    }
}

/// Startup warnings for configurations that are valid but likely unintended.
fn lint_config(cfg: &ApiGateConfig) {
    for (i, a) in cfg.authorizations.iter().enumerate() {
        let Ok(record) = a.to_record() else { continue };
        let params = record
            .router_params
            .as_ref()
            .unwrap_or(&cfg.engine.robot_defaults);
        if record.router == RouterKind::Robot {
            lint_robot_params(i, params);
        }
    }
}

fn lint_robot_params(i: usize, p: &RobotRouterParams) {
    let any_enabled = p.search_clients.as_ref().is_some_and(|s| s.enabled)
        || p.file_finder_flow.as_ref().is_some_and(|s| s.enabled)
        || p.artifact_collector_flow.as_ref().is_some_and(|s| s.enabled)
        || p.get_flow.as_ref().is_some_and(|s| s.enabled)
        || p.list_flow_results.as_ref().is_some_and(|s| s.enabled)
        || p.list_flow_logs.as_ref().is_some_and(|s| s.enabled)
        || p.get_flow_files_archive.as_ref().is_some_and(|s| s.enabled);
    if !any_enabled {
        tracing::warn!(record = i, "robot authorization enables no actions");
    }

    if let Some(ac) = &p.artifact_collector_flow {
        if ac.enabled && ac.artifacts_whitelist.is_empty() {
            tracing::warn!(
                record = i,
                "artifact_collector_flow enabled with empty whitelist; all artifacts are denied"
            );
        }
    }

    if let Some(ff) = &p.file_finder_flow {
        if ff.enabled && ff.max_flows_per_client_daily == 0 {
            tracing::warn!(record = i, "file_finder_flow enabled without a daily flow quota");
        }
    }

    let flow_reads = p.get_flow.as_ref().is_some_and(|s| s.enabled)
        || p.get_flow_files_archive.as_ref().is_some_and(|s| s.enabled);
    if flow_reads && p.robot_id.is_none() {
        tracing::warn!(
            record = i,
            "flow reads enabled without robot_id; flow ownership is not checked"
        );
    }
}
