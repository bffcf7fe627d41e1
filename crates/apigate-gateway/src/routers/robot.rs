use std::sync::Arc;

use apigate_core::error::Result;
use apigate_core::{ActionName, ApiCall, Decision, DenyReason};

use crate::config::schema::{QuotaScope, RobotRouterParams};
use crate::context::CallContext;
use crate::dispatch::{AdmissionHints, ApiRouter, RouterKind};
use crate::policy::actions::DEFAULT_ARTIFACT_COLLECTOR_FLOW;
use crate::policy::{
    ArchivePolicy, ArtifactCollectorPolicy, FileFinderPolicy, RateLimitKey, RateLimiter,
    SimpleActionPolicy,
};

/// Router for automated service accounts: every exposed action has its own
/// enable flag and rules; unconfigured actions are denied.
pub struct RobotRouter {
    robot_id: Option<String>,
    quota_scope: QuotaScope,

    search_clients: Option<SimpleActionPolicy>,
    file_finder: Option<FileFinderPolicy>,
    artifact_collector: Option<ArtifactCollectorPolicy>,
    get_flow: Option<SimpleActionPolicy>,
    list_flow_results: Option<SimpleActionPolicy>,
    list_flow_logs: Option<SimpleActionPolicy>,
    archive: Option<ArchivePolicy>,
}

macro_rules! decided {
    ($d:expr) => {
        match $d {
            Decision::Allow => {}
            deny => return deny,
        }
    };
}

impl RobotRouter {
    pub fn new(params: &RobotRouterParams, limiter: Arc<RateLimiter>) -> Result<Self> {
        let scope = params.quota_scope;

        let artifact_collector = params
            .artifact_collector_flow
            .as_ref()
            .map(|p| ArtifactCollectorPolicy::new(p, scope, Arc::clone(&limiter)));

        let ac_flow = artifact_collector
            .as_ref()
            .map_or(DEFAULT_ARTIFACT_COLLECTOR_FLOW, |p| p.flow_name());
        let archive = params
            .get_flow_files_archive
            .as_ref()
            .map(|p| ArchivePolicy::new(p, ac_flow))
            .transpose()?;

        Ok(Self {
            robot_id: params.robot_id.clone(),
            quota_scope: scope,
            search_clients: params.search_clients.as_ref().map(SimpleActionPolicy::new),
            file_finder: params
                .file_finder_flow
                .as_ref()
                .map(|p| FileFinderPolicy::new(p, scope, Arc::clone(&limiter))),
            artifact_collector,
            get_flow: params.get_flow.as_ref().map(SimpleActionPolicy::new),
            list_flow_results: params.list_flow_results.as_ref().map(SimpleActionPolicy::new),
            list_flow_logs: params.list_flow_logs.as_ref().map(SimpleActionPolicy::new),
            archive,
        })
    }

    pub fn quota_scope(&self) -> QuotaScope {
        self.quota_scope
    }

    /// Flow the dispatch layer starts for a flow-starting action.
    pub fn flow_name_for(&self, action: ActionName) -> Option<&str> {
        match action {
            ActionName::FileFinderFlow => self.file_finder.as_ref().map(|p| p.flow_name()),
            ActionName::ArtifactCollectorFlow => {
                self.artifact_collector.as_ref().map(|p| p.flow_name())
            }
            _ => None,
        }
    }

    /// Archive predicate for the files of an owned flow.
    pub fn archive_policy(&self) -> Option<&ArchivePolicy> {
        self.archive.as_ref()
    }

    fn simple(policy: Option<&SimpleActionPolicy>) -> Decision {
        policy.map_or(Decision::Deny(DenyReason::ActionDisabled), |p| p.validate())
    }

    fn check_owned(&self, ctx: &CallContext<'_>, client_id: &str, flow_id: &str) -> Decision {
        let Some(robot_id) = &self.robot_id else {
            return Decision::Allow;
        };
        if ctx.ledger.is_owned_by(client_id, flow_id, robot_id) {
            Decision::Allow
        } else {
            tracing::info!(
                user = ctx.user(),
                client = client_id,
                flow = flow_id,
                "flow not started by this robot"
            );
            Decision::Deny(DenyReason::FlowNotOwned)
        }
    }

    fn rate_key(
        &self,
        ctx: &CallContext<'_>,
        call: &ApiCall,
        client_id: &str,
    ) -> Option<RateLimitKey> {
        match call.fingerprint() {
            Ok(fp) => Some(RateLimitKey {
                user: ctx.user().to_string(),
                client_id: client_id.trim().to_string(),
                action: call.action(),
                argument_fingerprint: fp,
            }),
            Err(e) => {
                tracing::error!(error = %e, "argument fingerprint failed");
                None
            }
        }
    }
}

impl ApiRouter for RobotRouter {
    fn kind(&self) -> RouterKind {
        RouterKind::Robot
    }

    fn authorize(&self, ctx: &CallContext<'_>, call: &ApiCall) -> Decision {
        match call {
            ApiCall::SearchClients(_) => Self::simple(self.search_clients.as_ref()),

            ApiCall::FileFinderFlow(args) => {
                let Some(p) = &self.file_finder else {
                    return Decision::Deny(DenyReason::ActionDisabled);
                };
                decided!(p.validate(args));
                match self.rate_key(ctx, call, &args.client_id) {
                    Some(key) => p.admit(&key),
                    None => Decision::Deny(DenyReason::ActionDisabled),
                }
            }

            ApiCall::ArtifactCollectorFlow(args) => {
                let Some(p) = &self.artifact_collector else {
                    return Decision::Deny(DenyReason::ActionDisabled);
                };
                decided!(p.validate(args));
                match self.rate_key(ctx, call, &args.client_id) {
                    Some(key) => p.admit(&key),
                    None => Decision::Deny(DenyReason::ActionDisabled),
                }
            }

            ApiCall::GetFlow(f) => {
                decided!(Self::simple(self.get_flow.as_ref()));
                self.check_owned(ctx, &f.client_id, &f.flow_id)
            }
            ApiCall::ListFlowResults(f) => {
                decided!(Self::simple(self.list_flow_results.as_ref()));
                self.check_owned(ctx, &f.client_id, &f.flow_id)
            }
            ApiCall::ListFlowLogs(f) => {
                decided!(Self::simple(self.list_flow_logs.as_ref()));
                self.check_owned(ctx, &f.client_id, &f.flow_id)
            }

            ApiCall::GetFlowFilesArchive(args) => {
                let Some(p) = &self.archive else {
                    return Decision::Deny(DenyReason::ActionDisabled);
                };
                if !p.enabled() {
                    return Decision::Deny(DenyReason::ActionDisabled);
                }
                decided!(self.check_owned(ctx, &args.client_id, &args.flow_id));

                // Flow kind comes from the ledger only; unknown flows get no bypass.
                let flow_name = ctx
                    .ledger
                    .get(&args.client_id, &args.flow_id)
                    .map(|r| r.flow_name);
                p.validate(flow_name.as_deref(), &args.paths)
            }
        }
    }

    fn admission_hints(&self, call: &ApiCall) -> AdmissionHints {
        match call {
            ApiCall::FileFinderFlow(args) => AdmissionHints {
                flow_name: self.flow_name_for(ActionName::FileFinderFlow).map(str::to_string),
                max_file_size: self.file_finder.as_ref().and_then(|p| p.effective_max_size(args)),
            },
            ApiCall::ArtifactCollectorFlow(_) => AdmissionHints {
                flow_name: self
                    .flow_name_for(ActionName::ArtifactCollectorFlow)
                    .map(str::to_string),
                max_file_size: None,
            },
            _ => AdmissionHints::default(),
        }
    }

    fn robot_id(&self) -> Option<&str> {
        self.robot_id.as_deref()
    }

    fn accepts_flow(&self, flow_name: &str) -> bool {
        [ActionName::FileFinderFlow, ActionName::ArtifactCollectorFlow]
            .into_iter()
            .any(|a| self.flow_name_for(a) == Some(flow_name))
    }
}
