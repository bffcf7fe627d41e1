//! Per-action policies of the robot router.
//!
//! Each policy is compiled once per configuration snapshot. Evaluation order
//! is fixed: enabled flag, argument rules, then quotas (for flow-starting
//! actions only).

use std::collections::HashSet;
use std::sync::Arc;

use apigate_core::call::{ArtifactCollectorArgs, FileFinderArgs};
use apigate_core::error::Result;
use apigate_core::{Decision, DenyReason};

use crate::config::schema::{
    ArtifactCollectorFlowParams, FileFinderFlowParams, GetFlowFilesArchiveParams,
    MissingSizeCeiling, QuotaScope, SimpleActionParams,
};

use super::glob::{has_glob_metasyntax, GlobFilter, GlobVerdict};
use super::limiter::{QuotaLimits, RateLimitKey, RateLimiter};

pub const DEFAULT_FILE_FINDER_FLOW: &str = "FileFinder";
pub const DEFAULT_ARTIFACT_COLLECTOR_FLOW: &str = "ArtifactCollectorFlow";

/// Marker introducing a knowledge-base interpolation such as `%%users.homedir%%`.
const INTERPOLATION_MARKER: &str = "%%";

fn enabled_or_deny(enabled: bool) -> Decision {
    if enabled {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::ActionDisabled)
    }
}

/// Actions without argument rules or quotas.
#[derive(Debug, Clone)]
pub struct SimpleActionPolicy {
    enabled: bool,
}

impl SimpleActionPolicy {
    pub fn new(params: &SimpleActionParams) -> Self {
        Self { enabled: params.enabled }
    }

    pub fn validate(&self) -> Decision {
        enabled_or_deny(self.enabled)
    }
}

/// Quota settings shared by the two flow-starting actions.
#[derive(Clone)]
struct FlowQuota {
    limits: QuotaLimits,
    limiter: Arc<RateLimiter>,
}

impl FlowQuota {
    fn admit(&self, key: &RateLimitKey) -> Decision {
        self.limiter.admit_and_record(key, self.limits)
    }
}

pub struct FileFinderPolicy {
    params: FileFinderFlowParams,
    quota: FlowQuota,
}

impl FileFinderPolicy {
    pub fn new(
        params: &FileFinderFlowParams,
        scope: QuotaScope,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            quota: FlowQuota {
                limits: QuotaLimits {
                    max_daily: params.max_flows_per_client_daily,
                    min_interval: params.min_interval(),
                    scope,
                },
                limiter,
            },
            params: params.clone(),
        }
    }

    pub fn flow_name(&self) -> &str {
        self.params
            .file_finder_flow_name
            .as_deref()
            .unwrap_or(DEFAULT_FILE_FINDER_FLOW)
    }

    /// Enabled flag and argument rules; no state is touched.
    pub fn validate(&self, args: &FileFinderArgs) -> Decision {
        if !self.params.enabled {
            return Decision::Deny(DenyReason::ActionDisabled);
        }

        if !self.params.globs_allowed && args.paths.iter().any(|p| has_glob_metasyntax(p)) {
            return Decision::Deny(DenyReason::GlobsNotAllowed);
        }

        if !self.params.interpolations_allowed
            && args.paths.iter().any(|p| p.contains(INTERPOLATION_MARKER))
        {
            return Decision::Deny(DenyReason::InterpolationsNotAllowed);
        }

        self.check_size(args)
    }

    fn check_size(&self, args: &FileFinderArgs) -> Decision {
        let max = self.params.max_file_size;
        if max == 0 || !self.params.enforce_max_file_size {
            return Decision::Allow;
        }

        let ceilings = args.declared_size_ceilings();
        if ceilings.iter().any(|&c| c > max) {
            return Decision::Deny(DenyReason::FileTooLarge);
        }

        if ceilings.is_empty()
            && args.transfers_content()
            && self.params.missing_size_ceiling == MissingSizeCeiling::Deny
        {
            return Decision::Deny(DenyReason::FileTooLarge);
        }

        Decision::Allow
    }

    /// Byte limit the started flow must apply per file, if any.
    pub fn effective_max_size(&self, args: &FileFinderArgs) -> Option<u64> {
        let configured = (self.params.max_file_size > 0).then_some(self.params.max_file_size);
        args.declared_size_ceilings()
            .into_iter()
            .chain(configured)
            .min()
    }

    pub fn admit(&self, key: &RateLimitKey) -> Decision {
        self.quota.admit(key)
    }
}

pub struct ArtifactCollectorPolicy {
    enabled: bool,
    whitelist: HashSet<String>,
    flow_name: String,
    quota: FlowQuota,
}

impl ArtifactCollectorPolicy {
    pub fn new(
        params: &ArtifactCollectorFlowParams,
        scope: QuotaScope,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            enabled: params.enabled,
            whitelist: params.artifacts_whitelist.iter().cloned().collect(),
            flow_name: params
                .artifact_collector_flow_name
                .clone()
                .unwrap_or_else(|| DEFAULT_ARTIFACT_COLLECTOR_FLOW.to_string()),
            quota: FlowQuota {
                limits: QuotaLimits {
                    max_daily: params.max_flows_per_client_daily,
                    min_interval: params.min_interval(),
                    scope,
                },
                limiter,
            },
        }
    }

    pub fn flow_name(&self) -> &str {
        &self.flow_name
    }

    pub fn validate(&self, args: &ArtifactCollectorArgs) -> Decision {
        if !self.enabled {
            return Decision::Deny(DenyReason::ActionDisabled);
        }

        // Empty whitelist: nothing is collectible.
        if self.whitelist.is_empty() {
            return Decision::Deny(DenyReason::ArtifactNotWhitelisted);
        }

        if let Some(a) = args.artifact_list.iter().find(|a| !self.whitelist.contains(*a)) {
            tracing::info!(artifact = %a, "artifact not whitelisted");
            return Decision::Deny(DenyReason::ArtifactNotWhitelisted);
        }

        Decision::Allow
    }

    pub fn admit(&self, key: &RateLimitKey) -> Decision {
        self.quota.admit(key)
    }
}

pub struct ArchivePolicy {
    enabled: bool,
    filter: GlobFilter,
    skip_for_artifact_collector: bool,
    artifact_collector_flow: String,
}

impl ArchivePolicy {
    /// `artifact_collector_flow` is the flow name treated as the
    /// artifact-collector kind for the glob bypass.
    pub fn new(params: &GetFlowFilesArchiveParams, artifact_collector_flow: &str) -> Result<Self> {
        Ok(Self {
            enabled: params.enabled,
            filter: GlobFilter::compile(
                &params.path_globs_blacklist,
                &params.path_globs_whitelist,
                !params.path_globs_case_insensitive,
            )?,
            skip_for_artifact_collector: params.skip_glob_checks_for_artifact_collector,
            artifact_collector_flow: artifact_collector_flow.to_string(),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn bypasses(&self, flow_name: Option<&str>) -> bool {
        self.skip_for_artifact_collector && flow_name == Some(self.artifact_collector_flow.as_str())
    }

    /// Every candidate path must pass the glob filter.
    pub fn validate<S: AsRef<str>>(&self, flow_name: Option<&str>, paths: &[S]) -> Decision {
        if !self.enabled {
            return Decision::Deny(DenyReason::ActionDisabled);
        }
        if self.bypasses(flow_name) {
            return Decision::Allow;
        }

        for p in paths {
            match self.filter.evaluate(p.as_ref()) {
                GlobVerdict::Included => {}
                GlobVerdict::Blacklisted => return Decision::Deny(DenyReason::PathBlacklisted),
                GlobVerdict::NotWhitelisted => {
                    return Decision::Deny(DenyReason::PathNotWhitelisted)
                }
            }
        }
        Decision::Allow
    }

    /// Archive predicate: the subset of `paths` an archive may include.
    pub fn filter_paths<'a, S: AsRef<str>>(
        &self,
        flow_name: Option<&str>,
        paths: &'a [S],
    ) -> Vec<&'a str> {
        let bypass = self.bypasses(flow_name);
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| bypass || self.filter.includes(p))
            .collect()
    }
}
