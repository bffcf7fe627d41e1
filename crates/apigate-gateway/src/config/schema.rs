use std::collections::BTreeSet;
use std::time::Duration;

use apigate_core::error::{ApiGateError, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::RouterKind;
use crate::policy::glob::GlobFilter;
use crate::resolver::ApiAuthorizationRecord;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiGateConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub authorizations: Vec<AuthorizationConfig>,
}

impl ApiGateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ApiGateError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.engine.validate()?;

        for (i, a) in self.authorizations.iter().enumerate() {
            a.to_record()
                .map_err(|e| ApiGateError::InvalidConfig(format!("authorizations[{i}]: {e}")))?;
        }

        Ok(())
    }

    /// Typed records in load order.
    pub fn records(&self) -> Result<Vec<ApiAuthorizationRecord>> {
        self.authorizations.iter().map(AuthorizationConfig::to_record).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=86400).contains(&self.prune_interval_secs) {
            return Err(ApiGateError::InvalidConfig(
                "server.prune_interval_secs must be between 10 and 86400".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_prune_interval_secs() -> u64 {
    300
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Router kind used when no authorization record matches. Unset => deny.
    #[serde(default)]
    pub default_router: Option<String>,

    /// Parameters for robot records (and a robot default router) that carry
    /// no `router_params` of their own.
    #[serde(default)]
    pub robot_defaults: RobotRouterParams,
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(kind) = self.default_router_kind()? {
            if kind == RouterKind::Unrestricted {
                return Err(ApiGateError::InvalidConfig(
                    "engine.default_router must not be unrestricted".into(),
                ));
            }
        }
        self.robot_defaults.validate()
    }

    pub fn default_router_kind(&self) -> Result<Option<RouterKind>> {
        self.default_router
            .as_deref()
            .map(|s| s.parse::<RouterKind>())
            .transpose()
    }
}

/// One `ApiAuthorization` entry as written in the config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    pub router: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Kept untyped until the router kind is known.
    #[serde(default)]
    pub router_params: Option<serde_yaml::Value>,
}

impl AuthorizationConfig {
    /// Validate eagerly and convert into the typed record the resolver uses.
    pub fn to_record(&self) -> Result<ApiAuthorizationRecord> {
        let router: RouterKind = self.router.parse()?;

        let router_params = match (&self.router_params, router) {
            (None, _) => None,
            (Some(raw), RouterKind::Robot) => {
                let params: RobotRouterParams =
                    serde_yaml::from_value(raw.clone()).map_err(|e| {
                        ApiGateError::InvalidConfig(format!("invalid router_params: {e}"))
                    })?;
                params.validate()?;
                Some(params)
            }
            (Some(_), other) => {
                return Err(ApiGateError::InvalidConfig(format!(
                    "router {} takes no router_params",
                    other.as_str()
                )));
            }
        };

        let record = ApiAuthorizationRecord {
            router,
            router_params,
            users: self.users.iter().cloned().collect::<BTreeSet<_>>(),
            groups: self.groups.iter().cloned().collect::<BTreeSet<_>>(),
        };
        record.validate()?;
        Ok(record)
    }
}

/// How the daily flow count is keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// Count per (user, client, action, argument fingerprint).
    #[default]
    PerArguments,
    /// Count per (user, client, action) across all arguments.
    PerAction,
}

/// Behavior when a content-reading file-finder request states no size ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSizeCeiling {
    /// Admit; the dispatch layer applies `max_file_size` as the limit.
    #[default]
    Cap,
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotRouterParams {
    /// Tag for flows this robot starts; enables flow ownership checks.
    #[serde(default)]
    pub robot_id: Option<String>,
    #[serde(default)]
    pub quota_scope: QuotaScope,

    // An absent block leaves the action disabled.
    #[serde(default)]
    pub search_clients: Option<SimpleActionParams>,
    #[serde(default)]
    pub file_finder_flow: Option<FileFinderFlowParams>,
    #[serde(default)]
    pub artifact_collector_flow: Option<ArtifactCollectorFlowParams>,
    #[serde(default)]
    pub get_flow: Option<SimpleActionParams>,
    #[serde(default)]
    pub list_flow_results: Option<SimpleActionParams>,
    #[serde(default)]
    pub list_flow_logs: Option<SimpleActionParams>,
    #[serde(default)]
    pub get_flow_files_archive: Option<GetFlowFilesArchiveParams>,
}

impl RobotRouterParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.robot_id {
            if id.trim().is_empty() {
                return Err(ApiGateError::InvalidConfig("robot_id must not be blank".into()));
            }
        }
        if let Some(ff) = &self.file_finder_flow {
            check_flow_name("file_finder_flow_name", ff.file_finder_flow_name.as_deref())?;
        }
        if let Some(ac) = &self.artifact_collector_flow {
            check_flow_name(
                "artifact_collector_flow_name",
                ac.artifact_collector_flow_name.as_deref(),
            )?;
            if ac.artifacts_whitelist.iter().any(|a| a.trim().is_empty()) {
                return Err(ApiGateError::InvalidConfig(
                    "artifacts_whitelist entries must not be blank".into(),
                ));
            }
        }
        if let Some(ar) = &self.get_flow_files_archive {
            GlobFilter::compile(
                &ar.path_globs_blacklist,
                &ar.path_globs_whitelist,
                !ar.path_globs_case_insensitive,
            )?;
        }
        Ok(())
    }
}

fn check_flow_name(field: &str, name: Option<&str>) -> Result<()> {
    match name {
        Some(n) if n.trim().is_empty() => Err(ApiGateError::InvalidConfig(format!(
            "{field} must not be blank"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleActionParams {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileFinderFlowParams {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub globs_allowed: bool,
    #[serde(default)]
    pub interpolations_allowed: bool,
    #[serde(default)]
    pub file_finder_flow_name: Option<String>,
    /// 0 => unlimited.
    #[serde(default)]
    pub max_flows_per_client_daily: u32,
    /// 0 => no duplicate suppression.
    #[serde(default)]
    pub min_interval_between_duplicate_flows_secs: u64,
    /// 0 => no size limit.
    #[serde(default)]
    pub max_file_size: u64,
    #[serde(default = "default_true")]
    pub enforce_max_file_size: bool,
    #[serde(default)]
    pub missing_size_ceiling: MissingSizeCeiling,
}

impl Default for FileFinderFlowParams {
    fn default() -> Self {
        Self {
            enabled: false,
            globs_allowed: false,
            interpolations_allowed: false,
            file_finder_flow_name: None,
            max_flows_per_client_daily: 0,
            min_interval_between_duplicate_flows_secs: 0,
            max_file_size: 0,
            enforce_max_file_size: true,
            missing_size_ceiling: MissingSizeCeiling::Cap,
        }
    }
}

impl FileFinderFlowParams {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_between_duplicate_flows_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactCollectorFlowParams {
    #[serde(default)]
    pub enabled: bool,
    /// Empty => nothing collectible.
    #[serde(default)]
    pub artifacts_whitelist: Vec<String>,
    #[serde(default)]
    pub artifact_collector_flow_name: Option<String>,
    #[serde(default)]
    pub max_flows_per_client_daily: u32,
    #[serde(default)]
    pub min_interval_between_duplicate_flows_secs: u64,
}

impl ArtifactCollectorFlowParams {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_between_duplicate_flows_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetFlowFilesArchiveParams {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path_globs_blacklist: Vec<String>,
    #[serde(default)]
    pub path_globs_whitelist: Vec<String>,
    #[serde(default)]
    pub skip_glob_checks_for_artifact_collector: bool,
    #[serde(default)]
    pub path_globs_case_insensitive: bool,
}

fn default_true() -> bool {
    true
}
