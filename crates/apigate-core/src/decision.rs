//! Authorization decision surface.

use serde::Serialize;

/// Why a call was refused. Every denial carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    ActionDisabled,
    GlobsNotAllowed,
    InterpolationsNotAllowed,
    ArtifactNotWhitelisted,
    FileTooLarge,
    DailyQuotaExceeded,
    DuplicateTooSoon,
    PathBlacklisted,
    PathNotWhitelisted,
    NoMatchingRouter,
    /// Flow-scoped call against a flow this robot did not start.
    FlowNotOwned,
    /// The bound router refuses every call.
    RouterDisabled,
}

impl DenyReason {
    /// Stable code used in responses, logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::ActionDisabled => "ACTION_DISABLED",
            DenyReason::GlobsNotAllowed => "GLOBS_NOT_ALLOWED",
            DenyReason::InterpolationsNotAllowed => "INTERPOLATIONS_NOT_ALLOWED",
            DenyReason::ArtifactNotWhitelisted => "ARTIFACT_NOT_WHITELISTED",
            DenyReason::FileTooLarge => "FILE_TOO_LARGE",
            DenyReason::DailyQuotaExceeded => "DAILY_QUOTA_EXCEEDED",
            DenyReason::DuplicateTooSoon => "DUPLICATE_TOO_SOON",
            DenyReason::PathBlacklisted => "PATH_BLACKLISTED",
            DenyReason::PathNotWhitelisted => "PATH_NOT_WHITELISTED",
            DenyReason::NoMatchingRouter => "NO_MATCHING_ROUTER",
            DenyReason::FlowNotOwned => "FLOW_NOT_OWNED",
            DenyReason::RouterDisabled => "ROUTER_DISABLED",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(r) => Some(r),
        }
    }

    /// Label used for metrics (`allow` or the deny code).
    pub fn outcome(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny(r) => r.as_str(),
        }
    }
}
