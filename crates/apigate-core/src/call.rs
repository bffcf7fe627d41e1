//! Typed API calls subject to authorization.
//!
//! The wire form is `{"action": "<name>", "args": {...}}`. Arguments are
//! parsed strictly (`deny_unknown_fields`) so a typo never slips past a
//! validation rule it was meant to trigger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ApiGateError, Result};

/// Every API action a robot router knows how to gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    SearchClients,
    FileFinderFlow,
    ArtifactCollectorFlow,
    GetFlow,
    ListFlowResults,
    ListFlowLogs,
    GetFlowFilesArchive,
}

impl ActionName {
    pub const ALL: [ActionName; 7] = [
        ActionName::SearchClients,
        ActionName::FileFinderFlow,
        ActionName::ArtifactCollectorFlow,
        ActionName::GetFlow,
        ActionName::ListFlowResults,
        ActionName::ListFlowLogs,
        ActionName::GetFlowFilesArchive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::SearchClients => "search_clients",
            ActionName::FileFinderFlow => "file_finder_flow",
            ActionName::ArtifactCollectorFlow => "artifact_collector_flow",
            ActionName::GetFlow => "get_flow",
            ActionName::ListFlowResults => "list_flow_results",
            ActionName::ListFlowLogs => "list_flow_logs",
            ActionName::GetFlowFilesArchive => "get_flow_files_archive",
        }
    }

    /// Actions that start a flow on a client and therefore carry quotas.
    pub fn is_rate_limited(self) -> bool {
        matches!(self, ActionName::FileFinderFlow | ActionName::ArtifactCollectorFlow)
    }

    /// Actions that read back a previously started flow.
    pub fn is_flow_scoped(self) -> bool {
        matches!(
            self,
            ActionName::GetFlow
                | ActionName::ListFlowResults
                | ActionName::ListFlowLogs
                | ActionName::GetFlowFilesArchive
        )
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = ApiGateError;

    fn from_str(s: &str) -> Result<Self> {
        ActionName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ApiGateError::BadRequest(format!("unknown action: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchClientsArgs {
    pub query: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub count: u64,
}

/// File-finder condition. Only `size` participates in authorization; the rest
/// are carried so the fingerprint reflects the full request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum FileFinderCondition {
    Size {
        #[serde(default)]
        min_file_size: Option<u64>,
        #[serde(default)]
        max_file_size: Option<u64>,
    },
    ModificationTime {
        #[serde(default)]
        min_last_modified_time: Option<u64>,
        #[serde(default)]
        max_last_modified_time: Option<u64>,
    },
    ContentsLiteralMatch {
        literal: String,
    },
    ContentsRegexMatch {
        regex: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum FileFinderAction {
    #[default]
    Stat,
    Hash {
        #[serde(default)]
        max_size: Option<u64>,
    },
    Download {
        #[serde(default)]
        max_size: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileFinderArgs {
    pub client_id: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<FileFinderCondition>,
    #[serde(default)]
    pub action: FileFinderAction,
}

impl FileFinderArgs {
    /// Size ceilings the request states, from size conditions and the
    /// download/hash limit.
    pub fn declared_size_ceilings(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self
            .conditions
            .iter()
            .filter_map(|c| match c {
                FileFinderCondition::Size { max_file_size, .. } => *max_file_size,
                _ => None,
            })
            .collect();
        match &self.action {
            FileFinderAction::Hash { max_size: Some(m) }
            | FileFinderAction::Download { max_size: Some(m) } => out.push(*m),
            _ => {}
        }
        out
    }

    /// Whether the request reads file contents (and so is bounded by size).
    pub fn transfers_content(&self) -> bool {
        !matches!(self.action, FileFinderAction::Stat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactCollectorArgs {
    pub client_id: String,
    pub artifact_list: Vec<String>,
}

/// Reference to a flow already started on a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowRef {
    pub client_id: String,
    pub flow_id: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetFlowFilesArchiveArgs {
    pub client_id: String,
    pub flow_id: String,
    /// Candidate file paths proposed for inclusion in the archive.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// One inbound API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum ApiCall {
    SearchClients(SearchClientsArgs),
    FileFinderFlow(FileFinderArgs),
    ArtifactCollectorFlow(ArtifactCollectorArgs),
    GetFlow(FlowRef),
    ListFlowResults(FlowRef),
    ListFlowLogs(FlowRef),
    GetFlowFilesArchive(GetFlowFilesArchiveArgs),
}

impl ApiCall {
    /// Build a call from an action name and raw JSON arguments.
    pub fn from_parts(action: ActionName, args: serde_json::Value) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(
            action: ActionName,
            args: serde_json::Value,
        ) -> Result<T> {
            serde_json::from_value(args).map_err(|e| {
                tracing::debug!(%action, error = %e, "call arguments rejected");
                ApiGateError::BadRequest(format!("{action} invalid args: {e}"))
            })
        }

        Ok(match action {
            ActionName::SearchClients => ApiCall::SearchClients(parse(action, args)?),
            ActionName::FileFinderFlow => ApiCall::FileFinderFlow(parse(action, args)?),
            ActionName::ArtifactCollectorFlow => {
                ApiCall::ArtifactCollectorFlow(parse(action, args)?)
            }
            ActionName::GetFlow => ApiCall::GetFlow(parse(action, args)?),
            ActionName::ListFlowResults => ApiCall::ListFlowResults(parse(action, args)?),
            ActionName::ListFlowLogs => ApiCall::ListFlowLogs(parse(action, args)?),
            ActionName::GetFlowFilesArchive => {
                ApiCall::GetFlowFilesArchive(parse(action, args)?)
            }
        })
    }

    pub fn action(&self) -> ActionName {
        match self {
            ApiCall::SearchClients(_) => ActionName::SearchClients,
            ApiCall::FileFinderFlow(_) => ActionName::FileFinderFlow,
            ApiCall::ArtifactCollectorFlow(_) => ActionName::ArtifactCollectorFlow,
            ApiCall::GetFlow(_) => ActionName::GetFlow,
            ApiCall::ListFlowResults(_) => ActionName::ListFlowResults,
            ApiCall::ListFlowLogs(_) => ActionName::ListFlowLogs,
            ApiCall::GetFlowFilesArchive(_) => ActionName::GetFlowFilesArchive,
        }
    }

    /// Target client, if the action addresses one.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            ApiCall::SearchClients(_) => None,
            ApiCall::FileFinderFlow(a) => Some(&a.client_id),
            ApiCall::ArtifactCollectorFlow(a) => Some(&a.client_id),
            ApiCall::GetFlow(f) | ApiCall::ListFlowResults(f) | ApiCall::ListFlowLogs(f) => {
                Some(&f.client_id)
            }
            ApiCall::GetFlowFilesArchive(a) => Some(&a.client_id),
        }
    }

    /// Flow addressed by a flow-scoped action.
    pub fn flow_id(&self) -> Option<&str> {
        match self {
            ApiCall::GetFlow(f) | ApiCall::ListFlowResults(f) | ApiCall::ListFlowLogs(f) => {
                Some(&f.flow_id)
            }
            ApiCall::GetFlowFilesArchive(a) => Some(&a.flow_id),
            _ => None,
        }
    }

    /// Copy with order-insensitive lists canonicalized: paths trimmed, sorted
    /// and de-duplicated, artifact names sorted and de-duplicated.
    pub fn normalized(&self) -> ApiCall {
        let mut call = self.clone();
        match &mut call {
            ApiCall::FileFinderFlow(a) => {
                a.client_id = a.client_id.trim().to_string();
                canonical_list(&mut a.paths);
            }
            ApiCall::ArtifactCollectorFlow(a) => {
                a.client_id = a.client_id.trim().to_string();
                canonical_list(&mut a.artifact_list);
            }
            ApiCall::GetFlowFilesArchive(a) => canonical_list(&mut a.paths),
            _ => {}
        }
        call
    }

    /// Deterministic digest of the normalized call (hex SHA-256 over
    /// sorted-key JSON).
    pub fn fingerprint(&self) -> Result<String> {
        // serde_json::Value objects are BTreeMap-backed, so keys come out sorted.
        let value = serde_json::to_value(self.normalized())
            .map_err(|e| ApiGateError::Internal(format!("fingerprint encode failed: {e}")))?;
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| ApiGateError::Internal(format!("fingerprint encode failed: {e}")))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

fn canonical_list(items: &mut Vec<String>) {
    for item in items.iter_mut() {
        let trimmed = item.trim();
        if trimmed.len() != item.len() {
            *item = trimmed.to_string();
        }
    }
    items.retain(|s| !s.is_empty());
    items.sort();
    items.dedup();
}
