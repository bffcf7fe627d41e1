//! Config loader (strict parsing, eager validation).

pub mod schema;

use std::fs;

use apigate_core::error::{ApiGateError, Result};

pub use schema::{
    ApiGateConfig, ArtifactCollectorFlowParams, AuthorizationConfig, EngineSection,
    FileFinderFlowParams, GetFlowFilesArchiveParams, MissingSizeCeiling, QuotaScope,
    RobotRouterParams, ServerSection, SimpleActionParams,
};

pub fn load_from_file(path: &str) -> Result<ApiGateConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ApiGateError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ApiGateConfig> {
    let cfg: ApiGateConfig = serde_yaml::from_str(s)
        .map_err(|e| ApiGateError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
