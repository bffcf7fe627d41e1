//! JSON test vector loader shared by call and fingerprint tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::fs;

use apigate_core::{ActionName, ApiCall};
use serde::Deserialize;

/// Action name plus raw arguments, as a caller would send them.
#[derive(Debug, Deserialize)]
pub struct RawCall {
    pub action: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl RawCall {
    pub fn parse(&self) -> apigate_core::Result<ApiCall> {
        let action: ActionName = self.action.parse()?;
        ApiCall::from_parts(action, self.args.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct CallVector {
    pub description: String,
    #[serde(flatten)]
    pub call: RawCall,
    #[serde(default)]
    pub expect: Option<ExpectCall>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

/// Only fields present in the vector are checked.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectCall {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub size_ceilings: Option<Vec<u64>>,
    #[serde(default)]
    pub transfers_content: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FingerprintVector {
    pub description: String,
    pub a: RawCall,
    pub b: RawCall,
    pub same: bool,
}

pub fn load<T: serde::de::DeserializeOwned>(name: &str) -> Vec<T> {
    let s = fs::read_to_string(format!("tests/vectors/{name}"))
        .unwrap_or_else(|e| panic!("read vector {name}: {e}"));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse vector {name}: {e}"))
}
