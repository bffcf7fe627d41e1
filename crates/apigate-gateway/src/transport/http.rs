//! HTTP handlers for the authorization API.
//!
//! Identity is taken from headers set by the authenticating proxy in front of
//! the gateway:
//! - `X-Remote-User`: username (required)
//! - `X-Remote-Groups`: comma-separated group names (optional)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use apigate_core::error::{ApiGateError, ClientCode};
use apigate_core::Principal;

use crate::app_state::AppState;
use crate::dispatch::{AdmissionHints, RouterKind};

pub const USER_HEADER: &str = "x-remote-user";
pub const GROUPS_HEADER: &str = "x-remote-groups";

/// Build the caller principal from proxy headers.
pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiGateError> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiGateError::NotAllowed("missing X-Remote-User".into()))?;

    let groups = headers
        .get_all(GROUPS_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|g| !g.is_empty());

    Ok(Principal::new(user).with_groups(groups))
}

fn status_for(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::BadRequest | ClientCode::InvalidConfig | ClientCode::UnsupportedVersion => {
            StatusCode::BAD_REQUEST
        }
        ClientCode::NoMatchingRouter | ClientCode::NotAllowed => StatusCode::FORBIDDEN,
        ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(e: &ApiGateError) -> Response {
    let code = e.client_code();
    (
        status_for(code),
        Json(json!({ "error": code.as_str(), "message": e.to_string() })),
    )
        .into_response()
}

/// Unpack a JSON body, answering malformed ones with the usual error shape.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(v)| v).map_err(|e| {
        tracing::debug!(status = %e.status(), error = %e.body_text(), "request body rejected");
        error_response(&ApiGateError::BadRequest(e.body_text()))
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizeRequest {
    pub action: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
}

fn empty_args() -> serde_json::Value {
    json!({})
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterKind>,
    #[serde(flatten)]
    pub hints: AdmissionHints,
}

/// `POST /v1/authorize`: 200 on allow, 403 on deny; body carries the reason.
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let req = match json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let auth = match state.authorize_raw(&principal, &req.action, req.args) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };

    let status = if auth.decision.is_allowed() {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    let body = AuthorizeResponse {
        allowed: auth.decision.is_allowed(),
        reason: auth.decision.reason().map(|r| r.as_str()),
        router: auth.binding.map(|b| b.router),
        hints: auth.hints,
    };
    (status, Json(body)).into_response()
}

/// `GET /v1/resolve`: the caller's router binding.
pub async fn resolve(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    match state.engine().resolve(&principal) {
        Ok(binding) => (StatusCode::OK, Json(binding)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterFlowRequest {
    pub client_id: String,
    pub flow_id: String,
    pub flow_name: String,
}

/// `POST /v1/flows`: record a flow the dispatch layer started.
pub async fn register_flow(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterFlowRequest>, JsonRejection>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let req = match json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match state
        .engine()
        .register_flow(&principal, &req.client_id, &req.flow_id, &req.flow_name)
    {
        Ok(rec) => (
            StatusCode::CREATED,
            Json(json!({ "flow_name": rec.flow_name, "robot_id": rec.robot_id })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /v1/admin/reload`: only callers bound to an unrestricted router.
pub async fn reload(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    match state.engine().resolve(&principal) {
        Ok(b) if b.router == RouterKind::Unrestricted => {}
        Ok(_) => {
            let e = ApiGateError::NotAllowed("reload requires an unrestricted router".into());
            return error_response(&e);
        }
        Err(e) => return error_response(&e),
    }

    match state.reload() {
        Ok(generation) => {
            (StatusCode::OK, Json(json!({ "generation": generation }))).into_response()
        }
        Err(e) => error_response(&e),
    }
}
