//! Typed API call vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod vector_loader;

use std::collections::HashSet;

use apigate_core::call::FileFinderArgs;
use apigate_core::{ActionName, ApiCall, Decision, DenyReason};
use serde_json::json;
use vector_loader::{load, CallVector, FingerprintVector};

fn file_finder(call: &ApiCall) -> Option<&FileFinderArgs> {
    match call {
        ApiCall::FileFinderFlow(a) => Some(a),
        _ => None,
    }
}

#[test]
fn call_vectors() {
    let vectors: Vec<CallVector> = load("call_vectors.json");
    assert!(!vectors.is_empty());

    for v in vectors {
        let got = v.call.parse();

        if let Some(expect) = v.expect_error {
            let err = got.expect_err(&v.description);
            assert_eq!(err.client_code().as_str(), expect.code, "{}", v.description);
            continue;
        }

        let call = got.unwrap_or_else(|e| panic!("{}: {e}", v.description));
        assert_eq!(call.action().as_str(), v.call.action, "{}", v.description);

        let Some(expect) = v.expect else { continue };
        if let Some(client) = expect.client_id {
            assert_eq!(call.client_id(), Some(client.as_str()), "{}", v.description);
        }
        if let Some(flow) = expect.flow_id {
            assert_eq!(call.flow_id(), Some(flow.as_str()), "{}", v.description);
        }
        if let Some(ceilings) = expect.size_ceilings {
            let ff = file_finder(&call).expect("size_ceilings only applies to file_finder_flow");
            assert_eq!(ff.declared_size_ceilings(), ceilings, "{}", v.description);
        }
        if let Some(transfers) = expect.transfers_content {
            let ff = file_finder(&call).expect("transfers_content needs file_finder_flow");
            assert_eq!(ff.transfers_content(), transfers, "{}", v.description);
        }
    }
}

#[test]
fn fingerprint_vectors() {
    let vectors: Vec<FingerprintVector> = load("fingerprint_vectors.json");
    for v in vectors {
        let a = v.a.parse().unwrap().fingerprint().unwrap();
        let b = v.b.parse().unwrap().fingerprint().unwrap();
        assert_eq!(a == b, v.same, "{}", v.description);
    }
}

#[test]
fn fingerprint_is_hex_sha256_and_stable() {
    let call = ApiCall::from_parts(
        ActionName::FileFinderFlow,
        json!({ "client_id": "C.1", "paths": ["/etc/hosts"] }),
    )
    .unwrap();
    let fp = call.fingerprint().unwrap();
    assert_eq!(fp.len(), 64);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(fp, call.clone().fingerprint().unwrap());
}

#[test]
fn normalized_leaves_original_untouched() {
    let call = ApiCall::from_parts(
        ActionName::ArtifactCollectorFlow,
        json!({ "client_id": "C.1", "artifact_list": ["b", "a", "b"] }),
    )
    .unwrap();
    let norm = call.normalized();
    match (&call, &norm) {
        (ApiCall::ArtifactCollectorFlow(orig), ApiCall::ArtifactCollectorFlow(n)) => {
            assert_eq!(orig.artifact_list, vec!["b", "a", "b"]);
            assert_eq!(n.artifact_list, vec!["a", "b"]);
        }
        _ => panic!("action changed by normalization"),
    }
}

#[test]
fn wire_form_round_trips_through_serde() {
    let wire = json!({
        "action": "get_flow",
        "args": { "client_id": "C.1", "flow_id": "F:1" }
    });
    let call: ApiCall = serde_json::from_value(wire).unwrap();
    assert_eq!(call.action(), ActionName::GetFlow);
    assert_eq!(call.flow_id(), Some("F:1"));
}

#[test]
fn action_names_are_unique_and_parse_back() {
    let names: HashSet<&str> = ActionName::ALL.iter().map(|a| a.as_str()).collect();
    assert_eq!(names.len(), ActionName::ALL.len());
    for a in ActionName::ALL {
        assert_eq!(a.as_str().parse::<ActionName>().unwrap(), a);
        assert_eq!(a.to_string(), a.as_str());
    }
    assert!(ActionName::FileFinderFlow.is_rate_limited());
    assert!(!ActionName::GetFlow.is_rate_limited());
    assert!(ActionName::GetFlowFilesArchive.is_flow_scoped());
    assert!(!ActionName::SearchClients.is_flow_scoped());
}

#[test]
fn decision_codes() {
    assert_eq!(Decision::Allow.outcome(), "allow");
    let d = Decision::Deny(DenyReason::DailyQuotaExceeded);
    assert!(!d.is_allowed());
    assert_eq!(d.reason(), Some(DenyReason::DailyQuotaExceeded));
    assert_eq!(d.outcome(), DenyReason::DailyQuotaExceeded.as_str());
}
