#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::Write;
use std::sync::Arc;

use apigate_core::{ApiCall, Decision, DenyReason, Principal};
use apigate_gateway::config::{self, FileFinderFlowParams, RobotRouterParams, SimpleActionParams};
use apigate_gateway::dispatch::RouterKind;
use apigate_gateway::policy::RateLimiter;
use apigate_gateway::{ApiAuthorizationRecord, AuthorizationEngine};
use serde_json::json;

fn engine() -> AuthorizationEngine {
    AuthorizationEngine::new(Arc::new(RateLimiter::with_system_clock()))
}

fn search_only() -> RobotRouterParams {
    RobotRouterParams {
        search_clients: Some(SimpleActionParams { enabled: true }),
        ..RobotRouterParams::default()
    }
}

fn search() -> ApiCall {
    ApiCall::from_parts(
        apigate_core::ActionName::SearchClients,
        json!({ "query": "host:web" }),
    )
    .unwrap()
}

#[test]
fn empty_engine_denies_everyone() {
    let e = engine();
    assert_eq!(e.generation(), 0);
    assert_eq!(
        e.authorize(&Principal::new("alice"), &search()),
        Decision::Deny(DenyReason::NoMatchingRouter)
    );
    let err = e.resolve(&Principal::new("alice")).unwrap_err();
    assert_eq!(err.client_code().as_str(), "NO_MATCHING_ROUTER");
}

#[test]
fn user_and_group_routing() {
    let e = engine();
    e.load_snapshot(
        vec![
            ApiAuthorizationRecord::new(RouterKind::Robot)
                .users(["alice"])
                .groups(["robots"])
                .params(search_only()),
        ],
        RobotRouterParams::default(),
    )
    .unwrap();

    let alice = Principal::new("alice");
    let bob = Principal::new("bob").with_groups(["robots"]);
    let carol = Principal::new("carol").with_groups(["humans"]);

    assert_eq!(e.resolve(&alice).unwrap().router, RouterKind::Robot);
    assert_eq!(e.resolve(&bob).unwrap().record, Some(0));
    assert!(e.resolve(&carol).is_err());

    assert!(e.authorize(&alice, &search()).is_allowed());
    assert!(e.authorize(&bob, &search()).is_allowed());
    assert_eq!(
        e.authorize(&carol, &search()),
        Decision::Deny(DenyReason::NoMatchingRouter)
    );
}

#[test]
fn first_matching_record_wins() {
    let e = engine();
    e.load_snapshot(
        vec![
            ApiAuthorizationRecord::new(RouterKind::Disabled).users(["mallory"]),
            ApiAuthorizationRecord::new(RouterKind::Robot)
                .groups(["robots"])
                .params(search_only()),
        ],
        RobotRouterParams::default(),
    )
    .unwrap();

    let mallory = Principal::new("mallory").with_groups(["robots"]);
    let binding = e.resolve(&mallory).unwrap();
    assert_eq!(binding.record, Some(0));
    assert_eq!(binding.router, RouterKind::Disabled);
    assert_eq!(
        e.authorize(&mallory, &search()),
        Decision::Deny(DenyReason::RouterDisabled)
    );

    let other = Principal::new("svc").with_groups(["robots"]);
    assert!(e.authorize(&other, &search()).is_allowed());
}

#[test]
fn robot_records_without_params_use_defaults() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Robot).users(["svc"])],
        search_only(),
    )
    .unwrap();
    let binding = e.resolve(&Principal::new("svc")).unwrap();
    assert_eq!(binding.router_params.as_deref(), Some(&search_only()));
    assert!(e.authorize(&Principal::new("svc"), &search()).is_allowed());
}

#[test]
fn unrestricted_router_allows_everything() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Unrestricted).groups(["admins"])],
        RobotRouterParams::default(),
    )
    .unwrap();
    let root = Principal::new("root").with_groups(["admins"]);
    let archive = ApiCall::from_parts(
        apigate_core::ActionName::GetFlowFilesArchive,
        json!({ "client_id": "C.1", "flow_id": "F:1", "paths": ["/etc/shadow"] }),
    )
    .unwrap();
    assert!(e.authorize(&root, &archive).is_allowed());
}

#[test]
fn default_router_applies_only_to_unmatched_callers() {
    let cfg = config::load_from_str(
        r#"
version: 1
engine:
  default_router: robot
  robot_defaults:
    search_clients: { enabled: true }
authorizations:
  - router: disabled
    users: [mallory]
"#,
    )
    .unwrap();
    let e = AuthorizationEngine::from_config(&cfg, Arc::new(RateLimiter::with_system_clock()))
        .unwrap();

    let stranger = Principal::new("stranger");
    assert!(e.authorize(&stranger, &search()).is_allowed());
    // resolve() reports the records only.
    assert!(e.resolve(&stranger).is_err());

    let auth = e.authorize_detailed(&stranger, &search());
    let binding = auth.binding.unwrap();
    assert_eq!(binding.record, None);
    assert_eq!(binding.router, RouterKind::Robot);

    assert_eq!(
        e.authorize(&Principal::new("mallory"), &search()),
        Decision::Deny(DenyReason::RouterDisabled)
    );
}

#[test]
fn invalid_snapshot_keeps_previous_one() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Robot)
            .users(["alice"])
            .params(search_only())],
        RobotRouterParams::default(),
    )
    .unwrap();
    let generation = e.generation();

    let err = e
        .load_snapshot(
            vec![ApiAuthorizationRecord::new(RouterKind::Disabled)],
            RobotRouterParams::default(),
        )
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "INVALID_CONFIG");

    assert_eq!(e.generation(), generation);
    assert!(e.authorize(&Principal::new("alice"), &search()).is_allowed());
}

#[test]
fn reload_from_file_swaps_snapshot() {
    let dir = std::env::temp_dir().join(format!("apigate-engine-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("apigate.yaml");
    let path_str = path.to_str().unwrap().to_string();

    let write = |body: &str| {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    };

    write(
        r#"
version: 1
authorizations:
  - router: robot
    users: [alice]
    router_params:
      search_clients: { enabled: true }
"#,
    );
    let e = engine();
    e.reload_from_file(&path_str).unwrap();
    assert_eq!(e.generation(), 1);
    assert!(e.authorize(&Principal::new("alice"), &search()).is_allowed());

    write(
        r#"
version: 1
authorizations:
  - router: disabled
    users: [alice]
"#,
    );
    e.reload_from_file(&path_str).unwrap();
    assert_eq!(e.generation(), 2);
    assert_eq!(
        e.authorize(&Principal::new("alice"), &search()),
        Decision::Deny(DenyReason::RouterDisabled)
    );

    write("version: 1\nauthorizations: [ { router: nope, users: [alice] } ]\n");
    assert!(e.reload_from_file(&path_str).is_err());
    assert_eq!(e.generation(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn rate_limit_state_survives_reload() {
    let e = engine();
    let params = RobotRouterParams {
        file_finder_flow: Some(FileFinderFlowParams {
            enabled: true,
            max_flows_per_client_daily: 1,
            ..FileFinderFlowParams::default()
        }),
        ..RobotRouterParams::default()
    };
    let records = || {
        vec![ApiAuthorizationRecord::new(RouterKind::Robot)
            .users(["svc"])
            .params(params.clone())]
    };
    let svc = Principal::new("svc");
    let ff = json!({ "client_id": "C.1", "paths": ["/etc/hosts"] });

    e.load_snapshot(records(), RobotRouterParams::default()).unwrap();
    assert!(e.authorize_raw(&svc, "file_finder_flow", ff.clone()).unwrap().is_allowed());

    e.load_snapshot(records(), RobotRouterParams::default()).unwrap();
    assert_eq!(
        e.authorize_raw(&svc, "file_finder_flow", ff).unwrap(),
        Decision::Deny(DenyReason::DailyQuotaExceeded)
    );
}

#[test]
fn authorize_raw_unknown_action_and_bad_args() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Robot)
            .users(["svc"])
            .params(search_only())],
        RobotRouterParams::default(),
    )
    .unwrap();
    let svc = Principal::new("svc");

    assert_eq!(
        e.authorize_raw(&svc, "delete_client", json!({})).unwrap(),
        Decision::Deny(DenyReason::ActionDisabled)
    );
    assert_eq!(
        e.authorize_raw(&Principal::new("nobody"), "delete_client", json!({}))
            .unwrap(),
        Decision::Deny(DenyReason::NoMatchingRouter)
    );

    let err = e
        .authorize_raw(&svc, "search_clients", json!({ "query": "x", "limit": 5 }))
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn register_flow_tags_robot_id() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Robot)
            .users(["svc"])
            .params(RobotRouterParams {
                robot_id: Some("fleet-bot".into()),
                get_flow: Some(SimpleActionParams { enabled: true }),
                file_finder_flow: Some(FileFinderFlowParams {
                    enabled: true,
                    ..FileFinderFlowParams::default()
                }),
                ..RobotRouterParams::default()
            })],
        RobotRouterParams::default(),
    )
    .unwrap();
    let svc = Principal::new("svc");
    let get_flow = json!({ "client_id": "C.1", "flow_id": "F:1" });

    assert_eq!(
        e.authorize_raw(&svc, "get_flow", get_flow.clone()).unwrap(),
        Decision::Deny(DenyReason::FlowNotOwned)
    );

    let rec = e.register_flow(&svc, "C.1", "F:1", "FileFinder").unwrap();
    assert_eq!(rec.robot_id.as_deref(), Some("fleet-bot"));
    assert_eq!(e.ledger().len(), 1);
    assert!(e.authorize_raw(&svc, "get_flow", get_flow).unwrap().is_allowed());

    assert!(e.register_flow(&svc, "C.1", " ", "FileFinder").is_err());
    assert!(e
        .register_flow(&Principal::new("nobody"), "C.1", "F:2", "FileFinder")
        .is_err());
}

#[test]
fn robot_group_member_file_finder_globs() {
    let e = engine();
    e.load_snapshot(
        vec![ApiAuthorizationRecord::new(RouterKind::Robot)
            .groups(["robots"])
            .params(RobotRouterParams {
                file_finder_flow: Some(FileFinderFlowParams {
                    enabled: true,
                    globs_allowed: false,
                    ..FileFinderFlowParams::default()
                }),
                ..RobotRouterParams::default()
            })],
        RobotRouterParams::default(),
    )
    .unwrap();
    let alice = Principal::new("alice").with_groups(["robots"]);

    let ff = |path: &str| {
        e.authorize_raw(&alice, "file_finder_flow", json!({ "client_id": "C.1", "paths": [path] }))
            .unwrap()
    };

    assert_eq!(
        ff("/home/*/.bash_history"),
        Decision::Deny(DenyReason::GlobsNotAllowed)
    );
    assert!(ff("/home/alice/.bash_history").is_allowed());
}

fn fleet(robot_id: &str, group: &str) -> ApiAuthorizationRecord {
    ApiAuthorizationRecord::new(RouterKind::Robot)
        .groups([group])
        .params(RobotRouterParams {
            robot_id: Some(robot_id.into()),
            get_flow: Some(SimpleActionParams { enabled: true }),
            file_finder_flow: Some(FileFinderFlowParams {
                enabled: true,
                ..FileFinderFlowParams::default()
            }),
            ..RobotRouterParams::default()
        })
}

#[test]
fn registered_flow_cannot_be_taken_over_by_another_robot() {
    let e = engine();
    e.load_snapshot(
        vec![fleet("bot-a", "team-a"), fleet("bot-b", "team-b")],
        RobotRouterParams::default(),
    )
    .unwrap();
    let a = Principal::new("svc-a").with_groups(["team-a"]);
    let b = Principal::new("svc-b").with_groups(["team-b"]);
    let get_flow = json!({ "client_id": "C.1", "flow_id": "F:1" });

    e.register_flow(&b, "C.1", "F:1", "FileFinder").unwrap();

    let err = e.register_flow(&a, "C.1", "F:1", "FileFinder").unwrap_err();
    assert_eq!(err.client_code().as_str(), "NOT_ALLOWED");
    assert_eq!(
        e.authorize_raw(&a, "get_flow", get_flow.clone()).unwrap(),
        Decision::Deny(DenyReason::FlowNotOwned)
    );
    assert!(e.authorize_raw(&b, "get_flow", get_flow).unwrap().is_allowed());
    assert_eq!(e.ledger().get("C.1", "F:1").unwrap().robot_id.as_deref(), Some("bot-b"));

    // Repeating the owner's own registration is harmless.
    e.register_flow(&b, "C.1", "F:1", "FileFinder").unwrap();
    assert_eq!(e.ledger().len(), 1);
}

#[test]
fn register_flow_checks_flow_kind_against_router() {
    let e = engine();
    e.load_snapshot(
        vec![
            fleet("bot-a", "team-a"),
            ApiAuthorizationRecord::new(RouterKind::Disabled).users(["mallory"]),
            ApiAuthorizationRecord::new(RouterKind::Unrestricted).groups(["admins"]),
        ],
        RobotRouterParams::default(),
    )
    .unwrap();
    let a = Principal::new("svc-a").with_groups(["team-a"]);

    // No artifact collector configured for this robot.
    let err = e
        .register_flow(&a, "C.1", "F:1", "ArtifactCollectorFlow")
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "NOT_ALLOWED");
    assert!(e.register_flow(&a, "C.1", "F:1", "Bogus").is_err());
    assert!(e.ledger().is_empty());

    assert!(e
        .register_flow(&Principal::new("mallory"), "C.1", "F:2", "FileFinder")
        .is_err());

    let root = Principal::new("root").with_groups(["admins"]);
    let rec = e
        .register_flow(&root, "C.1", "F:3", "ArtifactCollectorFlow")
        .unwrap();
    assert_eq!(rec.robot_id, None);
}
