//! Registered maintenance scripts run against servers.

use std::time::{Duration, Instant};

use opsdeck::store::Store;
use opsdeck::{
    AuditAction, AuditOutcome, AuditQuery, ConsoleConfig, ConsoleError, ResourceType, Role,
    Server, ServerId,
};
use opsdeck_testkit::{ctx, sh_script, TestConsole};

async fn with_server(t: &TestConsole) -> Server {
    t.console
        .create_server(&ctx(Role::Admin), "web", "10.0.0.5")
        .await
        .unwrap()
}

async fn script_entries(t: &TestConsole) -> Vec<opsdeck::AuditLogEntry> {
    t.store
        .inner()
        .query_audit(&AuditQuery::all().action(AuditAction::Script))
        .await
        .unwrap()
}

#[tokio::test]
async fn registered_script_runs_and_is_audited() {
    let t = TestConsole::with_scripts([("restartApp", sh_script("echo restarted"))]);
    let server = with_server(&t).await;
    let manager = ctx(Role::SystemManager);

    let out = t
        .console
        .run_script(&manager, &server.id, "restartApp")
        .await
        .unwrap();
    assert_eq!(out.key, "restartApp");
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.output.trim(), "restarted");
    assert_eq!(t.spawner.spawned(), 1);

    let entries = script_entries(&t).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.outcome, AuditOutcome::Success);
    assert_eq!(entry.resource_type, ResourceType::Server);
    assert_eq!(entry.resource_id, server.id.to_string());
    assert_eq!(entry.actor_id, manager.actor().id);
    assert_eq!(entry.detail["script"], "restartApp");
    assert_eq!(entry.detail["exit_code"], 0);
    assert_eq!(entry.detail["output"].as_str().map(str::trim), Some("restarted"));
}

#[tokio::test]
async fn unknown_script_spawns_nothing_and_records_nothing() {
    let t = TestConsole::with_scripts([("restartApp", sh_script("true"))]);
    let server = with_server(&t).await;
    let appends_before = t.store.audit_appends();

    let err = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "rm -rf /")
        .await
        .unwrap_err();
    match err {
        ConsoleError::UnknownScript(key) => assert_eq!(key, "rm -rf /"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(t.spawner.spawned(), 0);
    assert_eq!(t.store.audit_appends(), appends_before);
}

#[tokio::test]
async fn technical_support_cannot_run_scripts() {
    let t = TestConsole::with_scripts([("restartApp", sh_script("true"))]);
    let server = with_server(&t).await;

    let err = t
        .console
        .run_script(&ctx(Role::TechnicalSupport), &server.id, "restartApp")
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Forbidden));
    assert_eq!(t.spawner.spawned(), 0);
    assert!(script_entries(&t).await.is_empty());
}

#[tokio::test]
async fn failing_script_is_reported_and_audited() {
    let t = TestConsole::with_scripts([("clearCache", sh_script("echo disk full >&2; exit 4"))]);
    let server = with_server(&t).await;

    let err = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "clearCache")
        .await
        .unwrap_err();
    match err {
        ConsoleError::ScriptExecution {
            key,
            exit_code,
            output,
        } => {
            assert_eq!(key, "clearCache");
            assert_eq!(exit_code, Some(4));
            assert!(output.contains("disk full"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let entries = script_entries(&t).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Failure);
    assert_eq!(entries[0].detail["exit_code"], 4);
}

#[tokio::test]
async fn exit_status_one_is_a_script_execution_error() {
    let t = TestConsole::with_scripts([("checkDisk", sh_script("exit 1"))]);
    let server = with_server(&t).await;

    let err = t
        .console
        .run_script(&ctx(Role::SystemManager), &server.id, "checkDisk")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::ScriptExecution {
            exit_code: Some(1),
            ..
        }
    ));

    let entries = script_entries(&t).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Failure);
    assert_eq!(entries[0].detail["exit_code"], 1);
}

#[tokio::test]
async fn slow_script_is_killed_at_the_timeout() {
    let config = ConsoleConfig {
        scripts: [("hang".to_string(), sh_script("echo started; sleep 30"))]
            .into_iter()
            .collect(),
        script_timeout_secs: 1,
        ..ConsoleConfig::default()
    };
    let t = TestConsole::with_config(config);
    let server = with_server(&t).await;

    let started = Instant::now();
    let err = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "hang")
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));

    match err {
        ConsoleError::ScriptTimeout { key, timeout, .. } => {
            assert_eq!(key, "hang");
            assert_eq!(timeout, Duration::from_secs(1));
        }
        other => panic!("unexpected error: {other}"),
    }

    let entries = script_entries(&t).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Failure);
    assert_eq!(entries[0].detail["timed_out"], true);
}

#[tokio::test]
async fn script_for_missing_server_is_not_found() {
    let t = TestConsole::with_scripts([("restartApp", sh_script("true"))]);
    let err = t
        .console
        .run_script(&ctx(Role::Admin), &ServerId::generate(), "restartApp")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::NotFound {
            resource_type: ResourceType::Server,
            ..
        }
    ));
    assert_eq!(t.spawner.spawned(), 0);
}

#[tokio::test]
async fn audit_failure_after_a_run_keeps_the_run_result() {
    let t = TestConsole::with_scripts([("restartApp", sh_script("echo restarted"))]);
    let server = with_server(&t).await;

    t.store.fail_audit_writes(true);
    let err = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "restartApp")
        .await
        .unwrap_err();
    match err {
        ConsoleError::ScriptAuditWrite { key, run, .. } => {
            assert_eq!(key, "restartApp");
            let out = run.unwrap();
            assert_eq!(out.exit_code, 0);
            assert_eq!(out.output.trim(), "restarted");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(t.spawner.spawned(), 1);
}

#[tokio::test]
async fn audit_failure_after_a_failed_run_keeps_the_captured_output() {
    let t = TestConsole::with_scripts([("clearCache", sh_script("echo disk full >&2; exit 4"))]);
    let server = with_server(&t).await;

    t.store.fail_audit_writes(true);
    let err = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "clearCache")
        .await
        .unwrap_err();
    let ConsoleError::ScriptAuditWrite { run, .. } = err else {
        panic!("unexpected error: {err}");
    };
    match *run {
        Err(ConsoleError::ScriptExecution {
            exit_code, output, ..
        }) => {
            assert_eq!(exit_code, Some(4));
            assert!(output.contains("disk full"));
        }
        other => panic!("unexpected run result: {other:?}"),
    }
}

#[tokio::test]
async fn audited_output_is_bounded() {
    let config = ConsoleConfig {
        scripts: [(
            "dumpLogs".to_string(),
            sh_script("i=0; while [ $i -lt 200 ]; do echo 0123456789; i=$((i+1)); done"),
        )]
        .into_iter()
        .collect(),
        audit_output_limit: 64,
        ..ConsoleConfig::default()
    };
    let t = TestConsole::with_config(config);
    let server = with_server(&t).await;

    let out = t
        .console
        .run_script(&ctx(Role::Admin), &server.id, "dumpLogs")
        .await
        .unwrap();
    assert_eq!(out.output.len(), 200 * 11);
    assert!(!out.truncated);

    let entries = script_entries(&t).await;
    let recorded = entries[0].detail["output"].as_str().unwrap();
    assert!(recorded.len() <= 64);
    assert_eq!(entries[0].detail["truncated"], true);
}

#[tokio::test]
async fn scripts_are_listed_by_key_only() {
    let t = TestConsole::with_scripts([
        ("restartApp", sh_script("true")),
        ("clearCache", sh_script("true")),
    ]);
    let mut keys: Vec<_> = t.console.config().scripts.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["clearCache", "restartApp"]);
    assert!(t.console.config().cipher_key.is_empty());
}
