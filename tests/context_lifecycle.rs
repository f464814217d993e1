//! Context lifecycle tests against fake `dev_appserver.py` scripts.
//!
//! The fakes imitate the emulator's startup behaviour on stderr:
//! - `READY_SCRIPT` -- prints the readiness marker and idles
//! - `READY_PIDFILE_SCRIPT` -- same, and records its pid
//! - `SILENT_PIDFILE_SCRIPT` -- never becomes ready, records its pid
//! - `CRASHING_SCRIPT` -- exits before becoming ready

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use aetest::proxy::META_SERVICE;
use aetest::testing::{
    CRASHING_SCRIPT, READY_PIDFILE_SCRIPT, READY_SCRIPT, SILENT_PIDFILE_SCRIPT, fake_appserver,
    init_tracing, read_pidfile, wait_for_exit,
};
use aetest::{CallError, Context, Error, LogLevel, Options, SidecarError, StringProto, VoidProto};

fn ready_options(dir: &TempDir) -> Options {
    Options::new().appserver_path(fake_appserver(dir.path(), READY_SCRIPT))
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_queues_are_declared_and_workspace_removed_on_close() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(ready_options(&dir).task_queues(["a", "b"]))
        .await
        .expect("context should start");

    assert!(ctx.is_running());
    let workspace: PathBuf = ctx.workspace_path().unwrap().to_path_buf();
    assert!(workspace.join("app.yaml").is_file());
    assert!(workspace.join("helper").join("helper.go").is_file());

    let queue_yaml = std::fs::read_to_string(workspace.join("queue.yaml")).unwrap();
    let parsed: serde_yml::Value = serde_yml::from_str(&queue_yaml).unwrap();
    let queues = parsed["queue"].as_sequence().unwrap();
    let names: Vec<&str> = queues.iter().map(|q| q["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a", "b"]);
    for queue in queues {
        assert_eq!(queue["rate"].as_str(), Some("35/s"));
    }

    ctx.close();
    assert!(!workspace.exists());
    assert!(ctx.workspace_path().is_none());
    assert!(!ctx.is_running());

    // Second close is a no-op.
    ctx.close();
}

#[tokio::test]
async fn test_no_queue_descriptor_without_queues() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(ready_options(&dir)).await.unwrap();

    let workspace = ctx.workspace_path().unwrap();
    assert!(!workspace.join("queue.yaml").exists());

    let app_yaml = std::fs::read_to_string(workspace.join("app.yaml")).unwrap();
    let parsed: serde_yml::Value = serde_yml::from_str(&app_yaml).unwrap();
    assert_eq!(parsed["application"].as_str(), Some("testapp"));
    assert_eq!(parsed["api_version"].as_str(), Some("go1"));
}

#[tokio::test]
async fn test_invalid_appserver_path_is_launch_failure() {
    let root = tempfile::tempdir().unwrap();
    let err = Context::new(
        Options::new()
            .appserver_path("/definitely/not/dev_appserver.py")
            .workspace_root(root.path()),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Error::Sidecar(SidecarError::LaunchFailed { .. })),
        "unexpected error: {err:?}"
    );
    assert_eq!(entries(root.path()), 0, "workspace left behind");
}

#[tokio::test]
async fn test_silent_sidecar_times_out_and_is_killed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let exe = fake_appserver(dir.path(), SILENT_PIDFILE_SCRIPT);

    let started = Instant::now();
    let err = Context::new(
        Options::new()
            .appserver_path(exe)
            .workspace_root(root.path())
            .startup_timeout(Duration::from_millis(500)),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Error::Sidecar(SidecarError::ReadinessTimeout { .. })),
        "unexpected error: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(5));

    let pid = read_pidfile(dir.path());
    assert!(
        wait_for_exit(pid, Duration::from_secs(5)).await,
        "sidecar {pid} is still running"
    );
    assert_eq!(entries(root.path()), 0, "workspace left behind");
}

#[tokio::test]
async fn test_cancelled_creation_leaves_nothing_running() {
    let dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let exe = fake_appserver(dir.path(), SILENT_PIDFILE_SCRIPT);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(800),
        Context::new(
            Options::new()
                .appserver_path(exe)
                .workspace_root(root.path())
                .startup_timeout(Duration::from_secs(30)),
        ),
    )
    .await;
    assert!(cancelled.is_err(), "creation should still be waiting");

    let pid = read_pidfile(dir.path());
    assert!(
        wait_for_exit(pid, Duration::from_secs(5)).await,
        "sidecar {pid} outlived its cancelled creation"
    );
    assert_eq!(entries(root.path()), 0, "workspace left behind");
}

#[tokio::test]
async fn test_crash_before_ready_is_stream_closed() {
    let dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let err = Context::new(
        Options::new()
            .appserver_path(fake_appserver(dir.path(), CRASHING_SCRIPT))
            .workspace_root(root.path()),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Error::Sidecar(SidecarError::ReadinessStreamClosed(_))),
        "unexpected error: {err:?}"
    );
    assert_eq!(entries(root.path()), 0, "workspace left behind");
}

#[tokio::test]
async fn test_close_terminates_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(
        Options::new()
            .appserver_path(fake_appserver(dir.path(), READY_PIDFILE_SCRIPT))
            .workspace_root(root.path()),
    )
    .await
    .unwrap();

    let pid = read_pidfile(dir.path());
    assert_eq!(ctx.pid(), Some(pid));
    assert_eq!(entries(root.path()), 2);

    ctx.close();

    assert!(ctx.pid().is_none());
    assert!(
        wait_for_exit(pid, Duration::from_secs(5)).await,
        "sidecar {pid} survived close()"
    );
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_meta_queries_are_answered_locally() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(ready_options(&dir)).await.unwrap();

    let mut ns = StringProto::default();
    ctx.call(META_SERVICE, "GetNamespace", &mut VoidProto {}, &mut ns)
        .await
        .unwrap();
    assert_eq!(ns.value.as_deref(), Some(""));

    ctx.set_namespace("tenant-a");
    ctx.call(META_SERVICE, "GetNamespace", &mut VoidProto {}, &mut ns)
        .await
        .unwrap();
    assert_eq!(ns.value.as_deref(), Some("tenant-a"));

    ctx.set_namespace("");
    assert_eq!(ctx.namespace(), "");
}

#[tokio::test]
async fn test_remote_call_without_listener_is_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(ready_options(&dir)).await.unwrap();

    // The fake never binds its port, so the round trip cannot connect.
    let err = ctx
        .call("memcache", "Get", &mut VoidProto {}, &mut VoidProto {})
        .await
        .unwrap_err();

    match err {
        Error::Call(CallError::Transport {
            service, method, ..
        }) => {
            assert_eq!(service, "memcache");
            assert_eq!(method, "Get");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_login_and_logout() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(ready_options(&dir).app_id("myapp"))
        .await
        .unwrap();

    assert_eq!(ctx.app_id(), "myapp");
    assert_eq!(ctx.fully_qualified_app_id(), "dev~myapp");
    assert!(ctx.current_user().is_none());

    ctx.login("admin@example.com", true);
    let user = ctx.current_user().unwrap();
    assert_eq!(user.email, "admin@example.com");
    assert_eq!(user.id, aetest::derive_user_id("admin@example.com"));
    assert!(user.admin);

    ctx.login("other@example.com", false);
    let user = ctx.current_user().unwrap();
    assert_eq!(user.email, "other@example.com");
    assert!(!user.admin);

    ctx.logout();
    assert!(ctx.current_user().is_none());
}

#[tokio::test]
async fn test_contexts_coexist() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let mut first = Context::new(ready_options(&first_dir)).await.unwrap();
    let mut second = Context::new(ready_options(&second_dir)).await.unwrap();

    assert_ne!(first.port(), second.port());
    assert_ne!(first.port(), first.admin_port());
    assert_ne!(first.workspace_path(), second.workspace_path());

    first.set_namespace("one");
    assert_eq!(second.namespace(), "");

    first.close();
    assert!(second.is_running());
    second.close();
}

#[tokio::test]
async fn test_drop_cleans_up_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(ready_options(&dir).log_level(LogLevel::Child))
        .await
        .unwrap();
    let workspace = ctx.workspace_path().unwrap().to_path_buf();

    ctx.info("about to drop");
    drop(ctx);

    assert!(!workspace.exists());
}
