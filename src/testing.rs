//! Test doubles for exercising contexts without a real emulator.
//!
//! Provides:
//! - [`CountingTransport`]: a [`Transport`] that records calls and returns a
//!   fixed reply or a fixed failure
//! - [`fake_appserver`] plus script bodies that imitate the emulator's
//!   startup behaviour (Unix only)
//! - [`init_tracing`]: a test-friendly subscriber
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use aetest::proxy::{CallProxy, Transport};
//! use aetest::testing::CountingTransport;
//!
//! let transport = Arc::new(CountingTransport::new(Vec::new()));
//! let proxy = CallProxy::new(transport.clone() as Arc<dyn Transport>);
//! assert_eq!(transport.calls(), 0);
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::proxy::error::{CallError, Result};
use crate::proxy::Transport;

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honours `RUST_LOG`, defaulting to `aetest=debug`. Safe to call from many
/// tests.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aetest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// One call seen by a [`CountingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: String,
    pub method: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// A transport stub for tests.
///
/// Counts and records every round trip. Replies with the configured bytes,
/// or with a [`CallError::NonOkStatus`] when built with
/// [`failing()`](Self::failing).
pub struct CountingTransport {
    reply: Vec<u8>,
    failure: Option<(u16, String)>,
    call_count: AtomicU32,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl CountingTransport {
    /// Create a stub that answers every call with `reply`.
    pub fn new(reply: Vec<u8>) -> Self {
        Self {
            reply,
            failure: None,
            call_count: AtomicU32::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Create a stub that answers every call with an HTTP error.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self {
            reply: Vec::new(),
            failure: Some((status, body.into())),
            call_count: AtomicU32::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Number of round trips attempted.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The most recent round trip, if any.
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.recorded
            .lock()
            .ok()
            .and_then(|calls| calls.last().cloned())
    }
}

impl Default for CountingTransport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn round_trip(
        &self,
        service: &str,
        method: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut calls) = self.recorded.lock() {
            calls.push(RecordedCall {
                service: service.to_string(),
                method: method.to_string(),
                headers,
                body,
            });
        }

        match &self.failure {
            Some((status, body)) => Err(CallError::NonOkStatus {
                service: service.to_string(),
                method: method.to_string(),
                status: *status,
                body: body.clone(),
            }),
            None => Ok(self.reply.clone()),
        }
    }
}

/// Prints the readiness marker, then idles like a running emulator.
pub const READY_SCRIPT: &str = r#"#!/bin/sh
echo "INFO booting fake appserver" >&2
echo "INFO Starting admin server at: http://localhost:8000" >&2
exec sleep 30
"#;

/// Never becomes ready.
pub const SILENT_SCRIPT: &str = r#"#!/bin/sh
exec sleep 30
"#;

/// Exits before becoming ready.
pub const CRASHING_SCRIPT: &str = r#"#!/bin/sh
echo "ERROR could not bind" >&2
exit 1
"#;

/// Never becomes ready and writes its pid to `fake.pid` next to itself.
pub const SILENT_PIDFILE_SCRIPT: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/fake.pid"
exec sleep 30
"#;

/// Prints the readiness marker, writes its pid to `fake.pid` next to itself,
/// then idles.
pub const READY_PIDFILE_SCRIPT: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/fake.pid"
echo "INFO Starting admin server at: http://localhost:8000" >&2
exec sleep 30
"#;

/// Read the pid a `*_PIDFILE_SCRIPT` fake wrote into `dir`.
pub fn read_pidfile(dir: &std::path::Path) -> u32 {
    std::fs::read_to_string(dir.join("fake.pid"))
        .expect("read fake.pid")
        .trim()
        .parse()
        .expect("parse fake.pid")
}

/// Poll until process `pid` no longer exists. Returns `false` if it is still
/// there after `within`.
#[cfg(unix)]
pub async fn wait_for_exit(pid: u32, within: std::time::Duration) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let deadline = tokio::time::Instant::now() + within;
    loop {
        if kill(Pid::from_raw(pid as i32), None).is_err() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
}

/// Write `script` as an executable `dev_appserver.py` inside `dir`.
#[cfg(unix)]
pub fn fake_appserver(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(crate::sidecar::APPSERVER_FILE_NAME);
    {
        let mut file = std::fs::File::create(&path).expect("create fake appserver");
        file.write_all(script.as_bytes())
            .expect("write fake appserver");
        file.sync_all().expect("sync fake appserver");
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake appserver");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_transport_records_calls() {
        let transport = CountingTransport::new(vec![1, 2, 3]);
        let reply = transport
            .round_trip("memcache", "Get", HeaderMap::new(), vec![9])
            .await
            .unwrap();

        assert_eq!(reply, vec![1, 2, 3]);
        assert_eq!(transport.calls(), 1);
        let call = transport.last_call().unwrap();
        assert_eq!(call.service, "memcache");
        assert_eq!(call.body, vec![9]);
    }

    #[tokio::test]
    async fn test_failing_transport() {
        let transport = CountingTransport::failing(503, "unavailable");
        let err = transport
            .round_trip("taskqueue", "Add", HeaderMap::new(), Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::NonOkStatus { status: 503, .. }));
        assert_eq!(transport.calls(), 1);
    }
}
