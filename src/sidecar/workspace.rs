//! Temporary application tree handed to the emulator.
//!
//! ```text
//! <app_dir>/
//!   app.yaml            application descriptor
//!   queue.yaml          only when queues were requested
//!   helper/helper.go    placeholder payload
//! <storage_dir>/        emulator datastore, blobstore, ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

use crate::sidecar::error::{Result, SidecarError};

/// Processing rate written for every generated queue.
pub const QUEUE_RATE: &str = "35/s";

const QUEUE_STORAGE_LIMIT: &str = "120M";

const HELPER_SOURCE: &str = r#"package helper

import "net/http"

func init() {
	http.HandleFunc("/", func(w http.ResponseWriter, r *http.Request) {})
}
"#;

/// Parameters rendered into the generated descriptors.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceSpec<'a> {
    pub app_id: &'a str,
    pub api_version: &'a str,
    pub queues: &'a [String],
    /// Parent directory for both temp dirs. Defaults to the system temp dir.
    pub root: Option<&'a Path>,
}

#[derive(Serialize)]
struct AppDescriptor<'a> {
    application: &'a str,
    version: u32,
    runtime: &'a str,
    api_version: &'a str,
    handlers: Vec<Handler<'a>>,
}

#[derive(Serialize)]
struct Handler<'a> {
    url: &'a str,
    script: &'a str,
}

#[derive(Serialize)]
struct QueueDescriptor<'a> {
    total_storage_limit: &'a str,
    queue: Vec<QueueEntry<'a>>,
}

#[derive(Serialize)]
struct QueueEntry<'a> {
    name: &'a str,
    rate: &'a str,
}

/// Owned temporary directories for one sidecar instance.
///
/// Both directories are removed by [`Workspace::destroy`], or on drop if the
/// workspace is never destroyed explicitly.
#[derive(Debug)]
pub struct Workspace {
    app_dir: TempDir,
    storage_dir: TempDir,
}

impl Workspace {
    /// Create the directories and write every generated file.
    pub fn create(spec: &WorkspaceSpec<'_>) -> Result<Self> {
        let parent = spec
            .root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let app_dir = tempfile::Builder::new()
            .prefix("aetest-app-")
            .tempdir_in(&parent)
            .map_err(|e| SidecarError::workspace(&parent, e))?;
        let storage_dir = tempfile::Builder::new()
            .prefix("aetest-storage-")
            .tempdir_in(&parent)
            .map_err(|e| SidecarError::workspace(&parent, e))?;

        let root = app_dir.path();

        let helper_dir = root.join("helper");
        fs::create_dir(&helper_dir).map_err(|e| SidecarError::workspace(&helper_dir, e))?;
        write_file(&helper_dir.join("helper.go"), HELPER_SOURCE)?;

        let app_yaml = render_app_descriptor(spec.app_id, spec.api_version)
            .map_err(|e| SidecarError::workspace(root.join("app.yaml"), e))?;
        write_file(&root.join("app.yaml"), &app_yaml)?;

        if !spec.queues.is_empty() {
            let queue_yaml = render_queue_descriptor(spec.queues)
                .map_err(|e| SidecarError::workspace(root.join("queue.yaml"), e))?;
            write_file(&root.join("queue.yaml"), &queue_yaml)?;
        }

        tracing::debug!(
            "Created sidecar workspace at {} (storage {})",
            root.display(),
            storage_dir.path().display()
        );

        Ok(Self {
            app_dir,
            storage_dir,
        })
    }

    /// Application directory passed to the emulator.
    pub fn app_dir(&self) -> &Path {
        self.app_dir.path()
    }

    /// Storage directory passed to the emulator.
    pub fn storage_dir(&self) -> &Path {
        self.storage_dir.path()
    }

    /// Remove both directories. Failures are logged, never returned.
    pub fn destroy(self) {
        let Self {
            app_dir,
            storage_dir,
        } = self;
        for dir in [app_dir, storage_dir] {
            let path: PathBuf = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove workspace {}: {}", path.display(), e);
            }
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| SidecarError::workspace(path, e))
}

fn render_app_descriptor(app_id: &str, api_version: &str) -> std::io::Result<String> {
    let descriptor = AppDescriptor {
        application: app_id,
        version: 1,
        runtime: "go",
        api_version,
        handlers: vec![Handler {
            url: "/.*",
            script: "_go_app",
        }],
    };
    serde_yml::to_string(&descriptor).map_err(std::io::Error::other)
}

fn render_queue_descriptor(queues: &[String]) -> std::io::Result<String> {
    let descriptor = QueueDescriptor {
        total_storage_limit: QUEUE_STORAGE_LIMIT,
        queue: queues
            .iter()
            .map(|name| QueueEntry {
                name,
                rate: QUEUE_RATE,
            })
            .collect(),
    };
    serde_yml::to_string(&descriptor).map_err(std::io::Error::other)
}
