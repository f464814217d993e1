//! Local emulator sidecar management.
//!
//! Provides the pieces needed to run one `dev_appserver.py` per test context:
//! - ephemeral port allocation
//! - a temporary application workspace with generated descriptors
//! - executable discovery
//! - process launch, readiness detection and termination
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SidecarManager::start                          │
//! │                                                                          │
//! │   ┌──────────────┐     ┌──────────────┐     ┌────────────────────────┐   │
//! │   │ Spawn child  │────▶│ stderr task  │────▶│ marker seen? ─▶ ready  │   │
//! │   │ (stderr pipe)│     │ (line reader)│     │ EOF / error ─▶ closed  │   │
//! │   └──────────────┘     └──────────────┘     └────────────────────────┘   │
//! │                                                      │                   │
//! │                               tokio::select! ◀───────┘                   │
//! │                                   │                                      │
//! │                      deadline ────┴──▶ kill child, ReadinessTimeout      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use aetest::sidecar::{
//!     DEFAULT_STARTUP_TIMEOUT, LaunchSpec, LogLevel, SidecarManager, Workspace, WorkspaceSpec,
//!     locate, port,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workspace = Workspace::create(&WorkspaceSpec {
//!     app_id: "testapp",
//!     api_version: "go1",
//!     queues: &[],
//!     root: None,
//! })?;
//! let (port, admin_port) = port::reserve_pair()?;
//!
//! let mut manager = SidecarManager::new();
//! let endpoint = manager
//!     .start(&LaunchSpec {
//!         executable: locate::find_appserver(None)?,
//!         app_dir: workspace.app_dir().to_path_buf(),
//!         storage_dir: workspace.storage_dir().to_path_buf(),
//!         port,
//!         admin_port,
//!         log_level: LogLevel::Error,
//!         startup_timeout: DEFAULT_STARTUP_TIMEOUT,
//!     })
//!     .await?;
//! println!("Sidecar available at: {}", endpoint.http_url());
//!
//! manager.stop();
//! workspace.destroy();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod locate;
pub mod manager;
pub mod port;
pub mod workspace;

pub use config::{
    APPSERVER_FILE_NAME, DEFAULT_STARTUP_TIMEOUT, LaunchSpec, LogLevel, READINESS_MARKER,
    SidecarEndpoint,
};
pub use error::{Result, SidecarError};
pub use manager::{SidecarManager, SidecarState};
pub use workspace::{Workspace, WorkspaceSpec};
