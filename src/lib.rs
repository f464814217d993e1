//! Run App Engine API calls in tests against a local `dev_appserver.py`.
//!
//! A [`Context`] owns one emulator process, a throwaway application
//! workspace, and the per-test session (namespace and signed-in user). Calls
//! made through it are encoded with `prost`, shipped to the emulator over
//! loopback HTTP and decoded back.
//!
//! ```rust,no_run
//! use aetest::{Context, Options, StringProto, VoidProto};
//!
//! # async fn example() -> aetest::Result<()> {
//! let mut ctx = Context::new(Options::new().task_queues(["default"])).await?;
//! ctx.login("test@example.com", true);
//! ctx.set_namespace("scratch");
//!
//! let mut ns = StringProto::default();
//! ctx.call("__go__", "GetNamespace", &mut VoidProto {}, &mut ns)
//!     .await?;
//! assert_eq!(ns.value.as_deref(), Some("scratch"));
//!
//! ctx.close();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod proxy;
pub mod session;
pub mod sidecar;
pub mod testing;

pub use config::Options;
pub use context::Context;
pub use error::{ConfigError, Error, Result};
pub use message::{StringProto, VoidProto};
pub use proxy::{CallError, NamespaceMod, NamespaceMods, Route};
pub use session::{SessionKey, SessionState, User, derive_user_id};
pub use sidecar::{LogLevel, SidecarError};
