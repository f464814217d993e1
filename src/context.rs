//! The per-test context: one emulator, one workspace, one session.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use prost::Message;

use crate::config::{Options, ResolvedOptions};
use crate::error::Result;
use crate::proxy::{CallProxy, HttpTransport, NamespaceMods, Transport};
use crate::session::{SessionState, User};
use crate::sidecar::{
    LaunchSpec, LogLevel, SidecarEndpoint, SidecarManager, Workspace, WorkspaceSpec, locate, port,
};

/// A running emulator scoped to one test.
///
/// Created with [`Context::new`], torn down with [`Context::close`] (or on
/// drop). Several contexts can coexist; each owns its ports, workspace and
/// session.
pub struct Context {
    app_id: String,
    log_level: LogLevel,
    session: SessionState,
    supervisor: SidecarManager,
    workspace: Option<Workspace>,
    endpoint: SidecarEndpoint,
    proxy: CallProxy,
}

impl Context {
    /// Start an emulator and wait until it accepts calls.
    ///
    /// Fails on the first error; whatever was acquired up to that point is
    /// released before returning.
    pub async fn new(options: Options) -> Result<Self> {
        let options = options.resolve()?;
        let session = SessionState::new();

        let workspace = Workspace::create(&WorkspaceSpec {
            app_id: &options.app_id,
            api_version: &options.api_version,
            queues: &options.task_queues,
            root: options.workspace_root.as_deref(),
        })?;

        let mut supervisor = SidecarManager::new();
        let endpoint = match launch(&mut supervisor, &workspace, &options).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                supervisor.stop();
                workspace.destroy();
                return Err(e);
            }
        };

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&endpoint));
        let proxy = CallProxy::new(transport).with_trace_calls(options.trace_calls);

        tracing::debug!(
            "Context for '{}' ready at {} (workspace {})",
            options.app_id,
            endpoint,
            workspace.app_dir().display()
        );

        Ok(Self {
            app_id: options.app_id,
            log_level: options.log_level,
            session,
            supervisor,
            workspace: Some(workspace),
            endpoint,
            proxy,
        })
    }

    /// Perform one service call.
    ///
    /// Meta-queries about the namespace are answered locally. Everything else
    /// goes to the emulator with the session headers attached. On success
    /// `response` holds the decoded reply.
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &mut Req,
        response: &mut Resp,
    ) -> Result<()>
    where
        Req: Message + Any,
        Resp: Message + Default,
    {
        self.proxy
            .call(&self.session, service, method, request, response)
            .await?;
        Ok(())
    }

    /// Stop the emulator and delete the workspace.
    ///
    /// Never fails. Calling it again does nothing.
    pub fn close(&mut self) {
        self.supervisor.stop();
        if let Some(workspace) = self.workspace.take() {
            tracing::debug!("Closing context for '{}'", self.app_id);
            workspace.destroy();
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The id the emulator reports for this app, `dev~<app id>`.
    pub fn fully_qualified_app_id(&self) -> String {
        format!("dev~{}", self.app_id)
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    pub fn admin_port(&self) -> u16 {
        self.endpoint.admin_port
    }

    pub fn endpoint(&self) -> &SidecarEndpoint {
        &self.endpoint
    }

    /// Application directory, until the context is closed.
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::app_dir)
    }

    /// OS process id of the emulator, while it runs.
    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Whether the emulator is still running.
    pub fn is_running(&self) -> bool {
        self.supervisor.is_ready()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Per-service hooks that stamp the current namespace into requests.
    pub fn namespace_mods_mut(&mut self) -> &mut NamespaceMods {
        self.proxy.namespace_mods_mut()
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.session.set_namespace(namespace);
    }

    pub fn namespace(&self) -> &str {
        self.session.namespace()
    }

    pub fn login(&mut self, email: &str, admin: bool) {
        self.session.login(email, admin);
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Emit an application log line if the context's verbosity allows it.
    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.log_level.allows(level) {
            return;
        }
        match level {
            LogLevel::Child | LogLevel::Debug => {
                tracing::debug!(target: "aetest::app", app = %self.app_id, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(target: "aetest::app", app = %self.app_id, "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(target: "aetest::app", app = %self.app_id, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(target: "aetest::app", app = %self.app_id, "{}", message)
            }
            LogLevel::Critical => tracing::error!(
                target: "aetest::app",
                app = %self.app_id,
                critical = true,
                "{}",
                message
            ),
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("app_id", &self.app_id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.supervisor.state())
            .field("workspace", &self.workspace_path())
            .finish()
    }
}

async fn launch(
    supervisor: &mut SidecarManager,
    workspace: &Workspace,
    options: &ResolvedOptions,
) -> Result<SidecarEndpoint> {
    let (port, admin_port) = port::reserve_pair()?;
    let executable = locate::find_appserver(options.appserver_path.as_deref())?;

    let spec = LaunchSpec {
        executable,
        app_dir: workspace.app_dir().to_path_buf(),
        storage_dir: workspace.storage_dir().to_path_buf(),
        port,
        admin_port,
        log_level: options.log_level,
        startup_timeout: options.startup_timeout,
    };
    Ok(supervisor.start(&spec).await?)
}
