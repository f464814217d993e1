//! CLI command handling.
//!
//! Provides subcommands for:
//! - Starting an emulator context and holding it open (`start`)
//! - Printing the emulator executable that would be used (`locate`)

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

use crate::config::Options;
use crate::context::Context;
use crate::message::{StringProto, VoidProto};
use crate::proxy::META_SERVICE;
use crate::sidecar::{LogLevel, locate};

#[derive(Parser, Debug)]
#[command(name = "aetest")]
#[command(about = "Run a throwaway App Engine emulator for tests")]
#[command(
    long_about = "aetest starts dev_appserver.py in a temporary workspace.\nExamples:\n  aetest start --queue default  # Start and wait for Ctrl-C\n  aetest locate  # Show which dev_appserver.py would run"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Explicit dev_appserver.py path (skips the search)
    #[arg(long, global = true)]
    pub appserver: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an emulator context and keep it running until Ctrl-C
    Start {
        /// Application id
        #[arg(long)]
        app_id: Option<String>,

        /// Task queue to declare (repeatable)
        #[arg(long = "queue")]
        queues: Vec<String>,

        /// Verbosity: child, debug, info, warning, error, critical
        #[arg(long)]
        log_level: Option<LogLevel>,

        /// Startup deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Sign in as this email
        #[arg(long)]
        login: Option<String>,

        /// Mark the signed-in user as an administrator
        #[arg(long, requires = "login")]
        admin: bool,

        /// Namespace to select
        #[arg(long)]
        namespace: Option<String>,

        /// Stop right after the emulator is ready
        #[arg(long)]
        once: bool,
    },

    /// Print the dev_appserver.py that would be launched
    Locate,
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Locate => {
            let path = locate::find_appserver(cli.appserver.as_deref())?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Start {
            app_id,
            queues,
            log_level,
            timeout_secs,
            login,
            admin,
            namespace,
            once,
        } => {
            let mut options = Options::new().task_queues(queues);
            if let Some(app_id) = app_id {
                options = options.app_id(app_id);
            }
            if let Some(level) = log_level {
                options = options.log_level(level);
            }
            if let Some(secs) = timeout_secs {
                options = options.startup_timeout(std::time::Duration::from_secs(secs));
            }
            if let Some(path) = cli.appserver {
                options = options.appserver_path(path);
            }

            let mut ctx = Context::new(options).await?;
            if let Some(email) = login {
                ctx.login(&email, admin);
            }
            if let Some(namespace) = namespace {
                ctx.set_namespace(&namespace);
            }

            let mut ns = StringProto::default();
            ctx.call(META_SERVICE, "GetNamespace", &mut VoidProto {}, &mut ns)
                .await?;

            println!("app:       {}", ctx.fully_qualified_app_id());
            println!("api:       {}", ctx.endpoint().http_url());
            println!("admin:     {}", ctx.endpoint().admin_url());
            println!("namespace: {}", ns.value.as_deref().unwrap_or(""));
            if let Some(user) = ctx.current_user() {
                println!("user:      {} (id {}, admin {})", user.email, user.id, user.admin);
            }
            if let Some(path) = ctx.workspace_path() {
                println!("workspace: {}", path.display());
            }

            if !once {
                println!("Press Ctrl-C to stop.");
                tokio::signal::ctrl_c().await?;
            }

            ctx.close();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        let cli = Cli::parse_from([
            "aetest",
            "start",
            "--queue",
            "a",
            "--queue",
            "b",
            "--log-level",
            "child",
            "--login",
            "me@example.com",
            "--admin",
        ]);
        match cli.command {
            Command::Start {
                queues,
                log_level,
                login,
                admin,
                ..
            } => {
                assert_eq!(queues, vec!["a", "b"]);
                assert_eq!(log_level, Some(LogLevel::Child));
                assert_eq!(login.as_deref(), Some("me@example.com"));
                assert!(admin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_admin_requires_login() {
        assert!(Cli::try_parse_from(["aetest", "start", "--admin"]).is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        assert!(Cli::try_parse_from(["aetest", "start", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_global_appserver_flag() {
        let cli = Cli::parse_from(["aetest", "locate", "--appserver", "/opt/sdk/dev_appserver.py"]);
        assert_eq!(
            cli.appserver,
            Some(PathBuf::from("/opt/sdk/dev_appserver.py"))
        );
        assert!(matches!(cli.command, Command::Locate));
    }
}
