//! OneCodePlant CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use onecode_foundation::{LogSettings, OneCodeConfig};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// 플러그인 로그 파일명
const PLUGIN_LOG_FILE: &str = "plugin.log";

/// OneCodePlant - robotics developer CLI with plugin support
#[derive(Parser, Debug)]
#[command(name = "onecode")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Managed plugin directory (overrides config and env)
    #[arg(long, global = true, value_name = "DIR")]
    plugins_dir: Option<PathBuf>,

    /// Plugin registry file (overrides config and env)
    #[arg(long, global = true, value_name = "FILE")]
    registry: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage installed plugins
    Plugin {
        #[command(subcommand)]
        action: PluginCommand,
    },
    /// Activate installed plugins and show their commands
    Plugins,
    /// Run a command provided by an active plugin
    Run {
        /// Command name
        command: String,

        /// Arguments passed to the command handler
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginCommand {
    /// Install a plugin from a local path, git URL, owner/repo shorthand or package name
    Install {
        source: String,

        /// Replace an existing installation with the same name
        #[arg(short, long)]
        force: bool,
    },
    /// Remove an installed plugin
    Remove {
        name: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// List installed plugins
    List {
        /// Show origin and install path
        #[arg(long)]
        detailed: bool,
    },
    /// Show the registry entry of a plugin
    Info { name: String },
    /// Re-check install paths and update plugin status
    Refresh,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = OneCodeConfig::load()?;
    if let Some(dir) = args.plugins_dir {
        config.plugins.plugins_dir = Some(dir);
    }
    if let Some(file) = args.registry {
        config.plugins.registry_file = Some(file);
    }

    // Initialize logging
    let _guard = init_logging(args.debug, &config.logging);

    // Ctrl-C는 실행 중인 외부 도구를 중단시킨다
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let manager = cli::build_manager(&config.plugins, cancel)?;

    match args.command {
        Command::Plugin { action } => cli::run_plugin_command(&manager, action).await,
        Command::Plugins => cli::show_active_plugins(&manager).await,
        Command::Run { command, args } => cli::run_plugin_handler(&manager, &command, &args).await,
    }
}

/// 콘솔(stderr) + `<log_dir>/plugin.log` 로깅
///
/// 로그 디렉토리를 만들 수 없으면 파일 로깅 없이 진행한다.
fn init_logging(debug: bool, settings: &LogSettings) -> Option<WorkerGuard> {
    let log_level = if debug { "debug" } else { settings.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let log_dir = settings.log_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(&log_dir, PLUGIN_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(Targets::new().with_target("onecode_core", LevelFilter::TRACE));
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot create log directory {}: {}",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let args = Args::parse_from(["onecode", "plugin", "install", "user/repo", "--force"]);
        match args.command {
            Command::Plugin {
                action: PluginCommand::Install { source, force },
            } => {
                assert_eq!(source, "user/repo");
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "onecode",
            "plugin",
            "list",
            "--plugins-dir",
            "/tmp/plugins",
            "--debug",
        ]);
        assert!(args.debug);
        assert_eq!(args.plugins_dir, Some(PathBuf::from("/tmp/plugins")));
    }

    #[test]
    fn test_parse_run_keeps_hyphen_args() {
        let args = Args::parse_from(["onecode", "run", "hello", "-n", "Robot", "--uppercase"]);
        match args.command {
            Command::Run { command, args } => {
                assert_eq!(command, "hello");
                assert_eq!(args, vec!["-n", "Robot", "--uppercase"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
