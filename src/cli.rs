//! Process entry point shared by the three binaries.
//!
//! Order of events for one invocation:
//!
//! 1. assemble the tool (definition errors surface here);
//! 2. print usage for no arguments, a lone object, or `-h`/`--help`;
//! 3. resolve configuration and check preconditions;
//! 4. acquire the workspace, dispatch, release the workspace.
//!
//! The workspace is released on every path out of step 4, including
//! SIGINT/SIGTERM, which cancel the in-flight call. Signal listeners are
//! installed before the workspace is acquired.

use crate::app::{Engine, Tool};
use crate::config::{Profile, ToolConfig};
use crate::error::{AdminError, EXIT_OK};
use crate::executor::SystemProcessRunner;
use crate::http_client::ReqwestHttpClient;
use crate::invoke::Invoker;
use crate::workspace::Workspace;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::process::ExitCode;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "ADMINKIT_LOG";

fn command(profile: &Profile) -> Command {
    Command::new(profile.tool)
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .help("Print usage")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .help("Log progress to stderr (-vv for debug)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Show configuration information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("command")
                .help("<object> <action> [flags]")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

/// Installs the stderr subscriber. `ADMINKIT_LOG` wins over `-v`.
pub fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// SIGINT/SIGTERM listeners, registered as soon as this is constructed.
///
/// A signal delivered after [`Shutdown::install`] is held until
/// [`Shutdown::recv`] is polled.
pub struct Shutdown {
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

impl Shutdown {
    pub fn install() -> Self {
        Self {
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
        }
    }

    /// Resolves when either signal has been received.
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = wait(&mut self.interrupt) => debug!("SIGINT received"),
            _ = wait(&mut self.terminate) => debug!("SIGTERM received"),
        }
    }
}

fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("failed to install {} handler: {}", name, e);
            None
        }
    }
}

async fn wait(stream: &mut Option<Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Whether the command line only asks for usage text.
fn wants_usage(matches: &ArgMatches, tokens: &[String]) -> bool {
    matches.get_flag("help")
        || tokens.len() < 2
        || tokens.iter().any(|t| t == "-h" || t == "--help")
}

/// Runs `tool` against the process arguments and returns the exit status.
pub async fn run<T: Tool>(tool: T) -> ExitCode {
    let profile = tool.profile();
    let matches = match command(&profile).try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    init_logging(matches.get_count("verbose"));

    let tokens: Vec<String> = matches
        .get_many::<String>("command")
        .unwrap_or_default()
        .cloned()
        .collect();

    match execute(tool, &matches, &tokens).await {
        Ok(()) => ExitCode::from(EXIT_OK as u8),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn execute<T: Tool>(tool: T, matches: &ArgMatches, tokens: &[String]) -> Result<(), AdminError> {
    let engine = Engine::new(tool)?;
    let profile = engine.tool().profile();

    if matches.get_flag("config") {
        let mut out = std::io::stdout();
        return ToolConfig::show_config_info(&profile, &mut out)
            .and_then(|_| out.flush())
            .map_err(|e| AdminError::Output(e.to_string()));
    }

    if wants_usage(matches, tokens) {
        let mut out = std::io::stdout();
        return write!(out, "{}", engine.usage())
            .and_then(|_| out.flush())
            .map_err(|e| AdminError::Output(e.to_string()));
    }

    let config = ToolConfig::load(&profile, &SystemProcessRunner).await?;
    engine.tool().check_preconditions(&config, &SystemProcessRunner)?;
    let http = ReqwestHttpClient::new()
        .map_err(|e| AdminError::Precondition(format!("cannot build HTTP client: {:#}", e)))?;

    // Listeners go in before the workspace exists and stay until it is gone.
    let mut shutdown = Shutdown::install();
    let workspace = Workspace::acquire()?;
    info!("Workspace at {}", workspace.path().display());

    let result = tokio::select! {
        result = dispatch(&engine, &config, &workspace, http, tokens) => result,
        _ = shutdown.recv() => Err(AdminError::Interrupted),
    };

    // A failed release must not mask the invocation's own error.
    match (result, workspace.release()) {
        (Err(err), _) => Err(err),
        (Ok(()), released) => released,
    }
}

async fn dispatch<T: Tool>(
    engine: &Engine<T>,
    config: &ToolConfig,
    workspace: &Workspace,
    http: ReqwestHttpClient,
    tokens: &[String],
) -> Result<(), AdminError> {
    engine.tool().stage_credentials(config, workspace)?;

    let invoker = Invoker::new(
        Box::new(SystemProcessRunner),
        Box::new(http),
        workspace,
        engine.tool().error_fields(),
    );
    let mut out = std::io::stdout();

    let result = engine
        .dispatch(tokens, config, workspace, &invoker, &mut out)
        .await;
    debug!("{} external call(s) made", invoker.call_count());
    out.flush().map_err(|e| AdminError::Output(e.to_string()))?;
    result
}
