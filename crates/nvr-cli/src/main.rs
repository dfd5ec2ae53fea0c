//! nvr CLI
//!
//! Opens files, sends keys and evaluates expressions in a running Neovim,
//! or becomes a new Neovim when none is listening.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nvr::env::EnvSnapshot;
use nvr::output::{print_error, print_info, print_warning};
use nvr::rpc::NvimDialer;
use nvr_core::config::{self, resolve_address, FileConfig};
use nvr_core::{AfterExpr, Launcher, OpenMode, SessionConfig, SessionController, SessionOutcome};

#[derive(Parser)]
#[command(name = "nvr")]
#[command(author, version, about = "Remote control for a running Neovim")]
struct Cli {
    /// Files to open in the remote session
    files: Vec<String>,

    /// Address of the session: host:port or a socket path
    /// (defaults to $NVIM_LISTEN_ADDRESS)
    #[arg(long, value_name = "ADDRESS")]
    servername: Option<String>,

    /// Fail instead of starting a new nvim when no session is reachable
    #[arg(long)]
    nostart: bool,

    /// Block until every opened buffer is deleted
    #[arg(long = "remote-wait")]
    remote_wait: bool,

    /// Send keys to the session
    #[arg(long = "remote-send", value_name = "KEYS")]
    remote_send: Option<String>,

    /// Evaluate an expression and print the result ("-" reads it from stdin)
    #[arg(long = "remote-expr", value_name = "EXPR")]
    remote_expr: Option<String>,

    /// Command to run before anything else
    #[arg(long = "cc", value_name = "COMMAND")]
    before: Option<String>,

    /// Command to run after everything else
    #[arg(short = 'c', value_name = "COMMAND")]
    after: Option<String>,

    /// Open files in horizontal splits
    #[arg(short = 'o', conflicts_with_all = ["vsplit", "tab"])]
    split: bool,

    /// Open files in vertical splits
    #[arg(short = 'O', conflicts_with = "tab")]
    vsplit: bool,

    /// Open files in tabs
    #[arg(short = 'p')]
    tab: bool,

    /// Keep going after --remote-expr: run -c and --remote-wait too
    #[arg(long = "expr-continue")]
    expr_continue: bool,

    /// Give up on --remote-wait after this many seconds
    #[arg(long = "wait-timeout", value_name = "SECONDS")]
    wait_timeout: Option<u64>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Same as -vv
    #[arg(long, hide = true)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries --remote-expr output
    let verbose = if cli.debug {
        cli.verbose.max(2)
    } else {
        cli.verbose
    };
    let log_level = match (cli.quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let env = EnvSnapshot::capture();
    let file = config::load_file_config(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let session = session_config(cli, &env, &file)?;

    // Only the wait phase observes the token; elsewhere SIGINT keeps its
    // default and ends the process
    let cancel = CancellationToken::new();
    if session.wait {
        let cancel_on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, no longer waiting");
                cancel_on_signal.cancel();
            }
        });
    }

    let controller = SessionController::new(
        NvimDialer::new(file.connect_timeout),
        Launcher::system(),
    );
    let mut stdout = std::io::stdout();
    let outcome = controller.run(&session, &mut stdout, &cancel).await?;

    match outcome {
        SessionOutcome::Finished {
            editor_exit: Some(code),
            ..
        } => {
            print_warning(&format!(
                "nvim exited with status {} before every buffer was closed",
                code
            ));
            Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
        }
        SessionOutcome::Finished { .. } => Ok(ExitCode::SUCCESS),
        SessionOutcome::Replaced => {
            // Only reachable with a non-replacing executor
            print_info("Started a new nvim");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Merge flags, environment and config file into one run's configuration
fn session_config(cli: Cli, env: &EnvSnapshot, file: &FileConfig) -> Result<SessionConfig> {
    let address = resolve_address(
        cli.servername.as_deref(),
        env.listen_address.as_deref(),
        file.servername.as_deref(),
    );

    let open_mode = if cli.split {
        OpenMode::Split
    } else if cli.vsplit {
        OpenMode::VSplit
    } else if cli.tab {
        OpenMode::Tab
    } else {
        file.open_mode
    };

    let after_expr = if cli.expr_continue || file.continue_after_expr {
        AfterExpr::Continue
    } else {
        AfterExpr::Return
    };

    let expr = match cli.remote_expr.as_deref() {
        Some("-") => Some(read_stdin().context("Failed to read expression from stdin")?),
        other => other.map(str::to_string),
    };

    let mut builder = SessionConfig::builder(address)
        .no_start(cli.nostart)
        .resources(cli.files)
        .wait(cli.remote_wait)
        .open_mode(open_mode)
        .after_expr(after_expr)
        .wait_timeout(cli.wait_timeout.map(Duration::from_secs).or(file.wait_timeout))
        .launch(env.launch_env(file.editor.as_ref()));

    if let Some(keys) = cli.remote_send {
        builder = builder.send(keys);
    }
    if let Some(expr) = expr {
        builder = builder.expr(expr);
    }
    if let Some(command) = cli.before {
        builder = builder.before(command);
    }
    if let Some(command) = cli.after {
        builder = builder.after(command);
    }

    Ok(builder.build())
}

fn read_stdin() -> std::io::Result<String> {
    let mut expr = String::new();
    std::io::stdin().read_to_string(&mut expr)?;
    Ok(expr.trim_end_matches(&['\n', '\r'][..]).to_string())
}
