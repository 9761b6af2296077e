use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use stanhub_bus::BroadcastBus;
use stanhub_core::runner::DEFAULT_BINARY;
use stanhub_core::{AnalysisOrchestrator, ConfigResolver, PhpStanRunner, WatchLoop};
use stanhub_server::state::{AppState, DEFAULT_DEV_SERVER};

const BUS_CAPACITY: usize = 64;

#[derive(Parser)]
#[command(name = "stanhub", version, about = "Local PHPStan dashboard")]
struct Cli {
    #[arg(long, help = "Project to analyse (defaults to the current directory)")]
    project_root: Option<PathBuf>,

    #[arg(long, help = "Also write logs to a daily rolling file in this directory")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the dashboard HTTP and WebSocket servers")]
    Serve {
        #[arg(long, short = 'w', help = "Re-run analysis when sources or config change")]
        watch: bool,
        #[arg(long, default_value = "127.0.0.1", value_parser = parse_loopback, help = "Loopback interface to bind")]
        host: IpAddr,
        #[arg(long, default_value = "8081", help = "HTTP server port")]
        http_port: u16,
        #[arg(long, default_value = "8082", help = "WebSocket server port")]
        ws_port: u16,
        #[arg(long, help = "Built UI assets (defaults to <project-root>/public/build)")]
        build_dir: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_BINARY, help = "PHPStan executable, relative to the project root")]
        phpstan_bin: String,
        #[arg(long, default_value = "1000", help = "Watch poll interval in ms")]
        watch_interval_ms: u64,
        #[arg(long, default_value = DEFAULT_DEV_SERVER, help = "Frontend dev server used by /?dev")]
        dev_server: String,
    },
}

/// The API reads project files and runs commands without authentication, so
/// it only listens on loopback interfaces.
fn parse_loopback(value: &str) -> Result<IpAddr, String> {
    let addr: IpAddr = value
        .parse()
        .map_err(|e| format!("invalid IP address `{value}`: {e}"))?;
    if !addr.is_loopback() {
        return Err(format!("`{addr}` is not a loopback address"));
    }
    Ok(addr)
}

/// Everything `serve` needs, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
struct ServeOptions {
    project_root: PathBuf,
    build_dir: PathBuf,
    http_addr: SocketAddr,
    push_addr: SocketAddr,
    phpstan_bin: String,
    dev_server: String,
    watch: Option<Duration>,
}

impl ServeOptions {
    fn from_command(project_root: PathBuf, command: Commands) -> Self {
        let Commands::Serve {
            watch,
            host,
            http_port,
            ws_port,
            build_dir,
            phpstan_bin,
            watch_interval_ms,
            dev_server,
        } = command;

        Self {
            build_dir: build_dir.unwrap_or_else(|| project_root.join("public").join("build")),
            project_root,
            http_addr: SocketAddr::new(host, http_port),
            push_addr: SocketAddr::new(host, ws_port),
            phpstan_bin,
            dev_server,
            watch: watch.then(|| Duration::from_millis(watch_interval_ms.max(1))),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, _guard) = match &cli.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("failed to create {}", log_dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "stanhub.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let project_root = resolve_project_root(cli.project_root.as_deref())?;
    serve(ServeOptions::from_command(project_root, command)).await
}

fn resolve_project_root(requested: Option<&Path>) -> Result<PathBuf> {
    let root = match requested {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("project root {} is not accessible", root.display()))
}

async fn serve(options: ServeOptions) -> Result<()> {
    tracing::info!(
        project_root = %options.project_root.display(),
        build_dir = %options.build_dir.display(),
        "starting stanhub"
    );

    let bus = Arc::new(BroadcastBus::new(BUS_CAPACITY));
    let runner = PhpStanRunner::with_binary(&options.project_root, options.phpstan_bin);
    let orchestrator = Arc::new(AnalysisOrchestrator::new(runner, bus.clone()));
    let resolver = ConfigResolver::default();

    if let Some(period) = options.watch {
        WatchLoop::new(resolver.clone(), orchestrator.clone(), period)?.spawn();
    }

    let state = AppState {
        project_root: options.project_root,
        build_dir: options.build_dir,
        dev_server: options.dev_server,
        resolver,
        orchestrator,
        bus,
    };

    stanhub_server::serve(state, options.http_addr, options.push_addr).await
}
