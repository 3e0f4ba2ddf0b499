/// Version injected at compile time via KUBECLIENT_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("KUBECLIENT_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kubeclient::api::http::format_api_error;
use kubeclient::resource::ResourceIdentity;
use kubeclient::{ApiClient, Config};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command line client for Kubernetes/OpenShift API servers
#[derive(Parser, Debug)]
#[command(name = "kubeclient", version, about, long_about = None)]
struct Args {
    /// API server URL
    #[arg(short, long)]
    server: Option<String>,

    /// Bearer token
    #[arg(long)]
    token: Option<String>,

    /// Namespace to use
    #[arg(short, long)]
    namespace: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the discovered resource endpoints
    ApiResources,
    /// Get one resource, or list a kind when no name is given
    Get {
        kind: String,
        name: Option<String>,
        #[arg(long)]
        api_version: Option<String>,
    },
    /// Delete one resource
    Delete {
        kind: String,
        name: String,
        #[arg(long)]
        api_version: Option<String>,
    },
    /// Print client and server versions
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("kubeclient {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("kubeclient").join("kubeclient.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".kubeclient").join("kubeclient.log");
    }
    PathBuf::from("kubeclient.log")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    if let Err(err) = run(args).await {
        if let Some(api_error) = err.downcast_ref::<kubeclient::Error>() {
            eprintln!("{}", format_api_error(api_error));
        }
        return Err(err);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load().with_overrides(args.server, args.token, args.namespace);
    let client = ApiClient::new(config).context("Failed to configure client")?;

    match args.command {
        Command::ApiResources => {
            let catalog = client.catalog().catalog().await;
            if catalog.is_empty() {
                tracing::warn!("Discovery returned no endpoints");
            }
            print_json(&catalog.endpoints())?;
        }
        Command::Get {
            kind,
            name,
            api_version,
        } => {
            let mut identity = ResourceIdentity::new(&kind);
            identity.version = api_version;
            match name {
                Some(name) => {
                    let resource = client
                        .get(&identity.name(name.as_str()))
                        .await
                        .with_context(|| format!("Failed to get {} {}", kind, name))?;
                    print_json(&resource)?;
                }
                None => {
                    let list = client
                        .list(&identity)
                        .await
                        .with_context(|| format!("Failed to list {}", kind))?;
                    print_json(&list)?;
                }
            }
        }
        Command::Delete {
            kind,
            name,
            api_version,
        } => {
            let mut identity = ResourceIdentity::new(&kind).name(name.as_str());
            identity.version = api_version;
            let answer = client
                .delete(&identity)
                .await
                .with_context(|| format!("Failed to delete {} {}", kind, name))?;
            print_json(&answer)?;
        }
        Command::Version => {
            let server = client.server_version().await;
            print_json(&serde_json::json!({
                "client": VERSION,
                "server": server,
            }))?;
        }
    }

    Ok(())
}
