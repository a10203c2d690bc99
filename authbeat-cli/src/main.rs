//! authbeat command-line client
//!
//! Runs a single authorization check against a license server and prints the
//! result as JSON. Intended for scripting and for diagnosing a deployment's
//! cache and device identity.
//!
//! Usage:
//!   authbeat --server-url https://license.example.com --software-name MyApp check
//!
//! The shared secret is read from `--client-secret` or `CLIENT_SECRET`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use authbeat_client::{AuthClient, ClientConfig, FailureKind};
use clap::{Parser, Subcommand};
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "authbeat")]
#[command(about = "Check this device's authorization with a license server")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// License server base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Software name registered on the server
    #[arg(long)]
    software_name: Option<String>,

    /// Shared client secret
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Use this device ID instead of the generated one
    #[arg(long)]
    device_id: Option<String>,

    /// Directory for the verdict cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Disable the local verdict cache
    #[arg(long)]
    no_cache: bool,

    /// Days a cached verdict stays valid
    #[arg(long)]
    cache_validity_days: Option<u32>,

    /// Days between recommended rechecks
    #[arg(long)]
    check_interval_days: Option<u32>,

    /// Heartbeat timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one check and print the outcome
    Check,
    /// Exit non-zero unless the device is authorized
    Require,
    /// Run one check and print outcome plus cache details
    Info,
    /// Print the cached verdict without contacting the server
    CacheInfo,
    /// Delete the cached verdict
    Clear,
}

fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(url) = &args.server_url {
        config.server_url = url.clone();
    }
    if let Some(name) = &args.software_name {
        config.software_name = name.clone();
    }
    if let Some(secret) = &args.client_secret {
        config.client_secret = Some(secret.clone());
    }
    if let Some(id) = &args.device_id {
        config.device_id = Some(id.clone());
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if args.no_cache {
        config.enable_cache = false;
    }
    if let Some(days) = args.cache_validity_days {
        config.cache_validity_days = days;
    }
    if let Some(days) = args.check_interval_days {
        config.check_interval_days = days;
    }
    if let Some(secs) = args.timeout {
        config.request_timeout_secs = secs;
    }
    config.debug |= args.verbose;

    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = build_config(&args)?;

    let log_level = if config.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Using {:?}", config);
    let client = AuthClient::new(config).context("creating authorization client")?;
    debug!("Device id: {}", client.device_id());

    match args.command {
        Command::Check => {
            let outcome = client.check_authorization();
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Require => match client.require_authorization() {
            Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
            Err(e) => {
                let kind = match e.kind() {
                    FailureKind::Network => "network",
                    FailureKind::Unauthorized => "unauthorized",
                    FailureKind::Validation => "validation",
                };
                error!("Authorization failed ({}): {}", kind, e);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Info => {
            let info = client.authorization_info();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::CacheInfo => match client.cache_info() {
            Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
            None => println!("null"),
        },
        Command::Clear => {
            client.clear_cache().context("clearing cache")?;
            println!("cache cleared");
        }
    }

    Ok(ExitCode::SUCCESS)
}
