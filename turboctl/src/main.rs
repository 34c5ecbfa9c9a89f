//! # turboctl
//!
//! Command-line front end for `turbo-core`: log in, discover and register
//! targets, and resolve probe IDs against a running server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use turbo_core::{ConfigBuilder, ProbeRetry, ServiceKey, Target, TurboClient};

/// Manage targets on a management server.
#[derive(Parser, Debug)]
#[command(name = "turboctl", version, about)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Server address, e.g. https://turbo.example.com
    #[arg(long, env = "TURBO_SERVER")]
    server: String,

    #[arg(long, env = "TURBO_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "TURBO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Override the API service path.
    #[arg(long)]
    api_path: Option<String>,

    /// Override the topology-processor path.
    #[arg(long)]
    tp_path: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and report whether a session was established.
    Login,
    /// Trigger discovery of an existing target.
    Discover {
        uuid: String,
        #[arg(long, default_value = "API")]
        service: ServiceKey,
    },
    /// Register a target described by a JSON file.
    AddTarget {
        file: PathBuf,
        #[arg(long, default_value = "API")]
        service: ServiceKey,
    },
    /// Check whether a target described by a JSON file already exists.
    FindTarget { file: PathBuf },
    /// Resolve the ID of the probe for a target type and category.
    ProbeId {
        #[arg(long = "type")]
        probe_type: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value_t = 3)]
        attempts: u32,
        /// Seconds between lookups.
        #[arg(long, default_value_t = 10)]
        delay: u64,
        /// Give up after this many seconds in total.
        #[arg(long)]
        deadline: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli.server)?;

    match cli.command {
        Commands::Login => {
            client.login()?;
            println!("logged in to {}", cli.server.server);
        }
        Commands::Discover { uuid, service } => {
            let response = client.discover_target(&uuid, service)?;
            println!("{}", response.body_text());
        }
        Commands::AddTarget { file, service } => {
            let target = read_target(&file)?;
            client.add_target(&target, service)?;
            println!("added target {target}");
        }
        Commands::FindTarget { file } => {
            let target = read_target(&file)?;
            let found = client.api()?.find_target(&target)?;
            println!("{}", if found { "exists" } else { "not found" });
        }
        Commands::ProbeId {
            probe_type,
            category,
            attempts,
            delay,
            deadline,
        } => {
            let retry = ProbeRetry {
                attempts,
                delay: Duration::from_secs(delay),
                deadline: deadline.map(Duration::from_secs),
            };
            let id = client
                .topology_processor()?
                .probe_id_with_retry(&probe_type, &category, retry)?;
            println!("{id}");
        }
    }

    Ok(())
}

fn build_client(args: &ServerArgs) -> anyhow::Result<TurboClient> {
    let mut builder = ConfigBuilder::from_address(&args.server)?;
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        builder = builder.basic_authentication(username, password);
    }
    if let Some(path) = &args.api_path {
        builder = builder.api_path(path.as_str());
    }
    if let Some(path) = &args.tp_path {
        builder = builder.topology_processor_path(path.as_str());
    }
    if let Some(secs) = args.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    Ok(TurboClient::new(&builder.create())?)
}

fn read_target(path: &Path) -> anyhow::Result<Target> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing target in {}", path.display()))
}
