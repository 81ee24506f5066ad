//! `rcm` - load or watch a configuration from the command line.
//!
//! ```text
//! rcm [--config PATH] [--server HOST] ... load  <NAME> [--topic T]
//! rcm [--config PATH] [--server HOST] ... watch <NAME> [--topic T] [--interval-ms N]
//! ```
//!
//! Settings come from `~/.rcm/config.toml` (or `--config`), with flags taking
//! precedence. Logs go to stderr; configuration content goes to stdout.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rcm_client::{ClientConfig, Content, Protocol, RcmClient, UpdateEvent, WatchEvent};

#[derive(Parser)]
#[command(name = "rcm")]
#[command(about = "Fetch and watch remote configurations", version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Do not decode FORMAT: JSON/YAML content
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Config file (default: ~/.rcm/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Service host name
    #[arg(long, global = true)]
    server: Option<String>,
    /// `http` or `https`
    #[arg(long, global = true)]
    protocol: Option<Protocol>,
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Bearer token; takes precedence over app credentials
    #[arg(long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a configuration once and print it
    Load {
        name: String,
        #[arg(long)]
        topic: Option<String>,
    },
    /// Print the configuration each time its UPDATED marker changes
    Watch {
        name: String,
        #[arg(long)]
        topic: Option<String>,
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// File settings overlaid with whatever was given on the command line.
fn client_config(args: &ConnectionArgs, raw: bool) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::load()?.unwrap_or_default(),
    };

    if let Some(server) = &args.server {
        config.server = Some(server.clone());
    }
    if let Some(protocol) = args.protocol {
        config.protocol = Some(protocol);
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    if raw {
        config.decode = Some(false);
    }
    Ok(config)
}

fn render(content: &Content) -> Result<String> {
    Ok(match content {
        Content::Text(text) => text.clone(),
        Content::Structured(value) => serde_json::to_string_pretty(value)?,
    })
}

fn print_update(event: &UpdateEvent) {
    match render(&event.content) {
        Ok(body) => {
            if let Some(action) = &event.action {
                println!("# {} updated (action: {action})", event.config_name);
            } else {
                println!("# {} updated", event.config_name);
            }
            println!("{body}");
        }
        Err(e) => tracing::error!(config = %event.config_name, "Failed to render update: {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = client_config(&cli.connection, cli.raw)?;
    let client = RcmClient::new(&config)?;

    match cli.command {
        Commands::Load { name, topic } => {
            let loaded = client.load(&name, topic.as_deref()).await?;
            if let Some(updated) = &loaded.payload.updated {
                tracing::info!(config = %name, %updated, "Loaded configuration");
            }
            println!("{}", render(&loaded.content)?);
        }
        Commands::Watch {
            name,
            topic,
            interval_ms,
        } => {
            client.on(WatchEvent::Update, print_update);

            let handle = client
                .watch_topic(&name, topic.as_deref(), interval_ms.map(Duration::from_millis))
                .await?;
            println!("{}", render(&handle.baseline().content)?);

            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            tracing::info!("Interrupted, stopping watch");
            handle.shutdown().await;
        }
    }

    Ok(())
}
