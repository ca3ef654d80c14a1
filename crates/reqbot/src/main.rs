//! CLI entry point for reqbot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use reqbot_app::{ReqbotConfig, ReqbotService};
use reqbot_store::{Backend, MemoryBackend, RedisBackend};

mod commands;

/// Request bin and canned-response store backed by Redis.
#[derive(Parser, Debug)]
#[command(
    name = "reqbot",
    version,
    about = "reqbot: capture requests into capped buckets and serve tagged responses"
)]
struct Cli {
    /// TOML configuration file. `REQBOT_*` variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use an in-process store instead of Redis. It is discarded when the command exits.
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a request into a bucket.
    Capture {
        bucket: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: Option<String>,
        /// Header as `name=value`; repeatable.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Query parameter as `name=value`; repeatable.
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,
        #[arg(short = 'd', long)]
        body: Option<String>,
    },

    /// Show the newest requests of a bucket.
    Bucket {
        name: String,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List bucket names.
    Buckets,

    /// Register a canned response.
    Respond {
        #[arg(short = 'd', long)]
        body: String,
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },

    /// Show one response by id.
    Response { id: String },

    /// List every stored response.
    Responses,

    /// Show responses carrying a tag.
    Tag { name: String },

    /// List tag names.
    Tags,

    /// Print the effective configuration.
    Config,
}

fn main() -> Result<()> {
    let Cli {
        config,
        memory,
        cmd,
    } = Cli::parse();
    install_tracing();

    let config = ReqbotConfig::load(config.as_deref()).context("failed to load configuration")?;
    if matches!(cmd, Command::Config) {
        return commands::print_json(&config.redacted());
    }

    let backend = open_backend(&config, memory)?;
    let service = ReqbotService::new(backend, config.requests.capacity)?;
    commands::run(cmd, &service)
}

fn open_backend(config: &ReqbotConfig, memory: bool) -> Result<Arc<dyn Backend>> {
    if memory {
        return Ok(Arc::new(MemoryBackend::new()));
    }
    let settings = &config.redis;
    let backend = RedisBackend::connect(&settings.connection_url(), Some(&settings.client))
        .with_context(|| format!("failed to connect to redis at {}:{}", settings.host, settings.port))?;
    Ok(Arc::new(backend))
}

fn install_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
