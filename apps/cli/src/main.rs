//! Upcycle CLI - identify a material from a photo and get upcycling ideas for it.
//!
//! This CLI provides an `upcycle` command wrapping the two generation flows.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Upcycle CLI - turn waste materials into project ideas
#[derive(Parser, Debug)]
#[command(
    name = "upcycle",
    author,
    version,
    about = "Upcycle - identify materials and suggest upcycling ideas"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Model provider (gemini, mock)
    #[arg(long, global = true)]
    engine: Option<String>,

    /// Model ID
    #[arg(long, global = true)]
    model: Option<String>,

    /// Configuration file (skips discovery of ~/.upcycle/config.toml and ./.upcyclerc)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Give up on the model after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify the material of the item in a photo
    Identify {
        /// Path to the photo
        photo: PathBuf,

        /// What you know about the item
        #[arg(short, long)]
        description: Option<String>,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Suggest upcycling ideas for a material
    Ideas {
        /// Description of the material, e.g. "plastic bottles"
        material: String,

        /// Extra wishes the ideas must satisfy
        #[arg(short, long)]
        request: Option<String>,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let overrides = config::Overrides {
        engine: args.engine,
        model: args.model,
        log_level: args.log_level,
    };
    let pipeline_config = config::load_config(args.config.as_deref(), overrides)?;

    // Logs go to stderr so `--json` output stays parseable.
    let level = parse_level(pipeline_config.log_level.as_deref().unwrap_or("info"));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let executor = config::build_executor(&pipeline_config)?;
    let options = commands::action_options(args.timeout);

    match args.command {
        Command::Identify { photo, description, json } => {
            commands::identify::execute(&executor, &photo, description, json, options).await
        }
        Command::Ideas { material, request, json } => {
            commands::ideas::execute(&executor, &material, request.as_deref(), json, options).await
        }
    }
}
