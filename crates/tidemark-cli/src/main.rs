mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tidemark",
    version,
    about = "Incremental DeFi event sync into a SQL warehouse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain every configured stream from its watermark
    Sync {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Start analytics streams here instead of their watermark
        /// (epoch ms or ISO-8601)
        #[arg(long)]
        from: Option<String>,
        /// Only sync these streams (name or kind, repeatable)
        #[arg(long = "stream")]
        streams: Vec<String>,
    },
    /// Validate pipeline configuration and connectivity
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// List stored watermarks, or reset some
    Watermarks {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Forget the watermark of these streams (name or protocol/name)
        #[arg(long)]
        reset: Vec<String>,
    },
    /// Store the current Navi BUCK pool balance
    Snapshot {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Serve the daily fee summary API
    Serve {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Sync {
            pipeline,
            from,
            streams,
        } => commands::sync::execute(&pipeline, from.as_deref(), streams).await,
        Commands::Check { pipeline } => commands::check::execute(&pipeline).await,
        Commands::Watermarks { pipeline, reset } => {
            commands::watermarks::execute(&pipeline, &reset)
        }
        Commands::Snapshot { pipeline } => commands::snapshot::execute(&pipeline).await,
        Commands::Serve { pipeline, port } => commands::serve::execute(&pipeline, port).await,
    }
}
