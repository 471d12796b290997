mod app;
mod gateway;
mod logs;
mod upload;
mod utils;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use app::Output;

#[derive(Parser, Debug)]
#[command(
    name = "ledger-uploader",
    version,
    about = "Upload bank-statement CSVs to a ledger processing service"
)]
struct Cli {
    /// Output format for upload events
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload statement files (or directories of them), one at a time
    Upload {
        /// CSV files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Base URL of the upload API
        #[arg(long, env = "UPLOAD_ENDPOINT", default_value = "http://127.0.0.1:8080")]
        endpoint: String,

        /// Seconds between status polls while rate limited
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
    },
    /// Run the relay gateway in front of the processing service
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,

        /// Base URL of the processing service
        #[arg(long, env = "PROCESSOR_URL", default_value = "http://localhost:5000")]
        processor_url: String,
    },
}

fn init_tracing() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            paths,
            endpoint,
            poll_interval,
        } => {
            app::run_upload(
                endpoint,
                paths,
                Duration::from_secs(poll_interval),
                cli.output,
            )
            .await
        }
        Commands::Serve {
            port,
            processor_url,
        } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            gateway::serve(gateway::Gateway::new(processor_url), addr).await
        }
    }
}
