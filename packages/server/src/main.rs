#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

use std::path::PathBuf;

use clap::Parser;
use data_hub_server::{ServerConfig, ServerError, run_server};

/// Data hub API server.
#[derive(Parser)]
#[command(version, about = "Serves the data hub REST API")]
struct Args {
    /// Address to bind, overriding BIND_ADDR.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overriding PORT.
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path, overriding DATA_HUB_DB_PATH.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.db_path.is_some() {
        config.db_path = args.db_path;
    }

    run_server(config).await
}
