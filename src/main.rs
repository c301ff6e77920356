mod config;
mod controller;
mod draft_cache;
mod error;
mod fields;
mod intake;
mod preview;
mod record;
mod remote;
mod session;

use clap::Parser;
use config::Config;
use controller::IntakeController;
use draft_cache::{DRAFT_KEY, DraftCache, KeyValueStore, MemoryStore, SqliteStore};
use fields::FormFields;
use remote::{HttpExtractionClient, HttpSaveClient};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Invoice intake: preview a file, extract its fields, edit and save.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = ".config/intake.toml")]
    config: PathBuf,

    /// Server base url, overrides the configuration file
    #[arg(long)]
    base_url: Option<String>,

    /// Keep drafts in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Do not load the saved draft on startup
    #[arg(long)]
    no_restore: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut cfg = Config::load_or_default(&args.config)?;
    if let Some(base_url) = args.base_url {
        cfg.server.base_url = base_url;
    }

    // init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store: Box<dyn KeyValueStore> = if args.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        match SqliteStore::open(&cfg.cache.db_path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!(error = %e, path = %cfg.cache.db_path, "Draft store unavailable, drafts last for this session only");
                Box::new(MemoryStore::new())
            }
        }
    };

    let http = reqwest::Client::new();
    let controller = IntakeController::new(
        Box::new(FormFields::new()),
        DraftCache::new(store),
        Box::new(HttpExtractionClient::new(http.clone(), &cfg.server)),
        Box::new(HttpSaveClient::new(http, &cfg.server)),
    );

    info!(
        extract_url = %cfg.server.extract_url(),
        save_url = %cfg.server.save_url(),
        "Intake ready"
    );

    if !args.no_restore && controller.restore(DRAFT_KEY) {
        println!("Draft restored.");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    session::run(&controller, stdin, &mut std::io::stdout()).await?;

    Ok(())
}
