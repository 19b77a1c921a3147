use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use threatfeed::{
    build_client, refresh_kev_catalog, run_ingestion, seed_default_sources, ArticleStore,
    IngestConfig, MemoryStore, SqliteStore, StoreChoice, KEV_CATALOG_URL,
};

#[derive(Debug, Clone, Copy)]
enum Mode {
    Ingest,
    RefreshKev,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mode = match parse_mode() {
        Ok(mode) => mode,
        Err(message) => {
            error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match run(mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "run aborted");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn parse_mode() -> Result<Mode, String> {
    match std::env::args().nth(1).as_deref() {
        None => Ok(Mode::Ingest),
        Some("--kev") => Ok(Mode::RefreshKev),
        Some(other) => Err(format!(
            "unrecognized argument {other:?}: run without arguments to ingest feeds, \
             or pass --kev to refresh the known-exploited-vulnerabilities catalog"
        )),
    }
}

async fn run(mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    match StoreChoice::from_env()? {
        StoreChoice::Sqlite(url) => {
            let store = SqliteStore::connect(&url).await?;
            execute(&store, mode).await
        }
        StoreChoice::Memory => {
            info!("using the in-memory store; nothing survives this process");
            let store = MemoryStore::default();
            execute(&store, mode).await
        }
    }
}

async fn execute<S: ArticleStore>(store: &S, mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    let config = IngestConfig::default();
    match mode {
        Mode::Ingest => {
            seed_default_sources(store).await?;
            let report = run_ingestion(store, &config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Mode::RefreshKev => {
            let client = build_client(&config)?;
            let report = refresh_kev_catalog(store, &client, KEV_CATALOG_URL).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
