use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lead_intake::{
    classify,
    config::{CollectionConfig, Config, LogFormat},
    export::{ExportScheduler, Exporter},
    intake::IntakeService,
    server::{self, AppState},
    sheets::SheetsClient,
    storage::{ConversationStore, SqliteStore},
    Branch,
};

#[derive(Parser)]
#[command(name = "lead-intake", version, about = "Chat lead intake and spreadsheet export")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server and the scheduled export (default)
    Serve,
    /// Run a single export pass and exit
    Export {
        /// Only sync this branch (slug or collection name)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Print the branch a message would be filed under
    Classify {
        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Classify { text }) = &cli.command {
        // Collection overrides apply when the environment loads; defaults otherwise
        let collections = Config::from_env()
            .map(|c| c.collections)
            .unwrap_or_default();
        println!("{}", describe_classification(&collections, text));
        return Ok(());
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Lead intake service starting..."
    );

    let store = connect_store(&config).await;

    match cli.command {
        Some(Command::Export { branch }) => run_export(config, store, branch).await,
        _ => run_server(config, store).await,
    }
}

/// Open the store. A failure leaves the service running without persistence.
async fn connect_store(config: &Config) -> Option<Arc<dyn ConversationStore>> {
    let store = match SqliteStore::new(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to initialize database, continuing without persistence");
            return None;
        }
    };

    if let Err(e) = store.ping().await {
        error!(error = %e, "Database ping failed, continuing without persistence");
        return None;
    }

    info!(path = %config.database.path.display(), "Database initialized");
    let store: Arc<dyn ConversationStore> = Arc::new(store);
    Some(store)
}

fn build_exporter(
    config: &Config,
    store: Option<Arc<dyn ConversationStore>>,
) -> Option<Arc<Exporter>> {
    let store = store?;
    let Some(sheets) = config.sheets.as_ref() else {
        warn!("SHEETS_SPREADSHEET_ID or Sheets credentials not set, export disabled");
        return None;
    };

    match SheetsClient::new(sheets, config.request.clone()) {
        Ok(client) => {
            info!(spreadsheet = %client.spreadsheet_id(), "Sheets client initialized");
            Some(Arc::new(Exporter::new(
                store,
                Arc::new(client),
                config.collections.clone(),
                config.export.branches.clone(),
                config.export.auto_create_tabs,
            )))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Sheets client, export disabled");
            None
        }
    }
}

async fn run_server(config: Config, store: Option<Arc<dyn ConversationStore>>) -> anyhow::Result<()> {
    let exporter = build_exporter(&config, store.clone());

    let scheduler = match exporter.as_ref() {
        Some(exporter) if config.export.enabled => Some(ExportScheduler::spawn(
            Arc::clone(exporter),
            Duration::from_secs(config.export.interval_secs),
            config.export.run_on_startup,
        )),
        _ => None,
    };

    let intake = IntakeService::new(
        store,
        config.collections.clone(),
        config.database.write_attempts,
    );
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, intake, exporter));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let result = server::serve(listener, state, shutdown_signal()).await;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn run_export(
    config: Config,
    store: Option<Arc<dyn ConversationStore>>,
    branch: Option<String>,
) -> anyhow::Result<()> {
    let Some(exporter) = build_exporter(&config, store) else {
        anyhow::bail!("export is not available: check database and Sheets configuration");
    };

    match branch {
        Some(name) => {
            let branch = match config.collections.branch_for(&name) {
                Some(b) => b,
                None => name.parse::<Branch>().map_err(anyhow::Error::msg)?,
            };
            let rows = exporter.sync_branch(branch).await?;
            info!(tab = %exporter.tab_name(branch), rows, "Export complete");
        }
        None => {
            let report = exporter.sync_once().await;
            if !report.is_success() {
                anyhow::bail!("export failed for tabs: {:?}", report.errors);
            }
        }
    }

    Ok(())
}

/// `<slug> (<collection>)` for the branch `text` is filed under.
fn describe_classification(collections: &CollectionConfig, text: &str) -> String {
    let branch = classify(text);
    format!("{} ({})", branch.slug(), collections.name(branch))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
