use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dealscope::config::{AppConfig, LoggingConfig, MetricsConfig};
use dealscope::web::{self, AppState};
use dealscope::{DealManager, SearchRequest};

/// Deal discovery across Amazon, Flipkart and Nykaa with discount alerts
#[derive(Parser)]
#[command(name = "dealscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Search once and print the result as JSON
    Search {
        keyword: String,

        /// Upper bound on merged products
        #[arg(short, long)]
        max_products: Option<usize>,

        /// Evaluate stored alerts against the result before exiting
        #[arg(long)]
        match_alerts: bool,
    },
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("dealscope=debug".parse()?);
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("failed to start Prometheus exporter")?;
    info!(port = config.port, "Prometheus exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("failed to load configuration")?;

    let _log_guard = init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!("Starting DealScope...");
            let deals = DealManager::from_config(config.clone()).await?;
            web::serve(AppState::new(deals, config)).await?;
        }
        Commands::Search {
            keyword,
            max_products,
            match_alerts,
        } => {
            // The process exits right after printing; match in the foreground instead.
            config.alerts.match_on_search = false;
            let deals = DealManager::from_config(config).await?;

            let result = deals.search(SearchRequest { keyword, max_products }).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if match_alerts {
                let report = deals.match_alerts(&result.products).await?;
                info!(fired = report.fired, suppressed = report.suppressed, "Alert pass done");
            }
        }
    }

    Ok(())
}
