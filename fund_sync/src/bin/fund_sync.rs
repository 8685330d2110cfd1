use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use fund_sync::db::{connection, migrate};
use fund_sync::pipeline::{Pipeline, PipelineConfig};
use fund_sync::{mappings, resolve};
use shared_utils::config::AppConfig;

#[derive(Parser)]
#[command(version, about = "Fund holdings ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Discover series and filings, then drive the processing stages.
    Run {
        /// Only process issuers whose provider name contains this string.
        #[arg(long)]
        provider: Option<String>,
        /// Form type to discover and process.
        #[arg(long, default_value = "NPORT-P")]
        form_type: String,
        /// Stop after series discovery and SCD persistence.
        #[arg(long)]
        skip_filings: bool,
        /// Record filings but skip download/processing/enrichment.
        #[arg(long)]
        skip_stages: bool,
        /// Cap on series per issuer.
        #[arg(long, value_name = "N")]
        max_series: Option<usize>,
        /// Cap on filings recorded per series.
        #[arg(long, value_name = "N")]
        max_filings: Option<usize>,
    },
    /// Apply embedded database migrations.
    Migrate,
    /// Inspect and maintain the identifier-mapping cache.
    Cache(CacheCmd),
}

#[derive(Args)]
struct CacheCmd {
    #[command(subcommand)]
    sub: CacheSub,
}

#[derive(Subcommand)]
enum CacheSub {
    /// Print active cache counters.
    Stats,
    /// End-date every active mapping.
    Clear,
    /// Re-fetch mappings whose last lookup is older than the threshold.
    RefreshStale {
        #[arg(long, default_value_t = 60)]
        max_age_days: i64,
    },
    /// Import a legacy flat-file JSON cache (identifier -> ticker).
    ImportLegacy {
        #[arg(long, value_name = "FILE")]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env()?;

    match cli.cmd {
        Cmd::Migrate => {
            migrate::run_sqlite(&app.database_url)?;
            info!("migrations applied");
        }
        Cmd::Run {
            provider,
            form_type,
            skip_filings,
            skip_stages,
            max_series,
            max_filings,
        } => {
            migrate::run_sqlite(&app.database_url)?;

            let mut config = PipelineConfig::new(app.data_dir.clone());
            config.form_type = form_type;
            config.provider_filter = provider;
            config.fetch_filings = !skip_filings;
            config.run_stages = !skip_stages && !skip_filings;
            config.max_series_per_issuer = max_series;
            config.max_filings_per_series = max_filings;

            let mut pipeline = Pipeline::from_config(&app, config)?;
            let summary = pipeline.run().await?;

            info!(
                issuers_processed = summary.issuers_processed,
                issuers_failed = summary.issuers_failed,
                series_found = summary.series_found,
                filings_recorded = summary.filings_recorded,
                downloaded = summary.reports_downloaded,
                processed = summary.reports_processed,
                enriched = summary.reports_enriched,
                "run summary"
            );
            for failure in &summary.failures {
                info!(cik = %failure.cik, error = %failure.error, "issuer failure");
            }
        }
        Cmd::Cache(CacheCmd { sub }) => {
            let mut conn = connection::connect_sqlite(&app.database_url)?;
            match sub {
                CacheSub::Stats => {
                    let stats = mappings::cache_stats(&mut conn)?;
                    info!(
                        total = stats.total_cached,
                        found = stats.found_cached,
                        not_found = stats.not_found_cached,
                        "cache stats"
                    );
                }
                CacheSub::Clear => {
                    let cleared = mappings::clear_cache(&mut conn)?;
                    info!(cleared, "cache cleared");
                }
                CacheSub::RefreshStale { max_age_days } => {
                    let figi =
                        filing_ingestor::figi::FigiClient::new(app.openfigi_api_key.as_deref())?;
                    let refreshed = resolve::refresh_stale(&mut conn, &figi, max_age_days).await?;
                    info!(refreshed, "stale mappings refreshed");
                }
                CacheSub::ImportLegacy { file } => {
                    let imported =
                        mappings::import_legacy_cache(&mut conn, std::path::Path::new(&file))?;
                    info!(imported, file, "legacy cache imported");
                }
            }
        }
    }

    Ok(())
}
