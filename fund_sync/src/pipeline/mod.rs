//! Per-issuer pipeline orchestration.
//!
//! For each active issuer: discover series → persist via the SCD service
//! (committed before filing discovery begins) → discover filings per current
//! series → record filing rows → optionally drive the download, processing,
//! and enrichment stages. Stages are "select pending → act → update status"
//! loops over the state machine, restricted to the current [`RunScope`] so a
//! filtered run never drains unrelated backlog.
//!
//! One issuer's failure is recorded in the [`RunSummary`] and never halts the
//! others. Aborting a run loses no progress: committed rows stay valid and
//! the next run re-selects whatever is still pending.

use std::path::PathBuf;

use anyhow::Context;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use shared_utils::config::AppConfig;
use tracing::{error, info, warn};

use filing_ingestor::client::{HttpTransport, Transport};
use filing_ingestor::edgar::{self, EdgarClient};
use filing_ingestor::figi::FigiClient;
use filing_ingestor::nport::{self, FundInfo};

use crate::db::connection::connect_sqlite;
use crate::issuers::{self, ActiveIssuer};
use crate::reports::{self, DownloadStatus, ProcessingStatus};
use crate::resolve::{self, EnrichedHolding};
use crate::scd;

/// Tunables for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving downloaded filings and extracted artifacts.
    pub data_dir: PathBuf,
    /// Form type to discover and process.
    pub form_type: String,
    /// Case-insensitive provider-name substring filter; `None` = all active.
    pub provider_filter: Option<String>,
    /// Cap on series per issuer (testing/backfill throttle).
    pub max_series_per_issuer: Option<usize>,
    /// Cap on filings recorded per series.
    pub max_filings_per_series: Option<usize>,
    /// Whether to discover filings after series discovery.
    pub fetch_filings: bool,
    /// Whether to drive the download/processing/enrichment stages.
    pub run_stages: bool,
}

impl PipelineConfig {
    /// Defaults: N-PORT, no filters, full run.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            form_type: "NPORT-P".to_string(),
            provider_filter: None,
            max_series_per_issuer: None,
            max_filings_per_series: None,
            fetch_filings: true,
            run_stages: true,
        }
    }
}

/// The set of issuers and series touched by this invocation.
///
/// Stage loops otherwise operate over "all pending work" globally; the scope
/// restricts them so a run filtered to one provider cannot process another
/// provider's backlog.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    /// Issuer ids processed this run.
    pub issuer_ids: Vec<i32>,
    /// Series codes processed this run.
    pub series_codes: Vec<String>,
}

impl RunScope {
    fn add_series(&mut self, code: &str) {
        if !self.series_codes.iter().any(|c| c == code) {
            self.series_codes.push(code.to_string());
        }
    }
}

/// One issuer's failure, recorded without halting the run.
#[derive(Debug, Clone)]
pub struct IssuerFailure {
    /// The issuer's CIK.
    pub cik: String,
    /// Rendered error chain.
    pub error: String,
}

/// Per-run counters, the operator-facing outcome of an invocation.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Issuers that completed discovery and persistence.
    pub issuers_processed: usize,
    /// Issuers that failed; details in `failures`.
    pub issuers_failed: usize,
    /// Series candidates accepted by the SCD service this run.
    pub series_found: usize,
    /// New filing rows recorded this run.
    pub filings_recorded: usize,
    /// Filings downloaded this run.
    pub reports_downloaded: usize,
    /// Filings processed into holdings artifacts this run.
    pub reports_processed: usize,
    /// Holdings artifacts enriched with tickers this run.
    pub reports_enriched: usize,
    /// Per-issuer failure details.
    pub failures: Vec<IssuerFailure>,
}

/// The holdings artifact written by the processing stage and read by the
/// enrichment stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct HoldingsArtifact {
    /// Fund-level header information.
    pub fund: FundInfo,
    /// Parsed holdings.
    pub holdings: Vec<nport::Holding>,
}

/// The enriched artifact, the pipeline's downstream handoff.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrichedArtifact {
    /// Fund-level header information.
    pub fund: FundInfo,
    /// Holdings with resolution outcomes.
    pub holdings: Vec<EnrichedHolding>,
}

/// The orchestrator: one store connection plus the two shared API clients.
pub struct Pipeline<T: Transport> {
    conn: SqliteConnection,
    edgar: EdgarClient<T>,
    figi: FigiClient<T>,
    config: PipelineConfig,
}

impl Pipeline<HttpTransport> {
    /// Builds a production pipeline from the application config.
    pub fn from_config(app: &AppConfig, config: PipelineConfig) -> anyhow::Result<Self> {
        let conn = connect_sqlite(&app.database_url)?;
        let edgar = EdgarClient::new(&app.sec_user_agent)?;
        let figi = FigiClient::new(app.openfigi_api_key.as_deref())?;
        Ok(Self {
            conn,
            edgar,
            figi,
            config,
        })
    }
}

impl<T: Transport> Pipeline<T> {
    /// Assembles a pipeline from pre-built parts; the seam tests use.
    pub fn with_clients(
        conn: SqliteConnection,
        edgar: EdgarClient<T>,
        figi: FigiClient<T>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            conn,
            edgar,
            figi,
            config,
        }
    }

    /// Runs the pipeline over every matching issuer.
    pub async fn run(&mut self) -> anyhow::Result<RunSummary> {
        let issuers = match &self.config.provider_filter {
            Some(filter) => issuers::issuers_by_provider(&mut self.conn, filter)?,
            None => issuers::active_issuers(&mut self.conn)?,
        };
        info!(count = issuers.len(), "starting pipeline run");

        let mut summary = RunSummary::default();
        let mut scope = RunScope::default();

        for issuer in issuers {
            match self.process_issuer(&issuer, &mut scope, &mut summary).await {
                Ok(()) => summary.issuers_processed += 1,
                Err(err) => {
                    error!(cik = %issuer.cik, error = %format!("{err:#}"), "issuer failed");
                    summary.issuers_failed += 1;
                    summary.failures.push(IssuerFailure {
                        cik: issuer.cik.clone(),
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        if self.config.run_stages {
            summary.reports_downloaded = self.run_downloads(&scope).await?;
            summary.reports_processed = self.run_processing(&scope)?;
            summary.reports_enriched = self.run_enrichment(&scope).await?;
        }

        info!(
            processed = summary.issuers_processed,
            failed = summary.issuers_failed,
            series = summary.series_found,
            filings = summary.filings_recorded,
            "pipeline run complete"
        );
        Ok(summary)
    }

    async fn process_issuer(
        &mut self,
        issuer: &ActiveIssuer,
        scope: &mut RunScope,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        info!(
            cik = %issuer.cik,
            company = %issuer.company_name,
            provider = %issuer.provider_name,
            "processing issuer"
        );

        let candidates = self
            .edgar
            .discover_series(&issuer.cik)
            .await
            .with_context(|| format!("series discovery for CIK {}", issuer.cik))?;

        let stats = scd::upsert_series_batch(&mut self.conn, issuer.issuer_id, &candidates)
            .with_context(|| format!("SCD upsert for CIK {}", issuer.cik))?;
        info!(
            cik = %issuer.cik,
            series_new = stats.series_new,
            series_verified = stats.series_verified,
            classes_new = stats.classes_new,
            classes_updated = stats.classes_updated,
            classes_verified = stats.classes_verified,
            "series batch persisted"
        );
        summary.series_found += stats.series_new + stats.series_verified;
        scope.issuer_ids.push(issuer.issuer_id);

        if !self.config.fetch_filings {
            return Ok(());
        }

        // Filing discovery reads the just-committed current rows, not the
        // raw candidates: only validated, current series get filings.
        let mut current = scd::current_series_for_issuer(&mut self.conn, issuer.issuer_id)?;
        if let Some(max) = self.config.max_series_per_issuer {
            current.truncate(max);
        }

        for series in current {
            scope.add_series(&series.series_code);
            let mut filings = self
                .edgar
                .discover_filings(&series.series_code, &self.config.form_type)
                .await
                .with_context(|| format!("filing discovery for {}", series.series_code))?;
            if let Some(max) = self.config.max_filings_per_series {
                filings.truncate(max);
            }
            summary.filings_recorded += reports::record_filings(&mut self.conn, &filings)?;
        }

        Ok(())
    }

    async fn run_downloads(&mut self, scope: &RunScope) -> anyhow::Result<usize> {
        let pending = reports::pending_downloads(
            &mut self.conn,
            Some(self.config.form_type.as_str()),
            Some(&scope.series_codes),
        )?;
        info!(count = pending.len(), "running download stage");
        std::fs::create_dir_all(&self.config.data_dir)?;

        let mut downloaded = 0;
        for report in pending {
            let Some(cik) = issuers::cik_for_series(&mut self.conn, &report.series_code)? else {
                reports::update_download_status(
                    &mut self.conn,
                    report.id,
                    DownloadStatus::Failed,
                    &[],
                    Some("no active issuer owns this series"),
                )?;
                continue;
            };

            let url = edgar::primary_document_url(&cik, &report.accession_number);
            match self.edgar.fetch_document(&url).await {
                Ok(Some(xml)) => {
                    let path = self.document_path(&cik, &report.series_code, &report.accession_number);
                    std::fs::write(&path, xml)?;
                    let path_str = path.to_string_lossy();
                    reports::update_download_status(
                        &mut self.conn,
                        report.id,
                        DownloadStatus::Downloaded,
                        &[("xml", path_str.as_ref())],
                        None,
                    )?;
                    downloaded += 1;
                }
                Ok(None) => {
                    reports::update_download_status(
                        &mut self.conn,
                        report.id,
                        DownloadStatus::Failed,
                        &[],
                        Some("primary document not found"),
                    )?;
                }
                Err(err) => {
                    warn!(accession = %report.accession_number, error = %err, "download failed");
                    reports::update_download_status(
                        &mut self.conn,
                        report.id,
                        DownloadStatus::Failed,
                        &[],
                        Some(&err.to_string()),
                    )?;
                }
            }
        }
        Ok(downloaded)
    }

    fn run_processing(&mut self, scope: &RunScope) -> anyhow::Result<usize> {
        let pending = reports::pending_processing(
            &mut self.conn,
            Some(self.config.form_type.as_str()),
            Some(&scope.series_codes),
        )?;
        info!(count = pending.len(), "running processing stage");

        let mut processed = 0;
        for report in pending {
            let Some(xml_path) = reports::artifact_path(&report, "xml") else {
                reports::update_processing_status(
                    &mut self.conn,
                    report.id,
                    ProcessingStatus::Failed,
                    Some("downloaded report has no xml artifact"),
                )?;
                continue;
            };

            let outcome = std::fs::read_to_string(&xml_path)
                .map_err(anyhow::Error::from)
                .and_then(|xml| nport::parse_document(&xml).map_err(anyhow::Error::from));
            match outcome {
                Ok(doc) => {
                    let artifact = HoldingsArtifact {
                        fund: doc.fund,
                        holdings: doc.holdings,
                    };
                    let path = self.artifact_file(&report.series_code, &report.accession_number, "holdings");
                    std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
                    let path_str = path.to_string_lossy();
                    reports::record_artifact(&mut self.conn, report.id, "holdings", path_str.as_ref())?;
                    reports::update_processing_status(
                        &mut self.conn,
                        report.id,
                        ProcessingStatus::Processed,
                        None,
                    )?;
                    processed += 1;
                }
                Err(err) => {
                    warn!(accession = %report.accession_number, error = %err, "processing failed");
                    reports::update_processing_status(
                        &mut self.conn,
                        report.id,
                        ProcessingStatus::Failed,
                        Some(&err.to_string()),
                    )?;
                }
            }
        }
        Ok(processed)
    }

    async fn run_enrichment(&mut self, scope: &RunScope) -> anyhow::Result<usize> {
        let processed = reports::processed_reports(
            &mut self.conn,
            Some(self.config.form_type.as_str()),
            Some(&scope.series_codes),
        )?;

        let mut enriched_count = 0;
        for report in processed {
            // Already enriched in a previous run.
            if reports::artifact_path(&report, "enriched").is_some() {
                continue;
            }
            let Some(holdings_path) = reports::artifact_path(&report, "holdings") else {
                continue;
            };

            let raw = std::fs::read_to_string(&holdings_path)?;
            let artifact: HoldingsArtifact = serde_json::from_str(&raw)
                .with_context(|| format!("holdings artifact {holdings_path}"))?;

            let (holdings, _stats) =
                resolve::enrich_holdings(&mut self.conn, &self.figi, artifact.holdings).await;
            let enriched = EnrichedArtifact {
                fund: artifact.fund,
                holdings,
            };

            let path = self.artifact_file(&report.series_code, &report.accession_number, "enriched");
            std::fs::write(&path, serde_json::to_string_pretty(&enriched)?)?;
            let path_str = path.to_string_lossy();
            reports::record_artifact(&mut self.conn, report.id, "enriched", path_str.as_ref())?;
            enriched_count += 1;
        }

        info!(count = enriched_count, "enrichment stage complete");
        Ok(enriched_count)
    }

    fn document_path(&self, cik: &str, series_code: &str, accession: &str) -> PathBuf {
        let clean = accession.replace('-', "_");
        self.config
            .data_dir
            .join(format!("nport_{cik}_{series_code}_{clean}.xml"))
    }

    fn artifact_file(&self, series_code: &str, accession: &str, kind: &str) -> PathBuf {
        let clean = accession.replace('-', "_");
        self.config
            .data_dir
            .join(format!("{kind}_{series_code}_{clean}.json"))
    }
}
