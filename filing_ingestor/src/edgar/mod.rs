//! EDGAR filing discovery scraper.
//!
//! Two discovery operations, both built on the rate-limited client:
//!
//! - [`EdgarClient::discover_series`] pages the series lookup endpoint for an
//!   organization, parsing series/class rows out of inconsistently-formatted
//!   HTML tables with a regex fallback.
//! - [`EdgarClient::discover_filings`] scans the filings-by-series page for
//!   rows of a given form type and extracts accession numbers.
//!
//! Parse anomalies are handled per row: a bad row is logged and skipped, a
//! page with no structured rows degrades to the tagged low-confidence
//! fallback, and only transport-level failure after retries surfaces as an
//! error. Pagination is best-effort (a link with a larger `start=` offset);
//! EDGAR exposes no authoritative total count.

pub mod html;
mod filings;
mod series;

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{
    ClientError, HttpTransport, RateLimitedClient, Request, RetryPolicy, Transport,
    TransportError,
};
use crate::models::{FilingCandidate, SeriesCandidate};

pub use filings::parse_filings_page;
pub use series::{has_more_pages, parse_series_page};

const SERIES_URL: &str = "https://www.sec.gov/cgi-bin/series";
const BROWSE_URL: &str = "https://www.sec.gov/cgi-bin/browse-edgar";
const ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

/// EDGAR default page size for series lookups.
const SERIES_PAGE_SIZE: usize = 500;
/// Row count requested from the filings browse endpoint.
const FILINGS_PAGE_SIZE: usize = 40;
/// EDGAR fair-access policy allows at most 10 requests per second.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from the discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The request failed after the client's retry budget was spent.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The organization identifier is not a CIK.
    #[error("invalid CIK {0:?}: expected up to 10 digits")]
    InvalidCik(String),
}

/// Scraper over EDGAR's series lookup and filings browse pages.
///
/// Holds the single rate-limited client for the EDGAR API; construct one per
/// process and share it so the fair-access quota is respected globally.
pub struct EdgarClient<T> {
    client: RateLimitedClient<T>,
}

impl EdgarClient<HttpTransport> {
    /// Builds a production client with EDGAR-compliant headers.
    ///
    /// `user_agent` must identify the operator, "Company Name
    /// email@domain.com" per the fair-access policy.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent)?);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml"),
        );
        let transport = HttpTransport::new(headers)?;
        Ok(Self::with_transport_and_policy(
            transport,
            MIN_REQUEST_INTERVAL,
            RetryPolicy::default(),
        ))
    }
}

impl<T: Transport> EdgarClient<T> {
    /// Wraps an arbitrary transport; the seam integration tests use.
    pub fn with_transport_and_policy(
        transport: T,
        min_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client: RateLimitedClient::with_min_interval(transport, min_interval, policy),
        }
    }

    /// Discovers all fund series (and their classes) for an organization,
    /// following pagination until a page yields no candidates or no
    /// continuation link.
    ///
    /// Offsets increase monotonically and no offset is requested twice.
    /// Duplicates across pages are not removed here; the SCD layer's
    /// idempotent upsert absorbs them.
    pub async fn discover_series(
        &self,
        cik: &str,
    ) -> Result<Vec<SeriesCandidate>, DiscoveryError> {
        let padded = normalize_cik(cik)?;
        let mut all = Vec::new();
        let mut start = 0usize;

        loop {
            info!(cik = %padded, start, "fetching series page");
            let request = Request::get(SERIES_URL)
                .query("company", "")
                .query("CIK", cik.trim())
                .query("start", start)
                .query("count", SERIES_PAGE_SIZE);
            let response = self.client.execute(&request).await?;

            if response.is_not_found() {
                warn!(cik = %padded, "no series data found");
                break;
            }

            let page = series::parse_series_page(&response.body, &padded);
            if page.is_empty() {
                break;
            }
            all.extend(page);

            if !series::has_more_pages(&response.body, start) {
                break;
            }
            start += SERIES_PAGE_SIZE;
        }

        info!(cik = %padded, total = all.len(), "series discovery complete");
        Ok(all)
    }

    /// Discovers filings of `form_type` for one series.
    pub async fn discover_filings(
        &self,
        series_code: &str,
        form_type: &str,
    ) -> Result<Vec<FilingCandidate>, DiscoveryError> {
        let request = Request::get(BROWSE_URL)
            .query("action", "getcompany")
            .query("CIK", series_code)
            .query("type", form_type)
            .query("dateb", "")
            .query("count", FILINGS_PAGE_SIZE);
        let response = self.client.execute(&request).await?;

        if response.is_not_found() {
            warn!(series = series_code, "no filings found");
            return Ok(Vec::new());
        }

        let filings = filings::parse_filings_page(&response.body, series_code, form_type);
        info!(
            series = series_code,
            form_type,
            count = filings.len(),
            "filings discovery complete"
        );
        Ok(filings)
    }

    /// Downloads a document, returning `Ok(None)` when the server has none.
    pub async fn fetch_document(&self, url: &str) -> Result<Option<String>, ClientError> {
        let response = self.client.execute(&Request::get(url)).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        Ok(Some(response.body))
    }
}

/// Canonical N-PORT primary document URL for a filing.
///
/// The archive path wants the CIK without leading zeros and the accession
/// number without dashes.
pub fn primary_document_url(cik: &str, accession_number: &str) -> String {
    let trimmed = cik.trim_start_matches('0');
    let cik_segment = if trimmed.is_empty() { "0" } else { trimmed };
    let directory = accession_number.replace('-', "");
    format!("{ARCHIVES_URL}/{cik_segment}/{directory}/primary_doc.xml")
}

/// Zero-pads a CIK to the canonical 10-digit form.
pub fn normalize_cik(cik: &str) -> Result<String, DiscoveryError> {
    let trimmed = cik.trim();
    if trimmed.is_empty() || trimmed.len() > 10 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DiscoveryError::InvalidCik(cik.to_string()));
    }
    Ok(format!("{trimmed:0>10}"))
}
