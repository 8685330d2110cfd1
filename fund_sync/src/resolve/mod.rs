//! Cache-first identifier resolution and holdings enrichment.
//!
//! Resolution order, short-circuiting on first success: active-mapping cache
//! (a confirmed negative short-circuits to `None` without touching the API),
//! then one OpenFIGI call whose outcome — positive or negative — is written
//! back unconditionally so repeated lookups never re-hit the API. An API
//! *failure* propagates and writes nothing: "lookup failed" is never cached
//! as "confirmed none".
//!
//! The enrichment policy resolves CUSIPs for every candidate first, then
//! tries ISINs only for the still-unresolved — CUSIP is the more specific
//! identifier. Derivative instruments (equity linked notes, total return
//! swaps, ...) have no traditional ticker; they are excluded up front and
//! flagged with a data-quality note instead of being counted as failures.

use diesel::SqliteConnection;
use filing_ingestor::client::Transport;
use filing_ingestor::figi::{FigiClient, IdentifierKind};
use filing_ingestor::nport::Holding;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mappings;

/// Name/title markers identifying derivative instruments to exclude from
/// ticker lookup.
const DERIVATIVE_MARKERS: &[&str] = &[
    "eln,",
    "equity linked note",
    "linked to nasdaq",
    "linked to s&p",
    "total return swap",
    "trs",
    "swap agreement",
    "derivative",
];

/// A holding plus its resolution outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedHolding {
    /// The parsed holding, fields inlined.
    #[serde(flatten)]
    pub holding: Holding,
    /// Resolved ticker, when one was found.
    pub ticker: Option<String>,
    /// Data-quality note, e.g. the derivative-exclusion flag.
    pub data_quality_note: Option<String>,
}

/// Counters describing one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    /// Holdings considered.
    pub total: usize,
    /// Holdings excluded as derivative instruments.
    pub excluded_derivatives: usize,
    /// Non-derivative holdings that ended up with a ticker.
    pub resolved: usize,
    /// Non-derivative holdings still without a ticker.
    pub unresolved: usize,
}

/// Resolves one identifier to a ticker.
///
/// `Ok(None)` means confirmed-no-ticker (from cache or a fresh API answer);
/// an `Err` means the lookup could not be completed and nothing was cached.
/// Values failing format validation resolve to `None` without an API call or
/// a cache write.
pub async fn resolve<T: Transport>(
    conn: &mut SqliteConnection,
    figi: &FigiClient<T>,
    kind: IdentifierKind,
    value: &str,
) -> anyhow::Result<Option<String>> {
    if !kind.is_valid_value(value) {
        warn!(kind = kind.as_str(), value, "invalid identifier format");
        return Ok(None);
    }

    if let Some(mapping) = mappings::active_mapping(conn, kind, value)? {
        if mapping.has_no_results {
            return Ok(None);
        }
        return Ok(mapping.ticker);
    }

    let ticker = figi.lookup(kind, value).await?;
    mappings::upsert_mapping(conn, kind, value, ticker.as_deref(), ticker.is_none())?;
    Ok(ticker)
}

/// Resolves a batch of identifiers, deduplicating input first.
///
/// Returns an insertion-ordered map of value → outcome. Item-level failures
/// are logged and the item omitted, so one bad lookup cannot sink a large
/// batch; the summary line reports the hit rate.
pub async fn resolve_many<T: Transport>(
    conn: &mut SqliteConnection,
    figi: &FigiClient<T>,
    kind: IdentifierKind,
    values: &[String],
) -> IndexMap<String, Option<String>> {
    let mut results: IndexMap<String, Option<String>> = IndexMap::new();

    for value in values {
        if results.contains_key(value) {
            continue;
        }
        match resolve(conn, figi, kind, value).await {
            Ok(outcome) => {
                results.insert(value.clone(), outcome);
            }
            Err(err) => {
                warn!(kind = kind.as_str(), value, error = %err, "lookup failed, skipping");
            }
        }
    }

    let found = results.values().filter(|t| t.is_some()).count();
    let rate = if results.is_empty() {
        0.0
    } else {
        found as f64 / results.len() as f64 * 100.0
    };
    info!(
        kind = kind.as_str(),
        found,
        total = results.len(),
        rate = format!("{rate:.1}%"),
        "batch resolution complete"
    );
    results
}

/// Enriches a filing's holdings with tickers.
pub async fn enrich_holdings<T: Transport>(
    conn: &mut SqliteConnection,
    figi: &FigiClient<T>,
    holdings: Vec<Holding>,
) -> (Vec<EnrichedHolding>, EnrichmentStats) {
    let mut stats = EnrichmentStats {
        total: holdings.len(),
        ..Default::default()
    };

    let mut enriched: Vec<EnrichedHolding> = holdings
        .into_iter()
        .map(|holding| {
            let derivative =
                is_derivative(holding.name.as_deref(), holding.title.as_deref());
            EnrichedHolding {
                holding,
                ticker: None,
                data_quality_note: derivative
                    .then(|| "derivative instrument excluded from ticker lookup".to_string()),
            }
        })
        .collect();
    stats.excluded_derivatives = enriched
        .iter()
        .filter(|h| h.data_quality_note.is_some())
        .count();
    if stats.excluded_derivatives > 0 {
        info!(
            excluded = stats.excluded_derivatives,
            "excluding derivative instruments from ticker lookup"
        );
    }

    // CUSIP pass over every eligible holding.
    let cusips: Vec<String> = enriched
        .iter()
        .filter(|h| h.data_quality_note.is_none())
        .filter_map(|h| h.holding.cusip.clone())
        .collect();
    let by_cusip = resolve_many(conn, figi, IdentifierKind::Cusip, &cusips).await;
    for item in &mut enriched {
        if item.data_quality_note.is_some() {
            continue;
        }
        if let Some(cusip) = &item.holding.cusip {
            if let Some(Some(ticker)) = by_cusip.get(cusip) {
                item.ticker = Some(ticker.clone());
            }
        }
    }

    // ISIN pass only for what the CUSIP pass left unresolved.
    let isins: Vec<String> = enriched
        .iter()
        .filter(|h| h.data_quality_note.is_none() && h.ticker.is_none())
        .filter_map(|h| h.holding.isin.clone())
        .collect();
    if !isins.is_empty() {
        let by_isin = resolve_many(conn, figi, IdentifierKind::Isin, &isins).await;
        for item in &mut enriched {
            if item.data_quality_note.is_some() || item.ticker.is_some() {
                continue;
            }
            if let Some(isin) = &item.holding.isin {
                if let Some(Some(ticker)) = by_isin.get(isin) {
                    item.ticker = Some(ticker.clone());
                }
            }
        }
    }

    for item in enriched.iter().filter(|h| h.data_quality_note.is_none()) {
        if item.ticker.is_some() {
            stats.resolved += 1;
        } else {
            stats.unresolved += 1;
        }
    }

    let eligible = stats.total - stats.excluded_derivatives;
    let rate = if eligible > 0 {
        stats.resolved as f64 / eligible as f64 * 100.0
    } else {
        0.0
    };
    info!(
        resolved = stats.resolved,
        eligible,
        rate = format!("{rate:.1}%"),
        excluded = stats.excluded_derivatives,
        "ticker enrichment complete"
    );
    if stats.unresolved > 0 {
        warn!(
            unresolved = stats.unresolved,
            "non-derivative holdings still missing tickers after CUSIP and ISIN lookups"
        );
    }

    (enriched, stats)
}

/// Refreshes stale cache entries by re-running the API lookup for each and
/// overwriting the mapping in place.
///
/// Item-level failures are logged and skipped. Returns the number refreshed.
pub async fn refresh_stale<T: Transport>(
    conn: &mut SqliteConnection,
    figi: &FigiClient<T>,
    max_age_days: i64,
) -> anyhow::Result<usize> {
    let stale = mappings::find_stale(conn, max_age_days)?;
    info!(count = stale.len(), max_age_days, "refreshing stale cache entries");

    let mut refreshed = 0;
    for mapping in stale {
        let Some(kind) = IdentifierKind::parse(&mapping.identifier_type) else {
            warn!(
                identifier_type = %mapping.identifier_type,
                "skipping mapping with unrecognized identifier type"
            );
            continue;
        };
        match figi.lookup(kind, &mapping.identifier_value).await {
            Ok(ticker) => {
                mappings::upsert_mapping(
                    conn,
                    kind,
                    &mapping.identifier_value,
                    ticker.as_deref(),
                    ticker.is_none(),
                )?;
                refreshed += 1;
            }
            Err(err) => {
                warn!(
                    value = %mapping.identifier_value,
                    error = %err,
                    "failed to refresh mapping"
                );
            }
        }
    }

    info!(refreshed, "stale cache refresh complete");
    Ok(refreshed)
}

/// True when the instrument's name or title carries a derivative marker.
pub fn is_derivative(name: Option<&str>, title: Option<&str>) -> bool {
    let name = name.unwrap_or("").to_lowercase();
    let title = title.unwrap_or("").to_lowercase();
    DERIVATIVE_MARKERS
        .iter()
        .any(|marker| name.contains(marker) || title.contains(marker))
}
