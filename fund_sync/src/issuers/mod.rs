//! Issuer directory reads.
//!
//! The `fund_providers`/`fund_issuers` tables are the single source of truth
//! for which organizations the pipeline covers; there is no in-process
//! constant table. Provider filtering is a case-insensitive substring match
//! (`LIKE`) — callers pass plain provider names.

use std::collections::BTreeMap;

use diesel::prelude::*;
use tracing::debug;

use crate::schema::{fund_issuers, fund_providers, fund_series};

/// One active issuer joined with its provider, the pipeline's unit of work.
#[derive(Debug, Clone, Queryable)]
pub struct ActiveIssuer {
    /// FK into `fund_issuers`, used for SCD writes.
    pub issuer_id: i32,
    /// Registrant CIK as stored.
    pub cik: String,
    /// Registrant company name.
    pub company_name: String,
    /// Owning provider's canonical name.
    pub provider_name: String,
}

/// Provider-level coverage counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSummary {
    /// Distinct active providers.
    pub total_providers: usize,
    /// Active issuers across all providers.
    pub total_issuers: usize,
    /// Issuer count per provider name.
    pub counts: BTreeMap<String, usize>,
}

fn active_issuer_columns() -> (
    fund_issuers::id,
    fund_issuers::cik,
    fund_issuers::company_name,
    fund_providers::provider_name,
) {
    (
        fund_issuers::id,
        fund_issuers::cik,
        fund_issuers::company_name,
        fund_providers::provider_name,
    )
}

/// All active issuers, ordered by provider then company name.
pub fn active_issuers(conn: &mut SqliteConnection) -> anyhow::Result<Vec<ActiveIssuer>> {
    Ok(fund_issuers::table
        .inner_join(fund_providers::table)
        .filter(fund_issuers::is_active.eq(true))
        .filter(fund_providers::is_active.eq(true))
        .order((
            fund_providers::provider_name.asc(),
            fund_issuers::company_name.asc(),
        ))
        .select(active_issuer_columns())
        .load(conn)?)
}

/// Active issuers whose provider name contains `filter`, case-insensitively.
pub fn issuers_by_provider(
    conn: &mut SqliteConnection,
    filter: &str,
) -> anyhow::Result<Vec<ActiveIssuer>> {
    let pattern = format!("%{filter}%");
    Ok(fund_issuers::table
        .inner_join(fund_providers::table)
        .filter(fund_issuers::is_active.eq(true))
        .filter(fund_providers::is_active.eq(true))
        .filter(fund_providers::provider_name.like(pattern))
        .order((
            fund_providers::provider_name.asc(),
            fund_issuers::company_name.asc(),
        ))
        .select(active_issuer_columns())
        .load(conn)?)
}

/// The active issuer for a CIK, when one exists.
pub fn issuer_by_cik(
    conn: &mut SqliteConnection,
    cik: &str,
) -> anyhow::Result<Option<ActiveIssuer>> {
    Ok(fund_issuers::table
        .inner_join(fund_providers::table)
        .filter(fund_issuers::cik.eq(cik))
        .filter(fund_issuers::is_active.eq(true))
        .select(active_issuer_columns())
        .first(conn)
        .optional()?)
}

/// The CIK owning a series, resolved through the current series row.
pub fn cik_for_series(
    conn: &mut SqliteConnection,
    series_code: &str,
) -> anyhow::Result<Option<String>> {
    let cik = fund_series::table
        .inner_join(fund_issuers::table)
        .filter(fund_series::series_code.eq(series_code))
        .filter(fund_series::is_current.eq(true))
        .select(fund_issuers::cik)
        .first::<String>(conn)
        .optional()?;
    debug!(series = series_code, cik = ?cik, "resolved series owner");
    Ok(cik)
}

/// Coverage summary across the active directory.
pub fn provider_summary(conn: &mut SqliteConnection) -> anyhow::Result<ProviderSummary> {
    let issuers = active_issuers(conn)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for issuer in &issuers {
        *counts.entry(issuer.provider_name.clone()).or_default() += 1;
    }
    Ok(ProviderSummary {
        total_providers: counts.len(),
        total_issuers: issuers.len(),
        counts,
    })
}
