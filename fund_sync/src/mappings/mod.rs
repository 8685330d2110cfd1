//! CRUD over the identifier-to-ticker mapping cache.
//!
//! One logical mapping per (identifier type, value) with at most one active
//! row (`end_date IS NULL`), enforced by a partial unique index. Lookup
//! outcomes are updated in place — identifier-to-ticker drift is rare and not
//! independently audited — and a confirmed negative (`has_no_results`) is a
//! first-class cached state, distinct from "never looked up".

use std::path::Path;

use diesel::prelude::*;
use filing_ingestor::figi::IdentifierKind;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{NewSecurityMapping, SecurityMapping};
use crate::schema::security_mappings;
use crate::time;

/// Active-cache counters for the `cache stats` surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Active mappings of any outcome.
    pub total_cached: i64,
    /// Active mappings holding a ticker.
    pub found_cached: i64,
    /// Active confirmed negatives.
    pub not_found_cached: i64,
}

/// The active mapping for an identifier, when one exists.
pub fn active_mapping(
    conn: &mut SqliteConnection,
    kind: IdentifierKind,
    value: &str,
) -> anyhow::Result<Option<SecurityMapping>> {
    use crate::schema::security_mappings::dsl as sm;
    Ok(sm::security_mappings
        .filter(sm::identifier_type.eq(kind.as_str()))
        .filter(sm::identifier_value.eq(value))
        .filter(sm::end_date.is_null())
        .select(SecurityMapping::as_select())
        .first(conn)
        .optional()?)
}

/// Writes a lookup outcome: updates the active row in place, or creates one.
pub fn upsert_mapping(
    conn: &mut SqliteConnection,
    kind: IdentifierKind,
    value: &str,
    ticker: Option<&str>,
    has_no_results: bool,
) -> anyhow::Result<()> {
    use crate::schema::security_mappings::dsl as sm;
    let now = time::now_rfc3339_millis();

    match active_mapping(conn, kind, value)? {
        Some(existing) => {
            diesel::update(sm::security_mappings.filter(sm::id.eq(existing.id)))
                .set((
                    sm::ticker.eq(ticker),
                    sm::has_no_results.eq(has_no_results),
                    sm::last_fetched_date.eq(&now),
                    sm::updated_at.eq(&now),
                ))
                .execute(conn)?;
        }
        None => {
            diesel::insert_into(security_mappings::table)
                .values(NewSecurityMapping {
                    identifier_type: kind.as_str(),
                    identifier_value: value,
                    ticker,
                    has_no_results,
                    start_date: &now,
                    last_fetched_date: &now,
                    created_at: &now,
                    updated_at: &now,
                })
                .execute(conn)?;
        }
    }
    Ok(())
}

/// Active mappings whose last fetch is older than `max_age_days`.
pub fn find_stale(
    conn: &mut SqliteConnection,
    max_age_days: i64,
) -> anyhow::Result<Vec<SecurityMapping>> {
    use crate::schema::security_mappings::dsl as sm;
    let cutoff = time::to_rfc3339_millis(chrono::Utc::now() - chrono::Duration::days(max_age_days));

    Ok(sm::security_mappings
        .filter(sm::end_date.is_null())
        .filter(sm::last_fetched_date.lt(cutoff))
        .order(sm::last_fetched_date.asc())
        .select(SecurityMapping::as_select())
        .load(conn)?)
}

/// Invalidates the active mapping for an identifier by setting `end_date`.
///
/// Returns whether an active mapping existed. After invalidation a new
/// active row may be created by the next lookup.
pub fn invalidate_mapping(
    conn: &mut SqliteConnection,
    kind: IdentifierKind,
    value: &str,
) -> anyhow::Result<bool> {
    use crate::schema::security_mappings::dsl as sm;
    let now = time::now_rfc3339_millis();

    let updated = diesel::update(
        sm::security_mappings
            .filter(sm::identifier_type.eq(kind.as_str()))
            .filter(sm::identifier_value.eq(value))
            .filter(sm::end_date.is_null()),
    )
    .set((sm::end_date.eq(&now), sm::updated_at.eq(&now)))
    .execute(conn)?;
    Ok(updated > 0)
}

/// Manual cache clear: end-dates every active mapping.
///
/// Returns the number of mappings cleared.
pub fn clear_cache(conn: &mut SqliteConnection) -> anyhow::Result<usize> {
    use crate::schema::security_mappings::dsl as sm;
    let now = time::now_rfc3339_millis();

    let cleared = diesel::update(sm::security_mappings.filter(sm::end_date.is_null()))
        .set((sm::end_date.eq(&now), sm::updated_at.eq(&now)))
        .execute(conn)?;
    info!(cleared, "cache cleared");
    Ok(cleared)
}

/// Counts over the active cache.
pub fn cache_stats(conn: &mut SqliteConnection) -> anyhow::Result<CacheStats> {
    use crate::schema::security_mappings::dsl as sm;

    Ok(CacheStats {
        total_cached: sm::security_mappings
            .filter(sm::end_date.is_null())
            .count()
            .get_result(conn)?,
        found_cached: sm::security_mappings
            .filter(sm::end_date.is_null())
            .filter(sm::has_no_results.eq(false))
            .filter(sm::ticker.is_not_null())
            .count()
            .get_result(conn)?,
        not_found_cached: sm::security_mappings
            .filter(sm::end_date.is_null())
            .filter(sm::has_no_results.eq(true))
            .count()
            .get_result(conn)?,
    })
}

/// One-time, idempotent import of a legacy flat-file cache.
///
/// The file is a JSON object of `identifier → ticker`; the identifier type
/// is inferred from the value length (9 → CUSIP, 12 → ISIN), anything else
/// is skipped with a warning. Returns the number of entries imported.
pub fn import_legacy_cache(conn: &mut SqliteConnection, path: &Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let entries: serde_json::Map<String, Value> = serde_json::from_str(&raw)?;

    let mut imported = 0;
    for (identifier, ticker) in &entries {
        let Some(kind) = IdentifierKind::infer(identifier) else {
            warn!(identifier, "skipping legacy entry with unrecognized identifier shape");
            continue;
        };
        let Some(ticker) = ticker.as_str() else {
            warn!(identifier, "skipping legacy entry with non-string ticker");
            continue;
        };
        upsert_mapping(conn, kind, identifier, Some(ticker), false)?;
        imported += 1;
    }

    info!(imported, total = entries.len(), "legacy cache import complete");
    Ok(imported)
}
