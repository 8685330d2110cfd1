//! Type 6 SCD service for fund series and class history.
//!
//! One discovery batch is applied in a single immediate transaction: either
//! the whole batch lands or none of it does. Existing current rows are loaded
//! with one query per entity kind, keeping the cost linear in distinct codes
//! rather than in records.
//!
//! Series carry no mutable attributes in this design, so a verification that
//! finds an existing current row only bumps `last_verified_date`. Classes
//! track `class_name` and `ticker`: any difference closes the current row and
//! opens a new one whose `change_reason` enumerates the before/after values;
//! no difference bumps `last_verified_date` only, keeping history compact.

use std::collections::{HashMap, HashSet};

use diesel::prelude::*;
use filing_ingestor::models::{ClassCandidate, SeriesCandidate};
use tracing::{info, warn};

use crate::models::{FundClass, FundSeries, NewFundClass, NewFundSeries};
use crate::schema::{fund_classes, fund_series};
use crate::time;

/// Source tag written on every row this service creates.
const SOURCE: &str = "sec_api";

/// Counters returned by [`upsert_series_batch`] for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Series codes seen for the first time.
    pub series_new: usize,
    /// Series codes whose current row was re-verified.
    pub series_verified: usize,
    /// Series codes rejected by format validation.
    pub series_skipped_invalid: usize,
    /// Class codes seen for the first time.
    pub classes_new: usize,
    /// Class codes whose tracked attributes changed (row closed + reopened).
    pub classes_updated: usize,
    /// Class codes re-verified without change.
    pub classes_verified: usize,
    /// Class codes rejected by format validation.
    pub classes_skipped_invalid: usize,
}

/// Aggregate row counts over the SCD tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScdStats {
    /// Series rows with `is_current = true`.
    pub current_series: i64,
    /// Class rows with `is_current = true`.
    pub current_classes: i64,
    /// All series rows, history included.
    pub total_series_history: i64,
    /// All class rows, history included.
    pub total_classes_history: i64,
}

/// True when `code` looks like a SEC series identifier, e.g. `S000004310`.
///
/// Letter prefix plus an all-digit suffix, total length 10 to 15.
pub fn valid_series_code(code: &str) -> bool {
    valid_code(code, 'S')
}

/// True when `code` looks like a SEC class identifier, e.g. `C000219740`.
pub fn valid_class_code(code: &str) -> bool {
    valid_code(code, 'C')
}

fn valid_code(code: &str, prefix: char) -> bool {
    (10..=15).contains(&code.len())
        && code.starts_with(prefix)
        && code[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Applies one discovery batch for an issuer.
///
/// Idempotent: re-applying the same batch produces no new rows and only
/// advances `last_verified_date`. Invalid codes are counted and skipped,
/// never inserted. The whole batch commits atomically; any failure rolls it
/// back and propagates.
pub fn upsert_series_batch(
    conn: &mut SqliteConnection,
    issuer_id: i32,
    batch: &[SeriesCandidate],
) -> anyhow::Result<UpsertStats> {
    let now = time::now_rfc3339_millis();
    let mut stats = UpsertStats::default();

    // Validate up front, deduplicating repeats (cross-page duplicates are
    // expected from discovery; the first occurrence wins).
    let mut series_codes: Vec<&str> = Vec::new();
    let mut seen_series: HashSet<&str> = HashSet::new();
    let mut class_rows: Vec<(&str, &ClassCandidate)> = Vec::new();
    let mut seen_classes: HashSet<&str> = HashSet::new();

    for series in batch {
        if !valid_series_code(&series.series_code) {
            warn!(code = %series.series_code, "skipping invalid series code");
            stats.series_skipped_invalid += 1;
            continue;
        }
        if seen_series.insert(&series.series_code) {
            series_codes.push(&series.series_code);
        }
        for class in &series.classes {
            if !valid_class_code(&class.class_code) {
                warn!(code = %class.class_code, "skipping invalid class code");
                stats.classes_skipped_invalid += 1;
                continue;
            }
            if seen_classes.insert(&class.class_code) {
                class_rows.push((&series.series_code, class));
            }
        }
    }

    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let existing_series: HashMap<String, FundSeries> = {
            use crate::schema::fund_series::dsl as fs;
            fs::fund_series
                .filter(fs::issuer_id.eq(issuer_id))
                .filter(fs::series_code.eq_any(series_codes.iter().copied()))
                .filter(fs::is_current.eq(true))
                .select(FundSeries::as_select())
                .load(conn)?
                .into_iter()
                .map(|s| (s.series_code.clone(), s))
                .collect()
        };

        let class_codes: Vec<&str> = class_rows.iter().map(|(_, c)| c.class_code.as_str()).collect();
        let existing_classes: HashMap<String, FundClass> = {
            use crate::schema::fund_classes::dsl as fc;
            fc::fund_classes
                .filter(fc::class_code.eq_any(class_codes.iter().copied()))
                .filter(fc::is_current.eq(true))
                .select(FundClass::as_select())
                .load(conn)?
                .into_iter()
                .map(|c| (c.class_code.clone(), c))
                .collect()
        };

        for code in &series_codes {
            match existing_series.get(*code) {
                Some(current) => {
                    use crate::schema::fund_series::dsl as fs;
                    diesel::update(fs::fund_series.filter(fs::id.eq(current.id)))
                        .set((fs::last_verified_date.eq(&now), fs::updated_at.eq(&now)))
                        .execute(conn)?;
                    stats.series_verified += 1;
                }
                None => {
                    diesel::insert_into(fund_series::table)
                        .values(NewFundSeries {
                            issuer_id,
                            series_code: code,
                            is_current: true,
                            effective_date: &now,
                            source: SOURCE,
                            last_verified_date: &now,
                            created_at: &now,
                            updated_at: &now,
                        })
                        .execute(conn)?;
                    stats.series_new += 1;
                }
            }
        }

        for (series_code, class) in &class_rows {
            match existing_classes.get(class.class_code.as_str()) {
                Some(current) => {
                    let changes = diff_class(current, class);
                    if changes.is_empty() {
                        use crate::schema::fund_classes::dsl as fc;
                        diesel::update(fc::fund_classes.filter(fc::id.eq(current.id)))
                            .set((fc::last_verified_date.eq(&now), fc::updated_at.eq(&now)))
                            .execute(conn)?;
                        stats.classes_verified += 1;
                    } else {
                        let reason = changes.join("; ");
                        info!(code = %class.class_code, %reason, "class attributes changed");

                        use crate::schema::fund_classes::dsl as fc;
                        diesel::update(fc::fund_classes.filter(fc::id.eq(current.id)))
                            .set((
                                fc::is_current.eq(false),
                                fc::end_date.eq(&now),
                                fc::updated_at.eq(&now),
                            ))
                            .execute(conn)?;

                        insert_class(conn, series_code, class, &now, Some(&reason))?;
                        stats.classes_updated += 1;
                    }
                }
                None => {
                    insert_class(conn, series_code, class, &now, Some("new_record"))?;
                    stats.classes_new += 1;
                }
            }
        }

        Ok(())
    })?;

    Ok(stats)
}

fn insert_class(
    conn: &mut SqliteConnection,
    series_code: &str,
    class: &ClassCandidate,
    now: &str,
    change_reason: Option<&str>,
) -> anyhow::Result<()> {
    diesel::insert_into(fund_classes::table)
        .values(NewFundClass {
            series_code,
            class_code: &class.class_code,
            class_name: class.class_name.as_deref(),
            ticker: class.ticker.as_deref(),
            is_current: true,
            effective_date: now,
            change_reason,
            source: SOURCE,
            last_verified_date: now,
            created_at: now,
            updated_at: now,
        })
        .execute(conn)?;
    Ok(())
}

fn diff_class(current: &FundClass, candidate: &ClassCandidate) -> Vec<String> {
    let mut changes = Vec::new();
    if current.class_name != candidate.class_name {
        changes.push(format!(
            "name: '{}' → '{}'",
            current.class_name.as_deref().unwrap_or("none"),
            candidate.class_name.as_deref().unwrap_or("none"),
        ));
    }
    if current.ticker != candidate.ticker {
        changes.push(format!(
            "ticker: '{}' → '{}'",
            current.ticker.as_deref().unwrap_or("none"),
            candidate.ticker.as_deref().unwrap_or("none"),
        ));
    }
    changes
}

/// Current series rows for an issuer, ordered by series code.
pub fn current_series_for_issuer(
    conn: &mut SqliteConnection,
    issuer_id: i32,
) -> anyhow::Result<Vec<FundSeries>> {
    use crate::schema::fund_series::dsl as fs;
    Ok(fs::fund_series
        .filter(fs::issuer_id.eq(issuer_id))
        .filter(fs::is_current.eq(true))
        .order(fs::series_code.asc())
        .select(FundSeries::as_select())
        .load(conn)?)
}

/// Current class rows for a series, ordered by class code.
pub fn current_classes_for_series(
    conn: &mut SqliteConnection,
    series_code: &str,
) -> anyhow::Result<Vec<FundClass>> {
    use crate::schema::fund_classes::dsl as fc;
    Ok(fc::fund_classes
        .filter(fc::series_code.eq(series_code))
        .filter(fc::is_current.eq(true))
        .order(fc::class_code.asc())
        .select(FundClass::as_select())
        .load(conn)?)
}

/// Full history for one class code, oldest row first.
pub fn class_history(
    conn: &mut SqliteConnection,
    class_code: &str,
) -> anyhow::Result<Vec<FundClass>> {
    use crate::schema::fund_classes::dsl as fc;
    Ok(fc::fund_classes
        .filter(fc::class_code.eq(class_code))
        .order(fc::effective_date.asc())
        .select(FundClass::as_select())
        .load(conn)?)
}

/// Aggregate current-vs-history row counts.
pub fn scd_stats(conn: &mut SqliteConnection) -> anyhow::Result<ScdStats> {
    use crate::schema::fund_classes::dsl as fc;
    use crate::schema::fund_series::dsl as fs;

    Ok(ScdStats {
        current_series: fs::fund_series
            .filter(fs::is_current.eq(true))
            .count()
            .get_result(conn)?,
        current_classes: fc::fund_classes
            .filter(fc::is_current.eq(true))
            .count()
            .get_result(conn)?,
        total_series_history: fs::fund_series.count().get_result(conn)?,
        total_classes_history: fc::fund_classes.count().get_result(conn)?,
    })
}
