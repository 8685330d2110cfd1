//! Per-filing processing state machine.
//!
//! Each filing carries two orthogonal status axes: download
//! (`pending -> downloaded | failed`) and processing
//! (`pending -> processed | failed`, meaningful once downloaded). Stage
//! runners are pure "select pending → act → update status" loops, so a crash
//! mid-stage leaves rows in a well-defined state the next run re-selects.
//!
//! Records are inserted with `ON CONFLICT DO NOTHING` against the
//! (`series_code`, `accession_number`, `form_type`) natural key, which is
//! what makes re-discovery and concurrent runs safe; rows are never deleted.

use std::str::FromStr;

use diesel::prelude::*;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::{NewSecReport, SecReport};
use crate::schema::sec_reports;
use crate::time;
use filing_ingestor::models::FilingCandidate;

/// A status string in the database was not a recognized value.
#[derive(Debug, Error)]
#[error("unrecognized status value: {0}")]
pub struct StatusParseError(String);

/// Download axis states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Not yet attempted (or reset for retry).
    Pending,
    /// Document saved to the data directory.
    Downloaded,
    /// Last download attempt failed; see `error_message`.
    Failed,
}

impl DownloadStatus {
    /// The text stored in the `download_status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DownloadStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloaded" => Ok(Self::Downloaded),
            "failed" => Ok(Self::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// Processing axis states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Not yet attempted (or reset for retry).
    Pending,
    /// Holdings artifact extracted.
    Processed,
    /// Last processing attempt failed; see `error_message`.
    Failed,
}

impl ProcessingStatus {
    /// The text stored in the `processing_status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// Records discovered filings, skipping any that already exist.
///
/// Returns the number of rows actually inserted.
pub fn record_filings(
    conn: &mut SqliteConnection,
    candidates: &[FilingCandidate],
) -> anyhow::Result<usize> {
    let now = time::now_rfc3339_millis();
    let mut inserted = 0;

    for candidate in candidates {
        let row = NewSecReport {
            series_code: &candidate.series_code,
            accession_number: &candidate.accession_number,
            form_type: &candidate.form_type,
            filing_date: candidate.filing_date.map(time::to_ymd),
            report_date: candidate.report_date.map(time::to_ymd),
            download_status: DownloadStatus::Pending.as_str(),
            processing_status: ProcessingStatus::Pending.as_str(),
            created_at: &now,
            updated_at: &now,
        };
        inserted += diesel::insert_into(sec_reports::table)
            .values(&row)
            .on_conflict((
                sec_reports::series_code,
                sec_reports::accession_number,
                sec_reports::form_type,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    debug!(inserted, total = candidates.len(), "recorded filings");
    Ok(inserted)
}

/// Moves one filing along the download axis, optionally attaching artifact
/// paths and an error message.
pub fn update_download_status(
    conn: &mut SqliteConnection,
    report_id: i32,
    status: DownloadStatus,
    artifacts: &[(&str, &str)],
    error: Option<&str>,
) -> anyhow::Result<()> {
    use crate::schema::sec_reports::dsl as sr;
    let now = time::now_rfc3339_millis();

    let merged = merge_artifacts(conn, report_id, artifacts)?;
    diesel::update(sr::sec_reports.filter(sr::id.eq(report_id)))
        .set((
            sr::download_status.eq(status.as_str()),
            sr::file_paths.eq(merged),
            sr::error_message.eq(error),
            sr::updated_at.eq(&now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Moves one filing along the processing axis and stamps
/// `last_processed_at`.
pub fn update_processing_status(
    conn: &mut SqliteConnection,
    report_id: i32,
    status: ProcessingStatus,
    error: Option<&str>,
) -> anyhow::Result<()> {
    use crate::schema::sec_reports::dsl as sr;
    let now = time::now_rfc3339_millis();

    diesel::update(sr::sec_reports.filter(sr::id.eq(report_id)))
        .set((
            sr::processing_status.eq(status.as_str()),
            sr::error_message.eq(error),
            sr::last_processed_at.eq(&now),
            sr::updated_at.eq(&now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Adds one artifact path to a filing's `file_paths` map.
pub fn record_artifact(
    conn: &mut SqliteConnection,
    report_id: i32,
    kind: &str,
    path: &str,
) -> anyhow::Result<()> {
    use crate::schema::sec_reports::dsl as sr;
    let now = time::now_rfc3339_millis();

    let merged = merge_artifacts(conn, report_id, &[(kind, path)])?;
    diesel::update(sr::sec_reports.filter(sr::id.eq(report_id)))
        .set((sr::file_paths.eq(merged), sr::updated_at.eq(&now)))
        .execute(conn)?;
    Ok(())
}

/// Reads one artifact path out of a report's `file_paths` map.
pub fn artifact_path(report: &SecReport, kind: &str) -> Option<String> {
    let raw = report.file_paths.as_deref()?;
    let map: Map<String, Value> = serde_json::from_str(raw).ok()?;
    map.get(kind).and_then(|v| v.as_str()).map(String::from)
}

fn merge_artifacts(
    conn: &mut SqliteConnection,
    report_id: i32,
    artifacts: &[(&str, &str)],
) -> anyhow::Result<Option<String>> {
    use crate::schema::sec_reports::dsl as sr;

    let current: Option<String> = sr::sec_reports
        .filter(sr::id.eq(report_id))
        .select(sr::file_paths)
        .first(conn)?;

    let mut map: Map<String, Value> = current
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    for (kind, path) in artifacts {
        map.insert((*kind).to_string(), Value::String((*path).to_string()));
    }

    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(&map)?))
    }
}

/// Filings awaiting download, optionally narrowed by form type and to the
/// current run's series scope.
pub fn pending_downloads(
    conn: &mut SqliteConnection,
    form_type: Option<&str>,
    scope: Option<&[String]>,
) -> anyhow::Result<Vec<SecReport>> {
    load_reports(conn, DownloadStatus::Pending.as_str(), None, form_type, scope)
}

/// Downloaded filings awaiting processing.
pub fn pending_processing(
    conn: &mut SqliteConnection,
    form_type: Option<&str>,
    scope: Option<&[String]>,
) -> anyhow::Result<Vec<SecReport>> {
    load_reports(
        conn,
        DownloadStatus::Downloaded.as_str(),
        Some(ProcessingStatus::Pending.as_str()),
        form_type,
        scope,
    )
}

/// Fully processed filings, the enrichment stage's input.
pub fn processed_reports(
    conn: &mut SqliteConnection,
    form_type: Option<&str>,
    scope: Option<&[String]>,
) -> anyhow::Result<Vec<SecReport>> {
    load_reports(
        conn,
        DownloadStatus::Downloaded.as_str(),
        Some(ProcessingStatus::Processed.as_str()),
        form_type,
        scope,
    )
}

fn load_reports(
    conn: &mut SqliteConnection,
    download: &str,
    processing: Option<&str>,
    form_type: Option<&str>,
    scope: Option<&[String]>,
) -> anyhow::Result<Vec<SecReport>> {
    use crate::schema::sec_reports::dsl as sr;

    let mut query = sr::sec_reports
        .filter(sr::download_status.eq(download))
        .select(SecReport::as_select())
        .into_boxed();
    if let Some(processing) = processing {
        query = query.filter(sr::processing_status.eq(processing));
    }
    if let Some(form_type) = form_type {
        query = query.filter(sr::form_type.eq(form_type));
    }
    if let Some(scope) = scope {
        query = query.filter(sr::series_code.eq_any(scope));
    }

    Ok(query.order(sr::id.asc()).load(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            DownloadStatus::Pending,
            DownloadStatus::Downloaded,
            DownloadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DownloadStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<DownloadStatus>().is_err());
        assert!("processed".parse::<ProcessingStatus>().is_ok());
    }
}
