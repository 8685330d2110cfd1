//! Filings-by-series page parsing.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::html;
use crate::models::FilingCandidate;

/// Accession numbers as they appear in row text, e.g.
/// `Acc-no: 0001752724-25-119791`. The authoritative source: link hrefs are
/// sometimes absent or malformed.
static ACC_NO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Acc-no:\s*(\d{10}-\d{2}-\d{6})").expect("static regex"));
static ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{10}-\d{2}-\d{6}$").expect("static regex"));
static ACCESSION_DIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{18}$").expect("static regex"));
static DATE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static regex"));

/// Parses one filings page into candidates for `form_type`.
///
/// Rows mentioning the form type are scanned for an accession number, first
/// in the visible text, then in an `Archives/edgar/data` link path; rows
/// without one are dropped. The first two date-shaped tokens in the row text
/// become filing and report date. Pages with no structured rows degrade to a
/// link scan.
pub fn parse_filings_page(page: &str, series_code: &str, form_type: &str) -> Vec<FilingCandidate> {
    let mut filings = Vec::new();

    for table in html::extract_tables(page) {
        for row in &table.rows {
            if row.cells.len() < 4 {
                continue;
            }
            let text = row.text();
            if !text.contains(form_type) {
                continue;
            }

            let accession = accession_from_text(&text)
                .or_else(|| accession_from_hrefs(&row.hrefs));
            let Some(accession_number) = accession else {
                debug!(series = series_code, "dropping filing row without accession number");
                continue;
            };

            let (filing_date, report_date) = dates_from_text(&text);
            filings.push(FilingCandidate {
                series_code: series_code.to_string(),
                form_type: form_type.to_string(),
                accession_number,
                filing_date,
                report_date,
            });
        }
    }

    // No structured rows at all: scan bare links whose text mentions the form.
    if filings.is_empty() {
        filings = link_scan(page, series_code, form_type);
    }

    filings
}

fn accession_from_text(text: &str) -> Option<String> {
    ACC_NO_RE.captures(text).map(|c| c[1].to_string())
}

/// Fallback extraction from `Archives/edgar/data/<cik>/<accession>` paths.
///
/// The path segment is either already dashed or an 18-digit directory name,
/// which is re-dashed into canonical form.
fn accession_from_hrefs(hrefs: &[String]) -> Option<String> {
    for href in hrefs {
        if !href.contains("Archives/edgar/data") {
            continue;
        }
        for segment in href.split('/') {
            if ACCESSION_RE.is_match(segment) {
                return Some(segment.to_string());
            }
            if ACCESSION_DIR_RE.is_match(segment) {
                return Some(format!(
                    "{}-{}-{}",
                    &segment[..10],
                    &segment[10..12],
                    &segment[12..]
                ));
            }
        }
    }
    None
}

fn dates_from_text(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let mut dates = DATE_TOKEN_RE
        .find_iter(text)
        .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok());
    (dates.next(), dates.next())
}

fn link_scan(page: &str, series_code: &str, form_type: &str) -> Vec<FilingCandidate> {
    let form_lower = form_type.to_lowercase();
    let mut filings = Vec::new();
    for table in html::extract_tables(page) {
        for row in &table.rows {
            if !row.text().to_lowercase().contains(&form_lower) {
                continue;
            }
            if let Some(accession_number) = accession_from_hrefs(&row.hrefs) {
                filings.push(FilingCandidate {
                    series_code: series_code.to_string(),
                    form_type: form_type.to_string(),
                    accession_number,
                    filing_date: None,
                    report_date: None,
                });
            }
        }
    }
    filings
}
