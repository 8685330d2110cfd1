//! Typed candidate records produced by the discovery scraper.
//!
//! Discovery hands these to the store crate, which validates codes again at
//! the persistence boundary; nothing downstream ever sees a loosely-shaped
//! row. The [`ParseMethod`] tag lets consumers weight confidence when the
//! scraper had to fall back to text mining.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a series candidate was extracted from a result page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMethod {
    /// Parsed from a recognized HTML table; class rows were available.
    Structured,
    /// Mined from the page text by series-code shape alone; low confidence,
    /// no class details.
    RegexFallback,
}

/// A fund series discovered on an organization's series lookup page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesCandidate {
    /// Registrant CIK, zero-padded to 10 digits.
    pub cik: String,
    /// Series code, e.g. `S000004310`.
    pub series_code: String,
    /// Share classes grouped under this series (empty for regex fallback).
    pub classes: Vec<ClassCandidate>,
    /// Extraction confidence tag.
    pub parse_method: ParseMethod,
}

/// A tradable share class row grouped under a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCandidate {
    /// Class code, e.g. `C000219740`.
    pub class_code: String,
    /// Display name, when the row carried one.
    pub class_name: Option<String>,
    /// Ticker symbol, when the row carried one.
    pub ticker: Option<String>,
}

/// One filing row discovered on a filings-by-series page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingCandidate {
    /// Series the filing belongs to.
    pub series_code: String,
    /// Form type the row matched, e.g. `NPORT-P`.
    pub form_type: String,
    /// Accession number in dashed form, e.g. `0001752724-25-119791`.
    pub accession_number: String,
    /// Filing date when one could be inferred from the row text.
    pub filing_date: Option<NaiveDate>,
    /// Report date when one could be inferred from the row text.
    pub report_date: Option<NaiveDate>,
}
