//! Streaming parser for N-PORT primary documents.
//!
//! Pulls fund-level information and the per-holding security entries out of
//! `primary_doc.xml` without building a DOM. Element names are matched by
//! local name, so the parser is indifferent to the namespace prefixes EDGAR
//! emits. Missing elements produce `None` fields rather than errors; only
//! malformed XML fails the parse.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Parse failure for a primary document.
#[derive(Debug, Error)]
pub enum NportError {
    /// The document is not well-formed XML.
    #[error("malformed N-PORT document: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Fund-level information from the document header sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundInfo {
    /// Series display name (`seriesName`).
    pub series_name: Option<String>,
    /// Series code (`seriesId`), e.g. `S000004310`.
    pub series_code: Option<String>,
    /// Registrant name (`regName`).
    pub registrant_name: Option<String>,
    /// Registrant CIK (`regCik`).
    pub registrant_cik: Option<String>,
    /// End of the reporting period (`repPdEnd`), `YYYY-MM-DD`.
    pub report_period_end: Option<String>,
    /// As-of date of the report (`repPdDate`), `YYYY-MM-DD`.
    pub report_period_date: Option<String>,
    /// Total assets in USD (`totAssets`).
    pub total_assets: Option<f64>,
    /// Net assets in USD (`netAssets`).
    pub net_assets: Option<f64>,
}

/// One portfolio holding (`invstOrSec` entry).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Issuer name.
    pub name: Option<String>,
    /// Issue title.
    pub title: Option<String>,
    /// Legal entity identifier.
    pub lei: Option<String>,
    /// CUSIP; `None` when absent, empty, or the `N/A` placeholder.
    pub cusip: Option<String>,
    /// ISIN, read from the `value` attribute of the `isin` element.
    pub isin: Option<String>,
    /// Balance (share count or notional).
    pub balance: Option<f64>,
    /// Reporting currency code.
    pub currency: Option<String>,
    /// Value in USD.
    pub value_usd: Option<f64>,
    /// Percentage of net assets.
    pub percent_value: Option<f64>,
}

/// A fully parsed primary document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NportDocument {
    /// Fund-level header information.
    pub fund: FundInfo,
    /// Portfolio holdings in document order.
    pub holdings: Vec<Holding>,
}

/// Parses a primary document.
///
/// Logs the share of holdings missing a CUSIP as a data-quality warning;
/// those holdings fall through to ISIN resolution downstream.
pub fn parse_document(xml: &str) -> Result<NportDocument, NportError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = NportDocument::default();
    let mut holding: Option<Holding> = None;
    let mut element: Vec<u8> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"invstOrSec" {
                    holding = Some(Holding::default());
                }
                if name == b"isin" {
                    if let (Some(h), Some(value)) = (holding.as_mut(), attr_value(&e)) {
                        h.isin = non_empty(value);
                    }
                }
                element = name;
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"isin" {
                    if let (Some(h), Some(value)) = (holding.as_mut(), attr_value(&e)) {
                        h.isin = non_empty(value);
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"invstOrSec" {
                    if let Some(h) = holding.take() {
                        doc.holdings.push(h);
                    }
                }
                element.clear();
            }
            Event::Text(t) => {
                let text = match t.unescape() {
                    Ok(cow) => cow.trim().to_string(),
                    Err(_) => continue,
                };
                if text.is_empty() {
                    continue;
                }
                apply_text(&mut doc.fund, holding.as_mut(), &element, text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(h) = holding.take() {
        // Truncated document: keep what was parsed of the last entry.
        doc.holdings.push(h);
    }

    report_missing_cusips(&doc.holdings);
    Ok(doc)
}

fn apply_text(fund: &mut FundInfo, holding: Option<&mut Holding>, element: &[u8], text: String) {
    if let Some(h) = holding {
        match element {
            b"name" => h.name = Some(text),
            b"title" => h.title = Some(text),
            b"lei" => h.lei = non_empty(text),
            b"cusip" => h.cusip = non_empty(text),
            b"balance" => h.balance = text.parse().ok(),
            b"curCd" => h.currency = Some(text),
            b"valUSD" => h.value_usd = text.parse().ok(),
            b"pctVal" => h.percent_value = text.parse().ok(),
            _ => {}
        }
        return;
    }
    match element {
        b"seriesName" => fund.series_name = Some(text),
        b"seriesId" => fund.series_code = Some(text),
        b"regName" => fund.registrant_name = Some(text),
        b"regCik" => fund.registrant_cik = Some(text),
        b"repPdEnd" => fund.report_period_end = Some(text),
        b"repPdDate" => fund.report_period_date = Some(text),
        b"totAssets" => fund.total_assets = text.parse().ok(),
        b"netAssets" => fund.net_assets = text.parse().ok(),
        _ => {}
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == b"value" {
            attr.unescape_value().ok().map(|v| v.to_string())
        } else {
            None
        }
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "N/A" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn report_missing_cusips(holdings: &[Holding]) {
    let total = holdings.len();
    if total == 0 {
        return;
    }
    let missing = holdings.iter().filter(|h| h.cusip.is_none()).count();
    if missing > 0 {
        warn!(
            missing,
            total,
            share = format!("{:.1}%", missing as f64 / total as f64 * 100.0),
            "holdings without a CUSIP"
        );
    }
}
