//! Series lookup page parsing.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::html::{self, HtmlTable};
use crate::models::{ClassCandidate, ParseMethod, SeriesCandidate};

static SERIES_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"S\d{9}").expect("static regex"));
static START_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"start=(\d+)").expect("static regex"));

/// Parses one series lookup page into candidates.
///
/// The structured path looks for the first table whose header row mentions
/// CIK/Series/Class, then groups rows: a row whose second cell starts with
/// `S` opens a series, and the rows that follow (until the next such row) are
/// its classes with code/name/ticker in cell positions 2/3/4. When no
/// structured table matches, series-code-shaped tokens are mined from the
/// page text and tagged [`ParseMethod::RegexFallback`].
pub fn parse_series_page(page: &str, cik: &str) -> Vec<SeriesCandidate> {
    let tables = html::extract_tables(page);
    let mut candidates = Vec::new();

    if let Some((table, header_idx)) = find_series_table(&tables) {
        let mut current: Option<SeriesCandidate> = None;

        for row in &table.rows[header_idx + 1..] {
            let cells = &row.cells;
            if cells.len() < 2 {
                continue;
            }
            // Skip blank spacer rows and navigation chrome.
            if cells.iter().all(|c| c.is_empty()) || row.text().contains("Home") {
                continue;
            }

            if cells[1].starts_with('S') {
                if let Some(series) = current.take() {
                    candidates.push(series);
                }
                current = Some(SeriesCandidate {
                    cik: cik.to_string(),
                    series_code: cells[1].clone(),
                    classes: Vec::new(),
                    parse_method: ParseMethod::Structured,
                });
            } else if let Some(series) = current.as_mut() {
                if let Some(class) = parse_class_row(cells) {
                    debug!(series = %series.series_code, class = %class.class_code, "found class row");
                    series.classes.push(class);
                }
            }
        }
        if let Some(series) = current.take() {
            candidates.push(series);
        }
    }

    if candidates.is_empty() {
        let text = html::strip_tags(page);
        let codes: BTreeSet<&str> = SERIES_CODE_RE
            .find_iter(&text)
            .map(|m| m.as_str())
            .collect();
        if !codes.is_empty() {
            warn!(cik, "no structured series table found, falling back to text mining");
        }
        candidates = codes
            .into_iter()
            .map(|code| SeriesCandidate {
                cik: cik.to_string(),
                series_code: code.to_string(),
                classes: Vec::new(),
                parse_method: ParseMethod::RegexFallback,
            })
            .collect();
    }

    candidates
}

/// True when any link on the page points at a larger `start=` offset than the
/// one just fetched.
///
/// Inherited best-effort heuristic: EDGAR exposes no authoritative total
/// count, so continuation is inferred from pagination links ("Next",
/// page-number anchors), all of which carry a `start=` parameter.
pub fn has_more_pages(page: &str, current_start: usize) -> bool {
    html::extract_hrefs(page).iter().any(|href| {
        START_PARAM_RE
            .captures(href)
            .and_then(|c| c[1].parse::<usize>().ok())
            .is_some_and(|next| next > current_start)
    })
}

fn find_series_table(tables: &[HtmlTable]) -> Option<(&HtmlTable, usize)> {
    for table in tables {
        for (idx, row) in table.rows.iter().enumerate() {
            let is_header = row
                .cells
                .iter()
                .any(|c| c.contains("CIK") || c.contains("Series") || c.contains("Class"));
            if is_header {
                return Some((table, idx));
            }
        }
    }
    None
}

fn parse_class_row(cells: &[String]) -> Option<ClassCandidate> {
    let class_code = cells.get(2)?.trim();
    if class_code.is_empty() {
        return None;
    }
    Some(ClassCandidate {
        class_code: class_code.to_string(),
        class_name: cells.get(3).map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from),
        ticker: cells.get(4).map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURED_PAGE: &str = r#"
        <html><body><table>
          <tr><td>CIK</td><td>Series</td><td>Class</td><td>Name</td><td>Ticker</td></tr>
          <tr><td>1100663</td><td>S000004310</td><td></td><td></td><td></td></tr>
          <tr><td></td><td></td><td>C000219740</td><td>iShares 0-3 Month Treasury Bond ETF</td><td>SGOV</td></tr>
          <tr><td></td><td></td><td>C000012346</td><td>Institutional Class</td><td></td></tr>
          <tr><td>1100663</td><td>S000004311</td><td></td><td></td><td></td></tr>
          <tr><td></td><td></td><td>C000012400</td><td>Investor Class</td><td>IVV</td></tr>
        </table></body></html>"#;

    #[test]
    fn groups_class_rows_under_their_series() {
        let series = parse_series_page(STRUCTURED_PAGE, "0001100663");
        assert_eq!(series.len(), 2);

        assert_eq!(series[0].series_code, "S000004310");
        assert_eq!(series[0].parse_method, ParseMethod::Structured);
        assert_eq!(series[0].classes.len(), 2);
        assert_eq!(series[0].classes[0].class_code, "C000219740");
        assert_eq!(
            series[0].classes[0].class_name.as_deref(),
            Some("iShares 0-3 Month Treasury Bond ETF")
        );
        assert_eq!(series[0].classes[0].ticker.as_deref(), Some("SGOV"));
        assert_eq!(series[0].classes[1].ticker, None);

        assert_eq!(series[1].series_code, "S000004311");
        assert_eq!(series[1].classes.len(), 1);
    }

    #[test]
    fn falls_back_to_text_mining_without_a_table() {
        let page = "<html><p>Results: S000004310 and S000099999 (S000004310 repeated)</p></html>";
        let series = parse_series_page(page, "0001100663");
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|s| s.parse_method == ParseMethod::RegexFallback));
        assert!(series.iter().all(|s| s.classes.is_empty()));
        let codes: Vec<_> = series.iter().map(|s| s.series_code.as_str()).collect();
        assert_eq!(codes, vec!["S000004310", "S000099999"]);
    }

    #[test]
    fn empty_page_yields_no_candidates() {
        assert!(parse_series_page("<html><body>No matching funds.</body></html>", "0001").is_empty());
    }

    #[test]
    fn continuation_requires_a_larger_start_offset() {
        let page = r#"<a href="/cgi-bin/series?CIK=1100663&start=500&count=500">Next 500</a>"#;
        assert!(has_more_pages(page, 0));
        assert!(!has_more_pages(page, 500));

        let no_links = "<html><body>done</body></html>";
        assert!(!has_more_pages(no_links, 0));
    }
}
