//! Tolerant HTML table extraction.
//!
//! EDGAR result pages guarantee no fixed markup, so this module avoids a DOM
//! library in favor of case-insensitive tag-block scanning: find `<table>`
//! blocks, split them into `<tr>` rows and `<td>`/`<th>` cells, strip tags,
//! normalize entities and whitespace. Nested tables surface their rows in the
//! outer block too; the header-detection predicate upstream picks the right
//! table regardless.

use once_cell::sync::Lazy;
use regex::Regex;

static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']?([^"'\s>]+)"#).expect("static regex"));

/// One table row: cell texts (tag-stripped, whitespace-normalized) plus every
/// link target that appeared anywhere in the row.
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    /// Cell texts in document order.
    pub cells: Vec<String>,
    /// `href` values found in the row, in document order.
    pub hrefs: Vec<String>,
}

impl TableRow {
    /// All cell texts joined with a space, for row-level text matching.
    pub fn text(&self) -> String {
        self.cells.join(" ")
    }
}

/// A parsed `<table>` block.
#[derive(Debug, Clone, Default)]
pub struct HtmlTable {
    /// Rows in document order.
    pub rows: Vec<TableRow>,
}

/// Extracts every `<table>` block from `html`, outermost first.
pub fn extract_tables(html: &str) -> Vec<HtmlTable> {
    find_blocks(html, "table")
        .into_iter()
        .map(parse_table)
        .collect()
}

/// Extracts every `href` target in `html`, in document order.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect()
}

/// Drops all tags from `html` and normalizes entities and whitespace.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Tag boundaries separate words in the rendered page.
                out.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    normalize_text(&out)
}

/// Decodes the handful of entities EDGAR pages actually use and collapses
/// runs of whitespace into single spaces.
pub fn normalize_text(text: &str) -> String {
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds each `<tag ...> ... </tag>` block, case-insensitively.
///
/// No nesting bookkeeping: an inner block ends the outer one early, but each
/// opening tag still yields its own block, so no content is lost.
fn find_blocks<'a>(html: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let after = start + open.len();
        // Require a real tag boundary so "<table" does not match "<tablex".
        match lower.as_bytes().get(after) {
            Some(b' ') | Some(b'>') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {}
            _ => {
                pos = after;
                continue;
            }
        }
        let body_start = match lower[start..].find('>') {
            Some(i) => start + i + 1,
            None => break,
        };
        let end = lower[body_start..]
            .find(&close)
            .map(|i| body_start + i)
            .unwrap_or(html.len());
        blocks.push(&html[body_start..end]);
        pos = body_start;
    }
    blocks
}

fn parse_table(block: &str) -> HtmlTable {
    let rows = split_on_tag(block, "tr")
        .into_iter()
        .map(parse_row)
        .collect();
    HtmlTable { rows }
}

fn parse_row(row: &str) -> TableRow {
    let cells = split_on_cells(row)
        .into_iter()
        .map(strip_tags)
        .collect();
    TableRow {
        cells,
        hrefs: extract_hrefs(row),
    }
}

/// Splits `html` into chunks starting at each `<tag` and running to the next
/// occurrence (or the end). Unclosed tags, the norm on EDGAR pages, are fine.
fn split_on_tag<'a>(html: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let mut starts = Vec::new();
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let after = start + open.len();
        match lower.as_bytes().get(after) {
            Some(b' ') | Some(b'>') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                starts.push(start)
            }
            _ => {}
        }
        pos = after;
    }
    starts
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            // Skip past the opening tag itself.
            let body = match html[s..end].find('>') {
                Some(j) => &html[s + j + 1..end],
                None => "",
            };
            body
        })
        .collect()
}

/// Splits a row body into cell chunks at each `<td` or `<th`.
fn split_on_cells(row: &str) -> Vec<&str> {
    let lower = row.to_ascii_lowercase();
    let mut starts = Vec::new();
    for open in ["<td", "<th"] {
        let mut pos = 0;
        while let Some(rel) = lower[pos..].find(open) {
            let start = pos + rel;
            let after = start + open.len();
            match lower.as_bytes().get(after) {
                Some(b' ') | Some(b'>') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                    starts.push(start)
                }
                _ => {}
            }
            pos = after;
        }
    }
    starts.sort_unstable();
    starts
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let end = starts.get(i + 1).copied().unwrap_or(row.len());
            match row[s..end].find('>') {
                Some(j) => &row[s + j + 1..end],
                None => "",
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cells_and_hrefs_from_messy_markup() {
        let html = r#"
            <TABLE border="1">
              <TR><TH>CIK</TH><TH>Series</TH></TR>
              <TR>
                <TD><a href="/cgi-bin/browse-edgar?CIK=1100663">1100663</a></TD>
                <TD>S000004310
              </TR>
            </TABLE>"#;
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 1);
        let rows = &tables[0].rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec!["CIK", "Series"]);
        assert_eq!(rows[1].cells, vec!["1100663", "S000004310"]);
        assert_eq!(rows[1].hrefs, vec!["/cgi-bin/browse-edgar?CIK=1100663"]);
    }

    #[test]
    fn strip_tags_normalizes_entities_and_whitespace() {
        let html = "<b>Fund&nbsp;&amp;  Trust</b>\n <i>Class&#160;A</i>";
        assert_eq!(strip_tags(html), "Fund & Trust Class A");
    }

    #[test]
    fn unclosed_table_runs_to_end_of_document() {
        let html = "<table><tr><td>only cell";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0].cells, vec!["only cell"]);
    }

    #[test]
    fn href_extraction_handles_unquoted_values() {
        let html = r#"<a href=?action=getcompany&start=500>Next</a>"#;
        assert_eq!(extract_hrefs(html), vec!["?action=getcompany&start=500"]);
    }
}
