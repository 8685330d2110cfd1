mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedTransport, ok, status};
use filing_ingestor::client::RetryPolicy;
use filing_ingestor::edgar::EdgarClient;
use filing_ingestor::models::ParseMethod;

fn edgar(responses: Vec<filing_ingestor::client::Response>) -> (Arc<ScriptedTransport>, EdgarClient<Arc<ScriptedTransport>>) {
    let transport = Arc::new(ScriptedTransport::new(responses));
    let client = EdgarClient::with_transport_and_policy(
        Arc::clone(&transport),
        Duration::from_millis(1),
        RetryPolicy {
            max_retries: 1,
            throttle_base: Duration::from_millis(1),
            throttle_cap: Duration::from_millis(2),
            transient_delay: Duration::from_millis(1),
        },
    );
    (transport, client)
}

fn series_page(codes: &[&str], next_start: Option<usize>) -> String {
    let mut rows = String::new();
    for code in codes {
        rows.push_str(&format!(
            "<tr><td>1100663</td><td>{code}</td><td></td><td></td><td></td></tr>\
             <tr><td></td><td></td><td>C{rest}</td><td>Some Fund</td><td>TICK</td></tr>",
            rest = &code[1..],
        ));
    }
    let pager = next_start
        .map(|s| format!(r#"<a href="/cgi-bin/series?CIK=1100663&start={s}&count=500">Next 500</a>"#))
        .unwrap_or_default();
    format!(
        "<html><body><table>\
         <tr><td>CIK</td><td>Series</td><td>Class</td><td>Name</td><td>Ticker</td></tr>\
         {rows}</table>{pager}</body></html>"
    )
}

#[tokio::test]
async fn single_page_issues_exactly_one_request() {
    let (transport, client) = edgar(vec![ok(&series_page(&["S000000001"], None))]);

    let series = client.discover_series("1100663").await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn pagination_follows_continuation_links_and_terminates() {
    let (transport, client) = edgar(vec![
        ok(&series_page(&["S000000001", "S000000002"], Some(500))),
        ok(&series_page(&["S000000003"], Some(1000))),
        ok(&series_page(&["S000000004"], None)),
    ]);

    let series = client.discover_series("1100663").await.unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(transport.call_count(), 3);

    // Offsets must be strictly increasing with no repeats.
    let offsets: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| {
            r.query
                .iter()
                .find(|(k, _)| k == "start")
                .map(|(_, v)| v.clone())
                .unwrap()
        })
        .collect();
    assert_eq!(offsets, vec!["0", "500", "1000"]);
}

#[tokio::test]
async fn empty_page_stops_pagination_even_with_a_stale_link() {
    // Page advertises a continuation but contains no candidates.
    let empty_with_link = format!(
        "<html><body>{}</body></html>",
        r#"<a href="?start=500&count=500">Next</a>"#
    );
    let (transport, client) = edgar(vec![ok(&empty_with_link)]);

    let series = client.discover_series("1100663").await.unwrap();
    assert!(series.is_empty());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn not_found_terminates_discovery_cleanly() {
    let (transport, client) = edgar(vec![status(404, "")]);

    let series = client.discover_series("1100663").await.unwrap();
    assert!(series.is_empty());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn fallback_page_is_tagged_low_confidence() {
    let page = "<html><p>S000004310 appears only in prose</p></html>";
    let (_transport, client) = edgar(vec![ok(page)]);

    let series = client.discover_series("1100663").await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].parse_method, ParseMethod::RegexFallback);
    assert_eq!(series[0].cik, "0001100663");
}

#[tokio::test]
async fn discover_filings_parses_the_example_row() {
    let page = r#"<table>
        <tr><td>Filings</td><td>Format</td><td>Description</td><td>Date</td></tr>
        <tr>
          <td>NPORT-P</td>
          <td>Documents</td>
          <td>Filed Acc-no: 0001752724-25-119791 (40 Act)</td>
          <td>2025-05-27</td>
        </tr>
    </table>"#;
    let (_transport, client) = edgar(vec![ok(page)]);

    let filings = client.discover_filings("S000004310", "NPORT-P").await.unwrap();
    assert_eq!(filings.len(), 1);
    assert_eq!(filings[0].accession_number, "0001752724-25-119791");
    assert_eq!(
        filings[0].filing_date.map(|d| d.to_string()),
        Some("2025-05-27".to_string())
    );
}

#[tokio::test]
async fn invalid_cik_is_rejected_before_any_request() {
    let (transport, client) = edgar(vec![]);
    assert!(client.discover_series("not-a-cik").await.is_err());
    assert_eq!(transport.call_count(), 0);
}
