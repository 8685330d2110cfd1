mod common;

use common::{figi_body, figi_empty, scripted_figi, setup_db, status};
use filing_ingestor::figi::IdentifierKind;
use filing_ingestor::nport::Holding;
use fund_sync::mappings::active_mapping;
use fund_sync::resolve::{enrich_holdings, resolve, resolve_many};

#[tokio::test]
async fn cold_cache_resolves_through_the_api_and_caches_the_hit() {
    let (_db, mut conn) = setup_db();
    let (transport, figi) = scripted_figi(vec![common::ok(&figi_body("AAPL"))]);

    let ticker = resolve(&mut conn, &figi, IdentifierKind::Cusip, "037833100")
        .await
        .unwrap();
    assert_eq!(ticker.as_deref(), Some("AAPL"));
    assert_eq!(transport.call_count(), 1);

    // Exactly one active mapping row, positively resolved.
    let mapping = active_mapping(&mut conn, IdentifierKind::Cusip, "037833100")
        .unwrap()
        .unwrap();
    assert_eq!(mapping.ticker.as_deref(), Some("AAPL"));
    assert!(!mapping.has_no_results);
    assert!(mapping.end_date.is_none());

    // Second lookup is served from the cache: the call count stays put.
    let again = resolve(&mut conn, &figi, IdentifierKind::Cusip, "037833100")
        .await
        .unwrap();
    assert_eq!(again.as_deref(), Some("AAPL"));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn confirmed_negative_never_issues_another_request() {
    let (_db, mut conn) = setup_db();
    let (transport, figi) = scripted_figi(vec![common::ok(&figi_empty())]);

    let first = resolve(&mut conn, &figi, IdentifierKind::Cusip, "999999999")
        .await
        .unwrap();
    assert_eq!(first, None);
    assert_eq!(transport.call_count(), 1);

    let mapping = active_mapping(&mut conn, IdentifierKind::Cusip, "999999999")
        .unwrap()
        .unwrap();
    assert!(mapping.has_no_results, "negative outcome is cached");

    // Cache monotonicity: repeated lookups stay off the API.
    for _ in 0..3 {
        let outcome = resolve(&mut conn, &figi, IdentifierKind::Cusip, "999999999")
            .await
            .unwrap();
        assert_eq!(outcome, None);
    }
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn failed_lookups_are_never_cached() {
    let (_db, mut conn) = setup_db();
    // Both attempts fail (max_retries = 1 in the test policy).
    let (transport, figi) = scripted_figi(vec![
        status(500, "boom"),
        status(500, "boom"),
        common::ok(&figi_body("AAPL")),
    ]);

    let err = resolve(&mut conn, &figi, IdentifierKind::Cusip, "037833100").await;
    assert!(err.is_err(), "exhausted retries propagate");
    assert!(
        active_mapping(&mut conn, IdentifierKind::Cusip, "037833100")
            .unwrap()
            .is_none(),
        "a failed lookup must not masquerade as a confirmed negative"
    );

    // The next attempt goes back to the API and succeeds.
    let ticker = resolve(&mut conn, &figi, IdentifierKind::Cusip, "037833100")
        .await
        .unwrap();
    assert_eq!(ticker.as_deref(), Some("AAPL"));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn invalid_identifiers_skip_both_api_and_cache() {
    let (_db, mut conn) = setup_db();
    let (transport, figi) = scripted_figi(vec![]);

    let outcome = resolve(&mut conn, &figi, IdentifierKind::Cusip, "000000000")
        .await
        .unwrap();
    assert_eq!(outcome, None);
    assert_eq!(transport.call_count(), 0);
    assert!(
        active_mapping(&mut conn, IdentifierKind::Cusip, "000000000")
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn batch_resolution_deduplicates_input() {
    let (_db, mut conn) = setup_db();
    let (transport, figi) = scripted_figi(vec![
        common::ok(&figi_body("AAPL")),
        common::ok(&figi_empty()),
    ]);

    let values = vec![
        "037833100".to_string(),
        "999999999".to_string(),
        "037833100".to_string(), // duplicate: must not trigger a third call
    ];
    let results = resolve_many(&mut conn, &figi, IdentifierKind::Cusip, &values).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results["037833100"].as_deref(), Some("AAPL"));
    assert_eq!(results["999999999"], None);
    assert_eq!(transport.call_count(), 2);

    // Insertion order is preserved.
    let keys: Vec<_> = results.keys().cloned().collect();
    assert_eq!(keys, vec!["037833100", "999999999"]);
}

fn holding(name: &str, cusip: Option<&str>, isin: Option<&str>) -> Holding {
    Holding {
        name: Some(name.to_string()),
        title: Some(name.to_string()),
        cusip: cusip.map(String::from),
        isin: isin.map(String::from),
        ..Default::default()
    }
}

#[tokio::test]
async fn enrichment_tries_cusip_first_then_isin_for_the_rest() {
    let (_db, mut conn) = setup_db();
    // One CUSIP hit, one CUSIP miss whose ISIN then resolves.
    let (transport, figi) = scripted_figi(vec![
        common::ok(&figi_body("AAPL")),
        common::ok(&figi_empty()),
        common::ok(&figi_body("SAP")),
    ]);

    let holdings = vec![
        holding("Apple Inc", Some("037833100"), Some("US0378331005")),
        holding("SAP SE", Some("800000000"), Some("DE0007164600")),
    ];
    let (enriched, stats) = enrich_holdings(&mut conn, &figi, holdings).await;

    assert_eq!(enriched[0].ticker.as_deref(), Some("AAPL"));
    assert_eq!(enriched[1].ticker.as_deref(), Some("SAP"));
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.unresolved, 0);
    // Two CUSIP calls, one ISIN call: the resolved holding's ISIN is skipped.
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn derivatives_are_flagged_not_looked_up() {
    let (_db, mut conn) = setup_db();
    let (transport, figi) = scripted_figi(vec![common::ok(&figi_body("AAPL"))]);

    let holdings = vec![
        holding("Apple Inc", Some("037833100"), None),
        holding(
            "Total Return Swap on NASDAQ 100",
            Some("123456789"),
            Some("US1234567890"),
        ),
    ];
    let (enriched, stats) = enrich_holdings(&mut conn, &figi, holdings).await;

    assert_eq!(stats.excluded_derivatives, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(enriched[1].data_quality_note.is_some());
    assert_eq!(enriched[1].ticker, None);
    // Only the non-derivative holding reached the API.
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn enrichment_counts_unresolved_non_derivatives() {
    let (_db, mut conn) = setup_db();
    let (_transport, figi) = scripted_figi(vec![common::ok(&figi_empty())]);

    let holdings = vec![holding("Obscure Security", Some("111111111"), None)];
    let (enriched, stats) = enrich_holdings(&mut conn, &figi, holdings).await;

    assert_eq!(stats.unresolved, 1);
    assert_eq!(enriched[0].ticker, None);
    assert!(enriched[0].data_quality_note.is_none());
}

#[tokio::test]
async fn stale_refresh_overwrites_mappings_in_place() {
    use diesel::connection::SimpleConnection;
    use fund_sync::mappings::upsert_mapping;
    use fund_sync::resolve::refresh_stale;

    let (_db, mut conn) = setup_db();
    upsert_mapping(&mut conn, IdentifierKind::Cusip, "037833100", Some("OLD"), false).unwrap();
    conn.batch_execute(
        "UPDATE security_mappings SET last_fetched_date = '2024-01-01T00:00:00.000Z'",
    )
    .unwrap();

    let (transport, figi) = scripted_figi(vec![common::ok(&figi_body("AAPL"))]);
    let refreshed = refresh_stale(&mut conn, &figi, 60).await.unwrap();
    assert_eq!(refreshed, 1);
    assert_eq!(transport.call_count(), 1);

    let mapping = active_mapping(&mut conn, IdentifierKind::Cusip, "037833100")
        .unwrap()
        .unwrap();
    assert_eq!(mapping.ticker.as_deref(), Some("AAPL"));
    assert!(mapping.last_fetched_date > "2024-01-01".to_string());

    // Fresh again: a second pass finds nothing to do.
    assert_eq!(refresh_stale(&mut conn, &figi, 60).await.unwrap(), 0);
    assert_eq!(transport.call_count(), 1);
}
