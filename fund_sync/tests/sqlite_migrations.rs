mod common;

use common::{assert_sqlite_pragmas, count, setup_db};
use diesel::connection::SimpleConnection;

#[test]
fn migrations_create_the_store_contract() {
    let (_db, mut conn) = setup_db();

    // Every contract table exists and is queryable.
    for table in [
        "fund_providers",
        "fund_issuers",
        "fund_series",
        "fund_classes",
        "sec_reports",
        "security_mappings",
    ] {
        let _ = count(&mut conn, table);
    }

    assert_sqlite_pragmas(&mut conn);
}

#[test]
fn seed_rows_populate_the_directory() {
    let (_db, mut conn) = setup_db();

    assert_eq!(count(&mut conn, "fund_providers"), 3);
    assert_eq!(count(&mut conn, "fund_issuers"), 4);

    // Seed data is reachable through the directory reads.
    let issuers = fund_sync::issuers::active_issuers(&mut conn).unwrap();
    assert_eq!(issuers.len(), 4);
    assert!(issuers.iter().any(|i| i.cik == "1100663"));

    let summary = fund_sync::issuers::provider_summary(&mut conn).unwrap();
    assert_eq!(summary.total_providers, 3);
    assert_eq!(summary.counts.get("BlackRock"), Some(&2));
}

#[test]
fn filing_natural_key_rejects_duplicates() {
    let (_db, mut conn) = setup_db();

    conn.batch_execute(
        "INSERT INTO sec_reports (series_code, accession_number, form_type, download_status, processing_status, created_at, updated_at)
         VALUES ('S000004310', '0001752724-25-119791', 'NPORT-P', 'pending', 'pending', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z')",
    )
    .unwrap();

    let dup = conn.batch_execute(
        "INSERT INTO sec_reports (series_code, accession_number, form_type, download_status, processing_status, created_at, updated_at)
         VALUES ('S000004310', '0001752724-25-119791', 'NPORT-P', 'pending', 'pending', '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z')",
    );
    assert!(dup.is_err(), "natural-key duplicate must be rejected");
}

#[test]
fn active_mapping_uniqueness_is_scoped_to_null_end_date() {
    let (_db, mut conn) = setup_db();

    conn.batch_execute(
        "INSERT INTO security_mappings (identifier_type, identifier_value, ticker, has_no_results, start_date, last_fetched_date, created_at, updated_at)
         VALUES ('CUSIP', '037833100', 'AAPL', 0, '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z')",
    )
    .unwrap();

    // A second active row for the same identifier violates the partial index.
    let dup = conn.batch_execute(
        "INSERT INTO security_mappings (identifier_type, identifier_value, ticker, has_no_results, start_date, last_fetched_date, created_at, updated_at)
         VALUES ('CUSIP', '037833100', 'AAPL', 0, '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z')",
    );
    assert!(dup.is_err());

    // End-dating the active row makes room for a new active one.
    conn.batch_execute("UPDATE security_mappings SET end_date = '2025-01-03T00:00:00.000Z'")
        .unwrap();
    conn.batch_execute(
        "INSERT INTO security_mappings (identifier_type, identifier_value, ticker, has_no_results, start_date, last_fetched_date, created_at, updated_at)
         VALUES ('CUSIP', '037833100', 'AAPL', 0, '2025-01-04T00:00:00.000Z', '2025-01-04T00:00:00.000Z', '2025-01-04T00:00:00.000Z', '2025-01-04T00:00:00.000Z')",
    )
    .unwrap();
    assert_eq!(count(&mut conn, "security_mappings"), 2);
}

#[test]
fn identifier_type_is_check_constrained() {
    let (_db, mut conn) = setup_db();

    let bad = conn.batch_execute(
        "INSERT INTO security_mappings (identifier_type, identifier_value, has_no_results, start_date, last_fetched_date, created_at, updated_at)
         VALUES ('SEDOL', 'B02J6398', 0, '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z')",
    );
    assert!(bad.is_err());
}

#[test]
fn one_current_row_per_class_code_is_enforced() {
    let (_db, mut conn) = setup_db();

    conn.batch_execute(
        "INSERT INTO fund_classes (series_code, class_code, is_current, effective_date, source, last_verified_date, created_at, updated_at)
         VALUES ('S000004310', 'C000219740', 1, '2025-01-01T00:00:00.000Z', 'sec_api', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z')",
    )
    .unwrap();

    let dup = conn.batch_execute(
        "INSERT INTO fund_classes (series_code, class_code, is_current, effective_date, source, last_verified_date, created_at, updated_at)
         VALUES ('S000004310', 'C000219740', 1, '2025-01-02T00:00:00.000Z', 'sec_api', '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z', '2025-01-02T00:00:00.000Z')",
    );
    assert!(dup.is_err(), "two current rows for one class code must be rejected");
}
