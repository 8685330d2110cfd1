#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use tempfile::TempDir;

use filing_ingestor::client::{
    Request, Response, RetryPolicy, Transport, TransportError,
};
use filing_ingestor::figi::FigiClient;
use fund_sync::db::{connection, migrate};

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = Integer)]
    n: i32,
}

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub path: String,
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");
    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i32 {
    let row: Count = diesel::sql_query(format!("SELECT COUNT(*) AS n FROM {table}"))
        .get_result(conn)
        .expect("count");
    row.n
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL persists per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);
}

/// The issuer id of the seeded iShares Trust row (CIK 1100663).
pub fn seeded_issuer_id(conn: &mut SqliteConnection) -> i32 {
    fund_sync::issuers::issuer_by_cik(conn, "1100663")
        .expect("query")
        .expect("seed row")
        .issuer_id
}

/// A transport that replays scripted responses and counts calls, for
/// asserting the cache layer never re-hits the API.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Response>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Response>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        Self {
            responses: Mutex::new(reversed),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, _request: &Request) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("scripted transport ran out of responses");
        Ok(response)
    }
}

pub fn ok(body: &str) -> Response {
    Response {
        status: 200,
        body: body.to_string(),
    }
}

pub fn status(code: u16, body: &str) -> Response {
    Response {
        status: code,
        body: body.to_string(),
    }
}

/// A FIGI client over a scripted transport with test-friendly delays.
pub fn scripted_figi(
    responses: Vec<Response>,
) -> (
    std::sync::Arc<ScriptedTransport>,
    FigiClient<std::sync::Arc<ScriptedTransport>>,
) {
    let transport = std::sync::Arc::new(ScriptedTransport::new(responses));
    let client = FigiClient::with_transport_and_policy(
        std::sync::Arc::clone(&transport),
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

/// A canned OpenFIGI success body for one ticker.
pub fn figi_body(ticker: &str) -> String {
    format!(
        r#"[{{"data":[{{"ticker":"{ticker}","marketSector":"Equity","exchCode":"US","securityType2":"Common Stock"}}]}}]"#
    )
}

/// A canned OpenFIGI no-results body.
pub fn figi_empty() -> String {
    r#"[{"error":"No identifier found."}]"#.to_string()
}
