//! OpenFIGI mapping client.
//!
//! Resolves a CUSIP or ISIN to a ticker symbol through the v3 mapping
//! endpoint. Responses are filtered to instruments on a US exchange in the
//! equity/corporate-debt market sectors; for ISIN lookups the security type
//! must additionally be a common-stock flavor. A 404 or an empty qualifying
//! set is a confirmed negative (`Ok(None)`), never an error — the cache layer
//! records it so the identifier is not queried again.
//!
//! Without an API key OpenFIGI allows roughly 25 requests per 7 seconds;
//! HTTP 429 signals throttling and is retried by the underlying client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{
    ClientError, HttpTransport, RateLimitedClient, Request, RetryPolicy, Transport,
    TransportError,
};

const MAPPING_URL: &str = "https://api.openfigi.com/v3/mapping";
/// 25 requests per 7-second window.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(280);

/// The identifier namespaces this pipeline resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// 9-character CUSIP.
    Cusip,
    /// 12-character ISIN.
    Isin,
}

impl IdentifierKind {
    /// Storage name, the `identifier_type` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cusip => "CUSIP",
            Self::Isin => "ISIN",
        }
    }

    /// OpenFIGI `idType` value.
    pub fn id_type(self) -> &'static str {
        match self {
            Self::Cusip => "ID_CUSIP",
            Self::Isin => "ID_ISIN",
        }
    }

    /// Parses a storage name back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUSIP" => Some(Self::Cusip),
            "ISIN" => Some(Self::Isin),
            _ => None,
        }
    }

    /// Infers the kind from the value length (9 -> CUSIP, 12 -> ISIN), the
    /// rule used when importing legacy flat-file caches.
    pub fn infer(value: &str) -> Option<Self> {
        match value.len() {
            9 => Some(Self::Cusip),
            12 => Some(Self::Isin),
            _ => None,
        }
    }

    /// Cheap format validation applied before any API call.
    pub fn is_valid_value(self, value: &str) -> bool {
        match self {
            Self::Cusip => value.len() == 9 && value != "000000000",
            Self::Isin => value.len() == 12,
        }
    }
}

/// One instrument entry inside a mapping result set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Ticker symbol, when the instrument has one.
    #[serde(default)]
    pub ticker: Option<String>,
    /// Market sector, e.g. `Equity` or `Corp`.
    #[serde(default)]
    pub market_sector: Option<String>,
    /// Exchange code, e.g. `US`.
    #[serde(default)]
    pub exch_code: Option<String>,
    /// Finer-grained security type, e.g. `Common Stock`.
    #[serde(default)]
    pub security_type2: Option<String>,
}

/// Per-job result set: either a data list or an error string.
#[derive(Debug, Deserialize)]
struct MappingResult {
    #[serde(default)]
    data: Option<Vec<Instrument>>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the OpenFIGI v3 mapping endpoint.
///
/// One instance per process; the embedded rate limiter is the global quota
/// guard for this API.
pub struct FigiClient<T> {
    client: RateLimitedClient<T>,
    _api_key: Option<SecretString>,
}

impl FigiClient<HttpTransport> {
    /// Builds a production client. An API key, when provided, is injected as
    /// the `X-OPENFIGI-APIKEY` default header.
    pub fn new(api_key: Option<&str>) -> Result<Self, TransportError> {
        let api_key = api_key.map(|k| SecretString::new(k.into()));

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        if let Some(key) = &api_key {
            headers.insert(
                "X-OPENFIGI-APIKEY",
                HeaderValue::from_str(key.expose_secret())?,
            );
        }

        let transport = HttpTransport::new(headers)?;
        Ok(Self {
            client: RateLimitedClient::with_min_interval(
                transport,
                MIN_REQUEST_INTERVAL,
                RetryPolicy::default(),
            ),
            _api_key: api_key,
        })
    }
}

impl<T: Transport> FigiClient<T> {
    /// Wraps an arbitrary transport; the seam offline tests use.
    pub fn with_transport_and_policy(
        transport: T,
        min_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client: RateLimitedClient::with_min_interval(transport, min_interval, policy),
            _api_key: None,
        }
    }

    /// Looks up the ticker for one identifier.
    ///
    /// `Ok(None)` is a confirmed negative. Callers are expected to have
    /// validated the value with [`IdentifierKind::is_valid_value`] and to
    /// consult their cache first.
    pub async fn lookup(
        &self,
        kind: IdentifierKind,
        value: &str,
    ) -> Result<Option<String>, ClientError> {
        let payload = json!([{
            "idType": kind.id_type(),
            "idValue": value,
            "exchCode": "US",
        }]);
        let request = Request::post_json(MAPPING_URL, payload);
        let response = self.client.execute(&request).await?;

        if response.is_not_found() {
            debug!(kind = kind.as_str(), value, "mapping endpoint returned 404");
            return Ok(None);
        }

        let results: Vec<MappingResult> = response.json()?;
        let ticker = results
            .first()
            .and_then(|r| match (&r.data, &r.error) {
                (Some(data), _) => first_qualifying_ticker(kind, data),
                (None, err) => {
                    debug!(kind = kind.as_str(), value, error = ?err, "no mapping data");
                    None
                }
            });

        match &ticker {
            Some(t) => debug!(kind = kind.as_str(), value, ticker = %t, "resolved"),
            None => debug!(kind = kind.as_str(), value, "no qualifying instrument"),
        }
        Ok(ticker)
    }
}

fn first_qualifying_ticker(kind: IdentifierKind, instruments: &[Instrument]) -> Option<String> {
    instruments
        .iter()
        .find(|inst| qualifies(kind, inst))
        .and_then(|inst| inst.ticker.clone())
}

fn qualifies(kind: IdentifierKind, inst: &Instrument) -> bool {
    let sector_ok = matches!(inst.market_sector.as_deref(), Some("Equity") | Some("Corp"));
    let exchange_ok = inst.exch_code.as_deref() == Some("US");
    let type_ok = match kind {
        IdentifierKind::Cusip => true,
        IdentifierKind::Isin => matches!(
            inst.security_type2.as_deref(),
            Some("Common Stock") | Some("Equity")
        ),
    };
    inst.ticker.is_some() && sector_ok && exchange_ok && type_ok
}
