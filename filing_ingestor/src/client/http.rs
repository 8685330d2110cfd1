use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::{Method, Request, Response, Transport, TransportError};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Production [`Transport`] backed by a pooled `reqwest` client.
///
/// Default headers (user agent, content negotiation, API keys) are injected
/// once at build time so individual requests stay header-free.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given default headers and a fixed socket
    /// timeout.
    pub fn new(default_headers: HeaderMap) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(SOCKET_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Response { status, body })
    }
}
