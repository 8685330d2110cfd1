#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use filing_ingestor::client::{Request, Response, Transport, TransportError};

/// A transport that replays a fixed sequence of responses and records every
/// request it saw, so tests can assert on call counts and offsets without a
/// network.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Response>>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Response>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        Self {
            responses: Mutex::new(reversed),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
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
