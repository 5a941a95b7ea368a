//! Shared fakes for the pmosoap integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pmosoap::{
    Description, DescriptionError, DescriptionLoader, HttpRequest, HttpResponse, Port, Service,
    Transport, TransportError,
};
use reqwest::StatusCode;
use tokio::time::Instant;
use url::Url;

pub const NAMESPACE: &str = "http://example.com/stock/";

pub const OK_ENVELOPE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body><GetPriceResponse xmlns="http://example.com/stock"><Price>1.5</Price></GetPriceResponse></soap:Body>
</soap:Envelope>"#;

/// Single service, single port, single address, one declared action
pub fn stock_description(endpoint: &str) -> Description {
    let mut actions = HashMap::new();
    actions.insert(
        "SetPrice".to_string(),
        "http://example.com/stock#SetPrice".to_string(),
    );
    Description {
        target_namespace: NAMESPACE.to_string(),
        services: vec![Service {
            name: "StockService".to_string(),
            ports: vec![Port {
                name: "StockPort".to_string(),
                binding: "tns:StockBinding".to_string(),
                addresses: vec![endpoint.to_string()],
            }],
        }],
        actions,
    }
}

/// Serves a fixed description (or a fixed failure) and records each load
pub struct FakeLoader {
    descriptions: HashMap<String, Description>,
    fallback: Option<Description>,
    delay: Duration,
    in_flight: Option<Arc<AtomicUsize>>,
    pub loads: AtomicUsize,
    pub overlapping_loads: AtomicUsize,
    pub load_times: Mutex<Vec<Instant>>,
    /// Set for the whole duration of a load
    pub loading: Arc<AtomicBool>,
}

impl FakeLoader {
    pub fn serving(description: Description) -> Self {
        Self::new(Some(description))
    }

    pub fn failing() -> Self {
        Self::new(None)
    }

    fn new(fallback: Option<Description>) -> Self {
        Self {
            descriptions: HashMap::new(),
            fallback,
            delay: Duration::ZERO,
            in_flight: None,
            loads: AtomicUsize::new(0),
            overlapping_loads: AtomicUsize::new(0),
            load_times: Mutex::new(Vec::new()),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Serve `description` for `source` only
    pub fn with_source(mut self, source: &str, description: Description) -> Self {
        self.descriptions.insert(source.to_string(), description);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Count loads that start while `in_flight` is non-zero
    pub fn watching(mut self, in_flight: Arc<AtomicUsize>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptionLoader for FakeLoader {
    async fn load(&self, source: &Url) -> Result<Description, DescriptionError> {
        if let Some(in_flight) = &self.in_flight {
            if in_flight.load(Ordering::SeqCst) != 0 {
                self.overlapping_loads.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.load_times.lock().unwrap().push(Instant::now());
        self.loading.store(true, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.loading.store(false, Ordering::SeqCst);

        self.descriptions
            .get(source.as_str())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| DescriptionError::Other(format!("unreachable source {source}")))
    }
}

/// Records every request and answers with a canned envelope
pub struct RecordingTransport {
    pub requests: Mutex<Vec<HttpRequest>>,
    response: Vec<u8>,
    delay: Duration,
    fail: bool,
    pub in_flight: Arc<AtomicUsize>,
    loading: Option<Arc<AtomicBool>>,
    /// Requests posted while a watched load was running
    pub posts_during_load: AtomicUsize,
}

impl RecordingTransport {
    pub fn ok() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response: OK_ENVELOPE.as_bytes().to_vec(),
            delay: Duration::ZERO,
            fail: false,
            in_flight: Arc::new(AtomicUsize::new(0)),
            loading: None,
            posts_during_load: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Count posts made while `loading` is set
    pub fn watching_loads(mut self, loading: Arc<AtomicBool>) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(loading) = &self.loading {
            if loading.load(Ordering::SeqCst) {
                self.posts_during_load.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(TransportError::other("connection refused"));
        }
        Ok(HttpResponse {
            status: StatusCode::OK,
            body: self.response.clone(),
        })
    }
}
