//! Shared helpers for HTTP-level tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use legal_entities_api::config::Config;
use legal_entities_api::db_storage::ClientStore;
use legal_entities_api::enrichment::{CompanyLookup, CompanyRecord};
use legal_entities_api::errors::EnrichmentError;
use legal_entities_api::handlers::AppState;
use legal_entities_api::memory_storage::MemoryClientStore;
use legal_entities_api::router::build_router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Config built from `pairs` on top of the defaults.
pub fn test_config(pairs: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Company lookup returning a canned result and counting calls.
pub struct StubLookup {
    result: Result<CompanyRecord, EnrichmentError>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub fn returning(result: Result<CompanyRecord, EnrichmentError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompanyLookup for StubLookup {
    async fn find_by_inn(&self, _inn: &str) -> Result<CompanyRecord, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryClientStore>,
}

impl TestApp {
    /// App over an in-memory store that accepts any Host header.
    pub fn new(lookup: Arc<dyn CompanyLookup>) -> Self {
        Self::with_config(test_config(&[("ALLOWED_HOSTS", "*")]), lookup)
    }

    pub fn with_config(config: Config, lookup: Arc<dyn CompanyLookup>) -> Self {
        let store = Arc::new(MemoryClientStore::new());
        let state = Arc::new(AppState::new(config, store.clone(), lookup));
        Self {
            router: build_router(state),
            store,
        }
    }

    pub async fn data_source(&self, name: &str) -> i64 {
        self.store
            .insert_data_source(name)
            .await
            .expect("insert data source")
            .id
    }

    pub async fn client_count(&self) -> i64 {
        self.store.count_clients().await.expect("count clients")
    }

    /// Sends a JSON request and returns the status with the decoded body
    /// (`Value::Null` for empty bodies).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.call(builder.body(body).expect("request")).await
    }

    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
