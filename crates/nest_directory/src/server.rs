//! In-memory key directory service.
//!
//! A single-process multimap of `kid → [records]`. Writers append under one
//! mutex; reads clone the record list out before serializing, so a slow
//! response never holds the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::KeyRecord;

/// Shared server state.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: Arc<Mutex<HashMap<String, Vec<KeyRecord>>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record under its kid. Records are never replaced.
    pub fn append(&self, record: KeyRecord) -> usize {
        let mut keys = self.keys.lock().expect("key store lock poisoned");
        let list = keys.entry(record.kid.clone()).or_default();
        list.push(record);
        list.len()
    }

    /// All records for a kid, expired ones included; the verifier decides
    /// what is stale.
    pub fn records(&self, kid: &str) -> Vec<KeyRecord> {
        let keys = self.keys.lock().expect("key store lock poisoned");
        keys.get(kid).cloned().unwrap_or_default()
    }
}

/// Build the directory router.
pub fn router(store: KeyStore) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/addkey", post(add_key))
        .route("/key/:kid", get(get_key))
        .with_state(store)
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok", "system": "nest-keydir"}))
}

async fn add_key(State(store): State<KeyStore>, Json(record): Json<KeyRecord>) -> Json<Value> {
    let kid = record.kid.clone();
    let count = store.append(record);
    tracing::info!(%kid, count, "key record stored");
    Json(json!({"status": "stored", "kid": kid, "count": count}))
}

async fn get_key(State(store): State<KeyStore>, Path(kid): Path<String>) -> Json<Vec<KeyRecord>> {
    let records = store.records(&kid);
    tracing::debug!(%kid, count = records.len(), "key records served");
    Json(records)
}
