use serde_json::Value;
use shared::{
    domain::AppState,
    error::StorageError,
    migrate::parse_document,
    store::{DocumentStore, DOCUMENT_KEY},
};
use tracing::{debug, warn};

/// Reads and writes the whole document under one key.
pub struct Gateway<S> {
    store: S,
    key: String,
}

impl<S: DocumentStore> Gateway<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, DOCUMENT_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn save(&self, state: &AppState) -> Result<(), StorageError> {
        let body = serde_json::to_vec(state)?;
        self.store
            .write(&self.key, &body)
            .await
            .map_err(|err| StorageError::Write {
                key: self.key.clone(),
                reason: format!("{err:#}"),
            })?;
        debug!("persistence: saved key={} bytes={}", self.key, body.len());
        Ok(())
    }

    /// The stored blob, or `None` when it is missing or unreadable.
    pub async fn load(&self) -> Option<Value> {
        let raw = match self.store.read(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("persistence: read failed key={}: {err:#}", self.key);
                return None;
            }
        };
        match parse_document(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("persistence: discarding unreadable document key={}: {err}", self.key);
                None
            }
        }
    }
}

/// Pretty JSON of the full state, as written by export.
pub fn export_document(state: &AppState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(state)
}
