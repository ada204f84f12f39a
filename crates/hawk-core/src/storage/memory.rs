use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use super::StoreAdapter;
use crate::{credential::Credential, error::StoreError};

/// In-memory adapter for tests and smoke runs. Documents are kept as JSON so
/// the same serialization path as the real backends is exercised.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAdapter {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of adapter operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn documents(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .map_err(|err| StoreError::backend("poisoned", format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl StoreAdapter for InMemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        let docs = self.documents()?;
        docs.get(id)
            .map(|bytes| serde_json::from_slice(bytes).map_err(StoreError::decode))
            .transpose()
    }

    async fn insert_if_absent(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<(), StoreError> {
        let mut docs = self.documents()?;
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists { id: id.to_string() });
        }
        let bytes = serde_json::to_vec(credential).map_err(StoreError::decode)?;
        docs.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.documents()?;
        Ok(docs.remove(id).is_some())
    }

    async fn remove_many(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let mut docs = self.documents()?;
        Ok(ids
            .iter()
            .filter(|id| docs.remove(id.as_str()).is_some())
            .cloned()
            .collect())
    }
}
