//! Credential lifecycle on top of a [`StoreAdapter`]: issue, look up and revoke
//! Hawk credentials with one error contract regardless of backend.

use std::{collections::HashSet, sync::Arc};

use hawk_core::{Credential, CredentialFactory, StoreAdapter, StoreError};
use thiserror::Error;
use tracing::{debug, instrument};

/// Longest id accepted; matches the Couchbase key limit.
pub const MAX_ID_LEN: usize = 250;

/// Errors surfaced to callers of [`CredentialStore`].
///
/// A missing credential is not an error: lookups return `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Input rejected before any backend call.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Backend unreachable or not started.
    #[error("{store} connection error: {reason}")]
    Connection { store: &'static str, reason: String },
    /// Backend rejected the operation.
    #[error("{store} error [{code}]: {reason}")]
    Store {
        store: &'static str,
        code: String,
        reason: String,
    },
}

impl CredentialError {
    fn from_store(store: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotConnected { .. } => CredentialError::Connection {
                store,
                reason: "not connected".to_string(),
            },
            StoreError::Connection { reason } => CredentialError::Connection { store, reason },
            StoreError::AlreadyExists { id } => CredentialError::Store {
                store,
                code: "already_exists".to_string(),
                reason: format!("credential {id} already exists"),
            },
            StoreError::Backend { code, reason } => CredentialError::Store {
                store,
                code,
                reason,
            },
            StoreError::Decode { reason } => CredentialError::Store {
                store,
                code: "decode".to_string(),
                reason,
            },
        }
    }
}

/// Check an id before it is used in a backend request path.
pub fn validate_id(id: &str) -> Result<(), CredentialError> {
    if id.is_empty() {
        return Err(CredentialError::Validation("id must not be empty".into()));
    }
    if id.len() > MAX_ID_LEN {
        return Err(CredentialError::Validation(format!(
            "id exceeds {MAX_ID_LEN} bytes"
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(CredentialError::Validation(format!(
            "id contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Issues credentials through a [`CredentialFactory`] and persists them via an adapter.
pub struct CredentialStore<A: StoreAdapter + ?Sized> {
    adapter: Arc<A>,
    factory: CredentialFactory,
}

impl<A: StoreAdapter + ?Sized> CredentialStore<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            factory: CredentialFactory::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn store_err(&self, err: StoreError) -> CredentialError {
        CredentialError::from_store(self.adapter.name(), err)
    }

    /// Look up a credential; `Ok(None)` when the backend has no such id.
    #[instrument(skip(self), fields(store = self.adapter.name()))]
    pub async fn get(&self, id: &str) -> Result<Option<Credential>, CredentialError> {
        validate_id(id)?;
        self.adapter.fetch(id).await.map_err(|e| self.store_err(e))
    }

    /// Generate and persist a new credential. The insert is conditional, so an
    /// id collision fails instead of overwriting.
    #[instrument(skip(self), fields(store = self.adapter.name()))]
    pub async fn create(&self) -> Result<Credential, CredentialError> {
        let credential = self.factory.generate();
        self.adapter
            .insert_if_absent(&credential.id, &credential)
            .await
            .map_err(|e| self.store_err(e))?;
        debug!(id = %credential.id, "credential created");
        Ok(credential)
    }

    /// Revoke one credential. Revoking an unknown id succeeds.
    #[instrument(skip(self), fields(store = self.adapter.name()))]
    pub async fn delete(&self, id: &str) -> Result<(), CredentialError> {
        validate_id(id)?;
        let removed = self.adapter.remove(id).await.map_err(|e| self.store_err(e))?;
        if !removed {
            debug!("credential was already absent");
        }
        Ok(())
    }

    /// Revoke several credentials, returning the ids that existed and were
    /// removed. Duplicates are collapsed; an empty batch never reaches the backend.
    #[instrument(skip_all, fields(store = self.adapter.name(), count = ids.len()))]
    pub async fn delete_many(&self, ids: &[String]) -> Result<Vec<String>, CredentialError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        for id in ids {
            validate_id(id)?;
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        self.adapter
            .remove_many(&unique)
            .await
            .map_err(|e| self.store_err(e))
    }
}
