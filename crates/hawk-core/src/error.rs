use thiserror::Error;

/// Errors produced by storage adapters.
///
/// A missing document is not an error at this level: adapters report it as
/// `Ok(None)` from `fetch` and `Ok(false)` from `remove`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional insert rejected because the id is taken.
    #[error("document already exists for id: {id}")]
    AlreadyExists { id: String },
    /// An operation was attempted before `start` or after `stop`.
    #[error("{store} is not connected")]
    NotConnected { store: &'static str },
    /// Connecting to (or talking to) the backend failed at the transport level.
    #[error("connection failed: {reason}")]
    Connection { reason: String },
    /// Backend answered with a fault; `code` is the vendor's error code.
    #[error("backend error [{code}]: {reason}")]
    Backend { code: String, reason: String },
    /// Stored document could not be decoded into a credential.
    #[error("malformed document: {reason}")]
    Decode { reason: String },
}

impl StoreError {
    pub fn backend(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn connection<E: ToString>(err: E) -> Self {
        Self::Connection {
            reason: err.to_string(),
        }
    }

    pub fn decode<E: ToString>(err: E) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }

    /// True for failures that happen before a request reaches the backend.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::Connection { .. })
    }
}
