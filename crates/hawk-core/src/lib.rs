//! Core abstractions for Hawk credential management: the credential model,
//! the storage adapter contract, and connection lifecycle handling.
//! Vendor adapters live in `hawk-storage`; this crate stays backend-agnostic.

pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod storage;

pub use credential::{Algorithm, Credential, CredentialFactory};
pub use error::StoreError;
pub use lifecycle::{ConnectionLifecycle, ConnectionState, Connector, LifecycleListener};
pub use storage::{memory::InMemoryAdapter, StoreAdapter};
