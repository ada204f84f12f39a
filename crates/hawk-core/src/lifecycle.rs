//! Connection lifecycle for backends that hold a session.
//!
//! [`ConnectionLifecycle`] owns the single live connection of a store and walks
//! it through `Disconnected -> Connecting -> Connected` and back. Observers
//! either register a [`LifecycleListener`] on the instance or watch the state
//! through [`ConnectionLifecycle::subscribe`]; there is no global registry.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;

/// Where a lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Opens and closes vendor connections on behalf of a [`ConnectionLifecycle`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send + Sync + 'static;

    /// Backend name used for logging and notifications.
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    async fn disconnect(&self, connection: &Self::Connection) -> Result<(), StoreError>;
}

/// Receives lifecycle notifications. All methods default to no-ops.
pub trait LifecycleListener: Send + Sync {
    fn on_connected(&self, _store: &'static str) {}

    fn on_disconnected(&self, _store: &'static str) {}

    fn on_connection_error(&self, _store: &'static str, _error: &StoreError) {}
}

/// Owns at most one open connection and serializes connect/disconnect.
pub struct ConnectionLifecycle<C: Connector> {
    connector: C,
    // Held across `connect`, so a second start waits instead of dialing again.
    slot: Mutex<Option<Arc<C::Connection>>>,
    state: watch::Sender<ConnectionState>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl<C: Connector> ConnectionLifecycle<C> {
    pub fn new(connector: C) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            slot: Mutex::new(None),
            state,
            listeners: Vec::new(),
        }
    }

    pub fn with_listeners(
        mut self,
        listeners: impl IntoIterator<Item = Arc<dyn LifecycleListener>>,
    ) -> Self {
        self.listeners.extend(listeners);
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect unless already connected. On failure the lifecycle falls back to
    /// `Disconnected` and listeners receive the error.
    #[instrument(skip_all, fields(store = self.connector.name()))]
    pub async fn start(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            debug!("already connected; start is a no-op");
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Connecting);
        match self.connector.connect().await {
            Ok(connection) => {
                *slot = Some(Arc::new(connection));
                self.state.send_replace(ConnectionState::Connected);
                info!("connected");
                for listener in &self.listeners {
                    listener.on_connected(self.connector.name());
                }
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!(error = %err, "connect failed");
                for listener in &self.listeners {
                    listener.on_connection_error(self.connector.name(), &err);
                }
                Err(err)
            }
        }
    }

    /// Disconnect if connected. The lifecycle ends `Disconnected` even when the
    /// vendor reports an error while closing.
    #[instrument(skip_all, fields(store = self.connector.name()))]
    pub async fn stop(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        let Some(connection) = slot.take() else {
            debug!("not connected; stop is a no-op");
            return Ok(());
        };

        let result = self.connector.disconnect(&connection).await;
        self.state.send_replace(ConnectionState::Disconnected);
        match &result {
            Ok(()) => info!("disconnected"),
            Err(err) => warn!(error = %err, "disconnect reported an error"),
        }
        for listener in &self.listeners {
            listener.on_disconnected(self.connector.name());
        }
        result
    }

    /// The live connection, or [`StoreError::NotConnected`].
    pub async fn connection(&self) -> Result<Arc<C::Connection>, StoreError> {
        self.slot
            .lock()
            .await
            .clone()
            .ok_or(StoreError::NotConnected {
                store: self.connector.name(),
            })
    }
}
