//! Session manager
//!
//! Holds the active [`RemoteClient`] behind the trait object and the last
//! successful listing. A failed refresh reconnects from scratch and retries
//! the listing once; the cached listing only ever changes on success.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::remote::{ConnectionParams, Connector, RemoteClient, RemoteError, RemoteListing};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connect(RemoteError),

    #[error("Refresh failed: {0}")]
    Refresh(RemoteError),

    #[error("Refresh failed after reconnect: {retry} (first attempt: {first})")]
    RetryFailed {
        first: RemoteError,
        retry: RemoteError,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// Stale client dropped, fresh one being dialed
    Reconnecting,
}

/// Progress reported while a refresh recovers a lost session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionLost { cause: String },
    Reconnecting,
    Reconnected,
}

pub struct SessionManager {
    params: ConnectionParams,
    connector: Arc<dyn Connector>,
    client: Option<Box<dyn RemoteClient>>,
    listing: RemoteListing,
    state: SessionState,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionManager {
    /// Dial, authenticate and enter `params.path`.
    ///
    /// There is no manager without an initial connection; any failure here
    /// is final.
    pub async fn connect(
        params: ConnectionParams,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, SessionError> {
        let client = establish(connector.as_ref(), &params)
            .await
            .map_err(SessionError::Connect)?;
        info!("Session established: {}", params);

        Ok(Self {
            params,
            connector,
            client: Some(client),
            listing: RemoteListing::default(),
            state: SessionState::Connected,
            events: None,
        })
    }

    /// Report reconnect progress on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last successful listing; empty until the first refresh succeeds.
    pub fn listing(&self) -> &RemoteListing {
        &self.listing
    }

    /// List `path` and replace the cached listing.
    ///
    /// Transient failures trigger exactly one reconnect and retry. When
    /// that fails too the cached listing is left as it was.
    pub async fn refresh(&mut self, path: &str) -> Result<&RemoteListing, SessionError> {
        let first = match self.client.as_mut() {
            Some(client) => match client.list(path).await {
                Ok(listing) => {
                    debug!("Refreshed {} entries", listing.len());
                    self.listing = listing;
                    self.state = SessionState::Connected;
                    return Ok(&self.listing);
                }
                Err(e) if !e.is_retryable() => return Err(SessionError::Refresh(e)),
                Err(e) => e,
            },
            None => RemoteError::Closed,
        };

        warn!("Listing {:?} failed: {}, reconnecting", path, first);
        self.emit(SessionEvent::ConnectionLost {
            cause: first.to_string(),
        });
        self.state = SessionState::Reconnecting;
        self.release().await;
        self.emit(SessionEvent::Reconnecting);

        let mut client = match establish(self.connector.as_ref(), &self.params).await {
            Ok(client) => client,
            Err(retry) => {
                warn!("Reconnect failed: {}", retry);
                self.state = SessionState::Disconnected;
                return Err(SessionError::RetryFailed { first, retry });
            }
        };
        info!("Reconnected to {}", self.params.address());
        self.emit(SessionEvent::Reconnected);

        let result = client.list(path).await;
        self.client = Some(client);
        self.state = SessionState::Connected;

        match result {
            Ok(listing) => {
                debug!("Refreshed {} entries after reconnect", listing.len());
                self.listing = listing;
                Ok(&self.listing)
            }
            Err(retry) => Err(SessionError::RetryFailed { first, retry }),
        }
    }

    /// Release the client. Errors are logged, never returned.
    pub async fn close(&mut self) {
        self.release().await;
        self.state = SessionState::Disconnected;
    }

    async fn release(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.quit().await {
                warn!("Error releasing {} session: {}", client.protocol(), e);
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Full connect sequence: dial, authenticate, then change into the
/// configured path. A half-open client is released on chdir failure.
async fn establish(
    connector: &dyn Connector,
    params: &ConnectionParams,
) -> Result<Box<dyn RemoteClient>, RemoteError> {
    let mut client = connector.connect(params).await?;

    if !params.path.is_empty() {
        if let Err(e) = client.change_directory(&params.path).await {
            if let Err(quit_err) = client.quit().await {
                warn!("Error releasing session after failed chdir: {}", quit_err);
            }
            return Err(e);
        }
    }

    Ok(client)
}
