//! HTTP-backed remote store.
//!
//! Speaks to a plain JSON endpoint holding one state document per
//! household: `GET`/`PUT {base}/households/{id}/state`. Plain HTTP offers
//! no change feed, so `subscribe` yields a channel that never fires; the
//! engine already tolerates missed notifications. Transport connectivity
//! is derived from request outcomes: a request that cannot reach the
//! backend flips the status to disconnected, any completed request flips
//! it back.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::state::AppState;
use crate::store::{ConnectionStatus, RemoteEvent, RemoteStore};

pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    household_id: String,
    conn_tx: watch::Sender<ConnectionStatus>,
    // Held so the subscriber's channel stays open for the engine's lifetime.
    event_tx: Mutex<Option<mpsc::UnboundedSender<RemoteEvent>>>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, household_id: impl Into<String>) -> Self {
        let (conn_tx, _) = watch::channel(ConnectionStatus::Connected);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            household_id: household_id.into(),
            conn_tx,
            event_tx: Mutex::new(None),
        }
    }

    fn state_url(&self) -> String {
        format!("{}/households/{}/state", self.base_url, self.household_id)
    }

    fn mark_connected(&self, connected: bool) {
        let status = if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        self.conn_tx.send_replace(status);
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn pull_full_state(&self) -> Result<Option<AppState>> {
        let response = match self.client.get(self.state_url()).send().await {
            Ok(response) => response,
            Err(e) => {
                self.mark_connected(false);
                return Err(EngineError::Remote(format!("pull request failed: {e}")));
            }
        };
        self.mark_connected(true);

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("remote holds no state for household {}", self.household_id);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(EngineError::Remote(format!(
                "pull rejected with status {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Remote(format!("pull body unreadable: {e}")))?;
        if value.is_null() {
            return Ok(None);
        }

        // All-or-nothing: a malformed document is a failed pull, never a
        // partially-applied state.
        let state: AppState = serde_json::from_value(value)
            .map_err(|e| EngineError::Remote(format!("malformed remote state: {e}")))?;
        Ok(Some(state))
    }

    async fn push_full_state(&self, state: &AppState) -> Result<()> {
        let response = match self
            .client
            .put(self.state_url())
            .json(state)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.mark_connected(false);
                return Err(EngineError::Remote(format!("push request failed: {e}")));
            }
        };
        self.mark_connected(true);

        if !response.status().is_success() {
            warn!("push rejected with status {}", response.status());
            return Err(EngineError::Remote(format!(
                "push rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .event_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);
        rx
    }

    fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.conn_tx.subscribe()
    }
}
