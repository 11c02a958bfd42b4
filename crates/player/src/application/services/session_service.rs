//! Session synchronization service
//!
//! Keeps a [`SessionStore`] in step with the server's authoritative session:
//! - initial load through the REST API
//! - full re-fetch whenever the store reports a membership change
//! - DM controls (scene, turn, initiative) passed through to the API
//!
//! The live channel never waits on the REST API. Re-fetches run on a worker
//! task; bursts of membership events collapse into one request.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ports::outbound::{ApiError, SessionApi};
use crate::state::{RefetchRequests, SessionStore};

/// Owns the re-fetch worker for one session. Dropping it stops the worker.
pub struct SessionSync {
    session_id: String,
    store: SessionStore,
    api: Arc<dyn SessionApi>,
    worker: JoinHandle<()>,
}

impl SessionSync {
    /// Spawn the re-fetch worker. Must be called from within a tokio runtime.
    pub fn start(
        session_id: impl Into<String>,
        store: SessionStore,
        requests: RefetchRequests,
        api: Arc<dyn SessionApi>,
    ) -> Self {
        let session_id = session_id.into();
        let worker = tokio::spawn(refetch_worker(
            session_id.clone(),
            store.clone(),
            requests,
            Arc::clone(&api),
        ));

        Self {
            session_id,
            store,
            api,
            worker,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Fetch the session and install it in the store.
    pub async fn load(&self) -> Result<(), ApiError> {
        let data = self.api.get_session(&self.session_id).await?;
        tracing::info!(
            session_id = %self.session_id,
            players = data.players.len(),
            "Loaded session"
        );
        self.store.replace_session(data);
        Ok(())
    }

    pub async fn update_scene(&self, scene: &str, notes: Option<String>) -> Result<(), ApiError> {
        self.api.update_scene(&self.session_id, scene, notes).await
    }

    pub async fn advance_turn(&self, force: bool) -> Result<(), ApiError> {
        self.api.advance_turn(&self.session_id, force).await
    }

    pub async fn set_initiative(&self, character_id: &str, initiative: i32) -> Result<(), ApiError> {
        self.api
            .set_initiative(&self.session_id, character_id, initiative)
            .await
    }
}

impl Drop for SessionSync {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn refetch_worker(
    session_id: String,
    store: SessionStore,
    mut requests: RefetchRequests,
    api: Arc<dyn SessionApi>,
) {
    while requests.recv().await.is_some() {
        // Collapse a burst of requests into one fetch.
        while requests.try_recv().is_ok() {}

        match api.get_session(&session_id).await {
            Ok(data) => {
                tracing::debug!(%session_id, players = data.players.len(), "Re-fetched session");
                store.replace_session(data);
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Session re-fetch failed, keeping previous snapshot");
            }
        }
    }
}
