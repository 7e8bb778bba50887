use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::calc::UtilizationReport;
use crate::errors::ConversationError;
use crate::flows::engine::ConversationEngine;
use crate::flows::states::{
    ConversationEvent, ConversationReply, ConversationSession, ConversationState,
    PresentationRequest,
};

/// Chat or user identifier owning one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<i64> for SessionId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Per-session conversation state. Each session sits behind its own async mutex, so inputs for
/// one session are applied one at a time while different sessions never contend.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ConversationSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session(&self, id: &SessionId) -> Arc<Mutex<ConversationSession>> {
        if let Some(existing) = self.sessions.read().await.get(id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(ConversationSession::default()))).clone()
    }

    pub async fn state(&self, id: &SessionId) -> ConversationState {
        let Some(session) = self.sessions.read().await.get(id).cloned() else {
            return ConversationState::Idle;
        };
        let state = session.lock().await.state;
        state
    }

    /// Returns the session to idle, discarding any partial selection.
    pub async fn reset(&self, id: &SessionId) {
        let session = self.session(id).await;
        session.lock().await.reset();
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions that have nothing in progress. A session whose handle is held outside the
    /// registry is kept, even before that holder has locked it.
    pub async fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(guard) => *guard != ConversationSession::default(),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }
}

/// Session-keyed entry points for the presentation layer.
pub struct ConversationService {
    engine: ConversationEngine,
    registry: SessionRegistry,
}

impl ConversationService {
    pub fn new(engine: ConversationEngine) -> Self {
        Self { engine, registry: SessionRegistry::new() }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        id: &SessionId,
        event: ConversationEvent,
    ) -> Result<ConversationReply, ConversationError> {
        let session = self.registry.session(id).await;
        let mut guard = session.lock().await;
        debug!(event_name = "flow.session.locked", session_id = %id, state = ?guard.state, "session locked");
        self.engine.apply(&mut guard, event).await
    }

    /// Routes free text to the step currently waiting for text input.
    pub async fn submit_text(
        &self,
        id: &SessionId,
        text: &str,
    ) -> Result<ConversationReply, ConversationError> {
        let session = self.registry.session(id).await;
        let mut guard = session.lock().await;
        let Some(event) = ConversationEvent::from_text(guard.state, text) else {
            return Err(match guard.state {
                ConversationState::Idle => ConversationError::Unrecognized,
                state => ConversationError::OutOfTurn { state },
            });
        };
        self.engine.apply(&mut guard, event).await
    }

    pub async fn begin_session(
        &self,
        id: &SessionId,
    ) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::StartRequested).await
    }

    pub async fn restart(&self, id: &SessionId) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::RestartRequested).await
    }

    pub async fn submit_supplier_choice(
        &self,
        id: &SessionId,
        index: usize,
    ) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::SupplierChosen { index }).await
    }

    pub async fn request_manual_entry(
        &self,
        id: &SessionId,
    ) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::ManualEntryRequested).await
    }

    pub async fn submit_supplier_text(
        &self,
        id: &SessionId,
        token: &str,
    ) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::SupplierTextSubmitted { token: token.to_owned() }).await
    }

    pub async fn submit_year(
        &self,
        id: &SessionId,
        text: &str,
    ) -> Result<PresentationRequest, ConversationError> {
        self.present(id, ConversationEvent::YearSubmitted { text: text.to_owned() }).await
    }

    pub async fn submit_month(
        &self,
        id: &SessionId,
        month: u32,
    ) -> Result<UtilizationReport, ConversationError> {
        match self.dispatch(id, ConversationEvent::MonthChosen { month }).await? {
            ConversationReply::Report(report) => Ok(report),
            ConversationReply::Present(_) => Err(ConversationError::IncompleteSession),
        }
    }

    async fn present(
        &self,
        id: &SessionId,
        event: ConversationEvent,
    ) -> Result<PresentationRequest, ConversationError> {
        match self.dispatch(id, event).await? {
            ConversationReply::Present(request) => Ok(request),
            ConversationReply::Report(_) => Err(ConversationError::IncompleteSession),
        }
    }
}
