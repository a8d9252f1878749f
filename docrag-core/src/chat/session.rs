//! Interactive question-answering session.

use super::answerer::{Answerer, Confidence, Source};
use crate::rag::{RagError, Retriever};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A request is already in flight")]
    Busy,

    #[error("Query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Retrieval(#[from] RagError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub sources: Vec<Source>,
    pub confidence: Option<Confidence>,
    /// Set on assistant turns that report a generation failure
    pub is_error: bool,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sources: Vec::new(),
            confidence: None,
            is_error: false,
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            role: Role::Assistant,
            text: format!("Error: {}", message),
            sources: Vec::new(),
            confidence: Some(Confidence::Low),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ordered history plus a single in-flight request guard.
///
/// History lives only as long as the session.
pub struct ChatSession {
    retriever: Retriever,
    answerer: Answerer,
    history: Mutex<Vec<ChatTurn>>,
    in_flight: AtomicBool,
    default_k: usize,
}

impl ChatSession {
    pub fn new(retriever: Retriever, answerer: Answerer, default_k: usize) -> Self {
        Self {
            retriever,
            answerer,
            history: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            default_k,
        }
    }

    pub fn set_default_k(&mut self, k: usize) {
        self.default_k = k;
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Asks one question and returns the assistant turn appended for it.
    ///
    /// A generation failure still yields `Ok`: the returned turn is an
    /// error turn. Retrieval failures are returned as errors.
    pub async fn ask(&self, query: &str, k: Option<usize>) -> Result<ChatTurn> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        self.lock_history().push(ChatTurn::user(query));

        let k = k.unwrap_or(self.default_k);
        let hits = self.retriever.search(query, k).await?;

        let turn = match self.answerer.answer(query, &hits).await {
            Ok(answer) => ChatTurn {
                role: Role::Assistant,
                text: answer.text,
                sources: answer.sources,
                confidence: Some(answer.confidence),
                is_error: false,
            },
            Err(e) => {
                warn!(error = %e, "Generation failed");
                ChatTurn::error(e)
            }
        };

        info!(hits = hits.len(), is_error = turn.is_error, "Answered");
        self.lock_history().push(turn.clone());
        Ok(turn)
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.lock_history().clone()
    }

    pub fn clear(&self) {
        self.lock_history().clear();
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.load(Ordering::Acquire) {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<ChatTurn>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
