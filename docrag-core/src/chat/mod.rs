//! Answer generation and the interactive session built on it.

mod answerer;
mod session;

pub use answerer::{
    Answer, Answerer, Confidence, ConfidencePolicy, GenerationError, Source, REFUSAL,
    SYSTEM_PROMPT,
};
pub use session::{ChatSession, ChatTurn, Role, SessionError, SessionState};
