//! Error types surfaced by the tutoring core and the model client.
//!
//! Only configuration-style failures (`TutorError`) reach the caller. Model
//! failures (`LlmError`) are recovered inside the turn with a demo-mode reply,
//! and the validator never errors at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TutorError {
  #[error("Unknown persona: {0}")]
  UnknownPersona(String),

  #[error("Unknown exercise: {0}")]
  UnknownExercise(String),

  #[error("Unknown session: {0}")]
  UnknownSession(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("OpenAI HTTP {status}: {message}")]
  Api { status: u16, message: String },

  #[error("Model returned an empty reply")]
  EmptyReply,
}
