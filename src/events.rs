//! Events emitted for the surrounding application (XP, affinity, analytics).
//!
//! The core only emits; what a sink does with an event is outside the tutor.
//! The default sink writes one structured tracing event per call.

use serde::Serialize;
use tracing::info;

use crate::domain::{EscalationLevel, Proficiency};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TutorEvent {
  /// A code submission was checked against the active exercise.
  AttemptRecorded {
    session_id: String,
    persona_id: String,
    exercise_id: String,
    proficiency: Proficiency,
    /// 1-based number of this submission on the exercise.
    attempt_number: u32,
    correct: bool,
  },
  ExerciseSolved {
    session_id: String,
    persona_id: String,
    exercise_id: String,
    failed_attempts: u32,
  },
  /// The tutor answered a non-solving turn.
  QuestionAnswered {
    session_id: String,
    persona_id: String,
    level: EscalationLevel,
    response_len: usize,
    demo_mode: bool,
  },
}

pub trait EventSink: Send + Sync {
  fn emit(&self, event: TutorEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
  fn emit(&self, event: TutorEvent) {
    match &event {
      TutorEvent::AttemptRecorded { session_id, persona_id, exercise_id, proficiency, attempt_number, correct } => {
        info!(target: "tutor", %session_id, %persona_id, %exercise_id, %proficiency, attempt_number, correct, "attempt_recorded");
      }
      TutorEvent::ExerciseSolved { session_id, persona_id, exercise_id, failed_attempts } => {
        info!(target: "tutor", %session_id, %persona_id, %exercise_id, failed_attempts, "exercise_solved");
      }
      TutorEvent::QuestionAnswered { session_id, persona_id, level, response_len, demo_mode } => {
        info!(target: "tutor", %session_id, %persona_id, %level, response_len, demo_mode, "question_answered");
      }
    }
  }
}
