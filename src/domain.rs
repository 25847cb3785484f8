//! Domain models used by the backend: conversation turns, personas, exercises,
//! proficiency, escalation levels and the per-exercise step state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Tutor,
}

/// One message of a session's conversation. Never mutated once pushed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
  pub role: Role,
  pub text: String,
}

impl ConversationTurn {
  pub fn student(text: impl Into<String>) -> Self {
    Self { role: Role::Student, text: text.into() }
  }

  pub fn tutor(text: impl Into<String>) -> Self {
    Self { role: Role::Tutor, text: text.into() }
  }
}

/// Student-selected support mode. Parameterizes escalation speed and tone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

impl fmt::Display for Proficiency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Proficiency::Beginner => "Beginner",
      Proficiency::Intermediate => "Intermediate",
      Proficiency::Advanced => "Advanced",
    };
    f.write_str(s)
  }
}

/// How much help the tutor may expose for the active exercise.
/// Ordered: a later variant always reveals at least as much as an earlier one.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
  #[default]
  Guide,
  Hint,
  PartialSolution,
  FullSolution,
}

impl EscalationLevel {
  /// The next level up; `FullSolution` is terminal.
  pub fn next(self) -> Self {
    match self {
      EscalationLevel::Guide => EscalationLevel::Hint,
      EscalationLevel::Hint => EscalationLevel::PartialSolution,
      EscalationLevel::PartialSolution | EscalationLevel::FullSolution => EscalationLevel::FullSolution,
    }
  }

  /// Highest level reachable after `attempts` failed submissions at one step each.
  pub fn after_attempts(attempts: u32) -> Self {
    match attempts {
      0 => EscalationLevel::Guide,
      1 => EscalationLevel::Hint,
      2 => EscalationLevel::PartialSolution,
      _ => EscalationLevel::FullSolution,
    }
  }
}

impl fmt::Display for EscalationLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      EscalationLevel::Guide => "guide",
      EscalationLevel::Hint => "hint",
      EscalationLevel::PartialSolution => "partial_solution",
      EscalationLevel::FullSolution => "full_solution",
    };
    f.write_str(s)
  }
}

/// Outcome of the local code check: `(correct, message)`.
/// `message` is empty when everything passed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Validation {
  pub correct: bool,
  pub message: String,
}

impl Validation {
  pub fn pass() -> Self {
    Self { correct: true, message: String::new() }
  }

  pub fn fail(message: impl Into<String>) -> Self {
    Self { correct: false, message: message.into() }
  }
}

/// Progress through the exercise sequence of one session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TutorStepState {
  /// Number of completed exercises.
  pub step_id: u32,
  /// Failed code submissions on the current exercise.
  pub attempts: u32,
  /// Escalation level committed on the previous turn.
  pub level: EscalationLevel,
  #[serde(default)]
  pub last_validation: Option<Validation>,
}

impl TutorStepState {
  /// Back to the start of the current exercise (clear chat).
  pub fn reset_exercise(&mut self) {
    self.attempts = 0;
    self.level = EscalationLevel::Guide;
    self.last_validation = None;
  }
}

/// What the validator checks for one exercise. Every field is optional:
/// unset fields are simply not checked.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseSpec {
  #[serde(default)] pub method_name: Option<String>,
  #[serde(default)] pub return_type: Option<String>,
  #[serde(default)] pub param_types: Vec<String>,
  #[serde(default)] pub required_tokens: Vec<String>,
  #[serde(default)] pub forbidden_tokens: Vec<String>,
}

impl ExerciseSpec {
  pub fn has_signature_checks(&self) -> bool {
    self.method_name.is_some() || self.return_type.is_some() || !self.param_types.is_empty()
  }

  pub fn has_content_checks(&self) -> bool {
    !self.required_tokens.is_empty() || !self.forbidden_tokens.is_empty()
  }
}

/// One coding challenge presented to the student.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub title: String,
  /// What the student is asked to write.
  pub prompt: String,
  pub spec: ExerciseSpec,
  /// Only ever shown to the model once the full solution may be revealed.
  #[serde(default)] pub reference_solution: Option<String>,
}

/// A tutor character. Purely cosmetic to the scaffolding logic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Persona {
  pub id: String,
  pub name: String,
  pub avatar: String,
  pub role: String,
  pub goal: String,
  pub backstory: String,
  /// One-liner said in character when code is received or an exercise is solved.
  pub reaction: String,
}
