//! Progressive scaffolding: how much help the tutor may give on this turn,
//! and the instruction text handed to the model.
//!
//! Per exercise the level walks Guide → Hint → PartialSolution → FullSolution.
//! A level becomes the *target* once enough failed attempts have been recorded
//! for the active proficiency. The level actually used is capped twice: by the
//! number of failed attempts (one level per failure) and by one step past the
//! level committed on the last recorded attempt. It never moves back, and it
//! resets to Guide only when the exercise is solved or the chat cleared.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Prompts;
use crate::domain::{
  ConversationTurn, EscalationLevel, Exercise, Persona, Proficiency, Role, TutorStepState, Validation,
};
use crate::retrieval::ReferenceNote;
use crate::util::fill_template;

/// Attempt counts at which each level becomes reachable for one proficiency,
/// plus the first level at which the model may write code.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProficiencyPolicy {
  pub hint: u32,
  pub partial_solution: u32,
  pub full_solution: u32,
  pub code_allowed_from: EscalationLevel,
}

impl ProficiencyPolicy {
  pub fn target_level(&self, attempts: u32) -> EscalationLevel {
    if attempts >= self.full_solution {
      EscalationLevel::FullSolution
    } else if attempts >= self.partial_solution {
      EscalationLevel::PartialSolution
    } else if attempts >= self.hint {
      EscalationLevel::Hint
    } else {
      EscalationLevel::Guide
    }
  }

  fn check(&self) -> Result<(), String> {
    if self.hint == 0 {
      return Err("hint threshold must be at least 1".into());
    }
    if !(self.hint <= self.partial_solution && self.partial_solution <= self.full_solution) {
      return Err(format!(
        "thresholds must satisfy hint <= partial_solution <= full_solution (got {}/{}/{})",
        self.hint, self.partial_solution, self.full_solution
      ));
    }
    Ok(())
  }
}

/// Thresholds for every proficiency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscalationPolicy {
  pub beginner: ProficiencyPolicy,
  pub intermediate: ProficiencyPolicy,
  pub advanced: ProficiencyPolicy,
}

impl Default for EscalationPolicy {
  fn default() -> Self {
    Self {
      beginner: ProficiencyPolicy {
        hint: 1,
        partial_solution: 2,
        full_solution: 3,
        code_allowed_from: EscalationLevel::PartialSolution,
      },
      intermediate: ProficiencyPolicy {
        hint: 1,
        partial_solution: 2,
        full_solution: 3,
        code_allowed_from: EscalationLevel::Hint,
      },
      advanced: ProficiencyPolicy {
        hint: 1,
        partial_solution: 1,
        full_solution: 2,
        code_allowed_from: EscalationLevel::Hint,
      },
    }
  }
}

impl EscalationPolicy {
  pub fn for_proficiency(&self, proficiency: Proficiency) -> &ProficiencyPolicy {
    match proficiency {
      Proficiency::Beginner => &self.beginner,
      Proficiency::Intermediate => &self.intermediate,
      Proficiency::Advanced => &self.advanced,
    }
  }

  pub fn check(&self) -> Result<(), String> {
    self.beginner.check().map_err(|e| format!("beginner: {e}"))?;
    self.intermediate.check().map_err(|e| format!("intermediate: {e}"))?;
    self.advanced.check().map_err(|e| format!("advanced: {e}"))?;
    Ok(())
  }
}

/// What the tutor is allowed to do this turn. Recomputed every turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScaffoldingDecision {
  pub level: EscalationLevel,
  pub instructions: String,
}

/// Everything `compose_context` needs for one turn.
pub struct ContextParts<'a> {
  pub persona: &'a Persona,
  pub proficiency: Proficiency,
  pub exercise: &'a Exercise,
  /// Retrieved Java notes relevant to the exercise and input.
  pub references: &'a [&'a ReferenceNote],
  /// Conversation before the current input.
  pub history: &'a [ConversationTurn],
  pub decision: &'a ScaffoldingDecision,
  pub validation_feedback: Option<&'a str>,
  /// Recent teacher critiques for this persona, newest first.
  pub teacher_notes: &'a [String],
  pub student_input: &'a str,
}

#[derive(Clone, Debug)]
pub struct ScaffoldingEngine {
  pub policy: EscalationPolicy,
  pub prompts: Prompts,
  pub history_window: usize,
}

impl ScaffoldingEngine {
  pub fn new(policy: EscalationPolicy, prompts: Prompts, history_window: usize) -> Self {
    Self { policy, prompts, history_window }
  }

  /// Pure: same `(state, proficiency)` always gives the same decision.
  pub fn decide(&self, state: &TutorStepState, proficiency: Proficiency) -> ScaffoldingDecision {
    let policy = self.policy.for_proficiency(proficiency);
    let target = policy.target_level(state.attempts);
    let level = target
      .min(EscalationLevel::after_attempts(state.attempts))
      .min(state.level.next())
      .max(state.level);

    let mut rules = vec![self.prompts.common_rules.trim().to_string(), self.level_rule(level).trim().to_string()];
    if level < policy.code_allowed_from {
      rules.push(self.prompts.no_code_rule.trim().to_string());
    }

    ScaffoldingDecision { level, instructions: rules.join("\n") }
  }

  fn level_rule(&self, level: EscalationLevel) -> &str {
    match level {
      EscalationLevel::Guide => &self.prompts.guide_rule,
      EscalationLevel::Hint => &self.prompts.hint_rule,
      EscalationLevel::PartialSolution => &self.prompts.partial_solution_rule,
      EscalationLevel::FullSolution => &self.prompts.full_solution_rule,
    }
  }

  /// Prompt text in a fixed order: persona, rules (with exercise and
  /// reference notes), recent history, validation feedback, latest input.
  pub fn compose_context(&self, parts: &ContextParts<'_>) -> String {
    let p = parts.persona;
    let mut out = String::new();

    // (a) persona
    out.push_str(
      fill_template(
        &self.prompts.persona_preamble_template,
        &[("name", p.name.as_str()), ("role", p.role.as_str()), ("goal", p.goal.as_str()), ("backstory", p.backstory.as_str())],
      )
      .trim(),
    );
    out.push('\n');
    if !parts.teacher_notes.is_empty() {
      out.push_str("\nTEACHER FEEDBACK ON EARLIER REPLIES (respect it):\n");
      for note in parts.teacher_notes {
        out.push_str(&format!("- {}\n", note.trim()));
      }
    }

    // (b) rules + exercise
    out.push_str(&format!(
      "\nRULES (help level: {}, student proficiency: {}):\n{}\n",
      parts.decision.level, parts.proficiency, parts.decision.instructions
    ));
    out.push_str(&format!("\nCURRENT EXERCISE: {}\n{}\n", parts.exercise.title, parts.exercise.prompt.trim()));
    if parts.decision.level == EscalationLevel::FullSolution {
      if let Some(solution) = &parts.exercise.reference_solution {
        out.push_str(&format!("\nREFERENCE SOLUTION (you may now show it):\n{}\n", solution.trim()));
      }
    }

    if !parts.references.is_empty() {
      out.push_str("\nJAVA REFERENCE NOTES:\n");
      for note in parts.references {
        out.push_str(&format!("- {}: {}\n", note.title, note.text.trim()));
      }
    }

    // (c) recent history
    let start = parts.history.len().saturating_sub(self.history_window);
    let recent = &parts.history[start..];
    if !recent.is_empty() {
      out.push_str("\nCONVERSATION HISTORY:\n");
      for turn in recent {
        let speaker = match turn.role {
          Role::Student => "Student",
          Role::Tutor => p.name.as_str(),
        };
        out.push_str(&format!("{}: {}\n\n", speaker, turn.text.trim()));
      }
    }

    // (d) validation feedback
    if let Some(feedback) = parts.validation_feedback.filter(|f| !f.trim().is_empty()) {
      out.push_str(&format!("\nCode Feedback: {}\n", feedback.trim()));
    }

    // (e) latest input
    out.push_str(&format!("\nStudent's Last Input: {}\n\nRespond as {}.", parts.student_input.trim(), p.name));

    debug!(target: "tutor", level = %parts.decision.level, history_used = recent.len(), context_len = out.len(), "Composed tutor context");
    out
  }
}

/// Apply a validator result to the step state. Correct ends the exercise
/// (attempts reset, step advances); incorrect counts one more attempt.
pub fn record_attempt(state: &mut TutorStepState, validation: &Validation) {
  if validation.correct {
    state.attempts = 0;
    state.step_id += 1;
    state.level = EscalationLevel::Guide;
  } else {
    state.attempts += 1;
  }
  state.last_validation = Some(validation.clone());
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ExerciseSpec;
  use crate::seeds::{seed_exercises, seed_personas};

  fn engine() -> ScaffoldingEngine {
    ScaffoldingEngine::new(EscalationPolicy::default(), Prompts::default(), 10)
  }

  fn state_at(attempts: u32, level: EscalationLevel) -> TutorStepState {
    TutorStepState { attempts, level, ..Default::default() }
  }

  const ALL: [Proficiency; 3] = [Proficiency::Beginner, Proficiency::Intermediate, Proficiency::Advanced];

  #[test]
  fn level_is_non_decreasing_in_attempts() {
    let e = engine();
    for prof in ALL {
      for committed in [EscalationLevel::Guide, EscalationLevel::Hint, EscalationLevel::PartialSolution] {
        let mut prev = e.decide(&state_at(0, committed), prof).level;
        for attempts in 1..12 {
          let level = e.decide(&state_at(attempts, committed), prof).level;
          assert!(level >= prev, "{prof}: attempts={attempts} went from {prev} to {level}");
          prev = level;
        }
      }
    }
  }

  #[test]
  fn full_solution_needs_threshold() {
    let e = engine();
    for prof in ALL {
      let threshold = e.policy.for_proficiency(prof).full_solution;
      for attempts in 0..threshold {
        let level = e.decide(&state_at(attempts, EscalationLevel::PartialSolution), prof).level;
        assert_ne!(level, EscalationLevel::FullSolution, "{prof} revealed early at {attempts}");
      }
      // one level per failure still applies, so three failures are the floor
      let reachable_at = threshold.max(3);
      let level = e.decide(&state_at(reachable_at, EscalationLevel::PartialSolution), prof).level;
      assert_eq!(level, EscalationLevel::FullSolution);
    }
    assert_eq!(e.policy.beginner.full_solution, 3);
  }

  #[test]
  fn level_never_outruns_failed_attempts() {
    let e = engine();
    for prof in ALL {
      for attempts in 0..6 {
        for committed in [EscalationLevel::Guide, EscalationLevel::Hint] {
          let state = state_at(attempts, committed.min(EscalationLevel::after_attempts(attempts)));
          let level = e.decide(&state, prof).level;
          assert!(level <= EscalationLevel::after_attempts(attempts), "{prof}: {attempts} failures gave {level}");
        }
      }
    }
  }

  #[test]
  fn decision_depends_only_on_attempts_after_a_failure() {
    // One failure under Advanced: the committed level is Hint, and asking
    // again without a new failure must not move it.
    let e = engine();
    let mut state = TutorStepState::default();
    record_attempt(&mut state, &Validation::fail("nope"));
    state.level = e.decide(&state, Proficiency::Advanced).level;
    assert_eq!(state.level, EscalationLevel::Hint);
    for _ in 0..3 {
      assert_eq!(e.decide(&state, Proficiency::Advanced).level, EscalationLevel::Hint);
    }
  }

  #[test]
  fn slower_thresholds_escalate_later() {
    let mut policy = EscalationPolicy::default();
    policy.beginner = ProficiencyPolicy {
      hint: 2,
      partial_solution: 4,
      full_solution: 6,
      code_allowed_from: EscalationLevel::PartialSolution,
    };
    let e = ScaffoldingEngine::new(policy, Prompts::default(), 10);

    let walk = |prof: Proficiency| {
      let mut state = TutorStepState::default();
      let mut seen = vec![];
      for _ in 0..6 {
        record_attempt(&mut state, &Validation::fail("nope"));
        state.level = e.decide(&state, prof).level;
        seen.push(state.level);
      }
      seen
    };
    let beginner = walk(Proficiency::Beginner);
    let advanced = walk(Proficiency::Advanced);
    for (b, a) in beginner.iter().zip(&advanced) {
      assert!(b <= a, "beginner {b} ahead of advanced {a}");
    }
    assert_eq!(beginner[1], EscalationLevel::Hint);
    assert_eq!(advanced[1], EscalationLevel::PartialSolution);
    assert_eq!(beginner[5], EscalationLevel::FullSolution);
  }

  #[test]
  fn decide_is_idempotent() {
    let e = engine();
    let s = state_at(2, EscalationLevel::Hint);
    assert_eq!(e.decide(&s, Proficiency::Intermediate), e.decide(&s, Proficiency::Intermediate));
  }

  #[test]
  fn never_skips_more_than_one_level() {
    let e = engine();
    let d = e.decide(&state_at(9, EscalationLevel::Guide), Proficiency::Advanced);
    assert_eq!(d.level, EscalationLevel::Hint);
  }

  #[test]
  fn never_regresses_when_proficiency_gets_gentler() {
    let e = engine();
    // Reached partial solution under Advanced after one failure, then switched to Beginner.
    let d = e.decide(&state_at(1, EscalationLevel::PartialSolution), Proficiency::Beginner);
    assert_eq!(d.level, EscalationLevel::PartialSolution);
  }

  #[test]
  fn beginner_walks_every_level_on_three_failures() {
    let e = engine();
    let mut state = TutorStepState::default();
    let mut seen = vec![e.decide(&state, Proficiency::Beginner).level];
    for _ in 0..3 {
      record_attempt(&mut state, &Validation::fail("nope"));
      let d = e.decide(&state, Proficiency::Beginner);
      state.level = d.level;
      seen.push(d.level);
    }
    assert_eq!(
      seen,
      vec![
        EscalationLevel::Guide,
        EscalationLevel::Hint,
        EscalationLevel::PartialSolution,
        EscalationLevel::FullSolution
      ]
    );
  }

  #[test]
  fn beginner_gets_no_code_rule_until_partial() {
    let e = engine();
    let no_code = e.prompts.no_code_rule.trim().to_string();
    assert!(e.decide(&state_at(0, EscalationLevel::Guide), Proficiency::Beginner).instructions.contains(&no_code));
    assert!(e.decide(&state_at(1, EscalationLevel::Guide), Proficiency::Beginner).instructions.contains(&no_code));
    assert!(!e.decide(&state_at(2, EscalationLevel::Hint), Proficiency::Beginner).instructions.contains(&no_code));
    assert!(!e.decide(&state_at(1, EscalationLevel::Guide), Proficiency::Advanced).instructions.contains(&no_code));
  }

  #[test]
  fn correct_attempt_resets_and_advances_step() {
    let mut state = TutorStepState { step_id: 4, attempts: 2, level: EscalationLevel::PartialSolution, last_validation: None };
    record_attempt(&mut state, &Validation::pass());
    assert_eq!(state.attempts, 0);
    assert_eq!(state.step_id, 5);
    assert_eq!(state.level, EscalationLevel::Guide);
    assert_eq!(state.last_validation, Some(Validation::pass()));
  }

  #[test]
  fn policy_check_rejects_bad_thresholds() {
    let mut policy = EscalationPolicy::default();
    assert!(policy.check().is_ok());
    policy.advanced.hint = 0;
    assert!(policy.check().is_err());
    policy.advanced.hint = 3;
    policy.advanced.partial_solution = 2;
    assert!(policy.check().unwrap_err().starts_with("advanced"));
  }

  #[test]
  fn context_sections_are_ordered_and_windowed() {
    let e = ScaffoldingEngine::new(EscalationPolicy::default(), Prompts::default(), 4);
    let personas = seed_personas();
    let exercises = seed_exercises();
    let persona = &personas[0];
    let exercise = &exercises[0];
    let history: Vec<ConversationTurn> = (0..6)
      .map(|i| if i % 2 == 0 { ConversationTurn::student(format!("turn-{i}")) } else { ConversationTurn::tutor(format!("turn-{i}")) })
      .collect();
    let decision = e.decide(&TutorStepState::default(), Proficiency::Beginner);
    let notes = vec!["Too wordy.".to_string()];
    let note = ReferenceNote { title: "The return statement".into(), text: "return ends a method.".into(), tags: vec![] };
    let references = [&note];
    let ctx = e.compose_context(&ContextParts {
      persona,
      proficiency: Proficiency::Beginner,
      exercise,
      references: &references,
      history: &history,
      decision: &decision,
      validation_feedback: Some("Check the return type."),
      teacher_notes: &notes,
      student_input: "public void sum()",
    });

    assert!(!ctx.contains("turn-0") && !ctx.contains("turn-1"));
    let pos = |needle: &str| ctx.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
    assert!(pos(&persona.name) < pos("Too wordy."));
    assert!(pos("Too wordy.") < pos("RULES"));
    assert!(pos("RULES") < pos("JAVA REFERENCE NOTES"));
    assert!(pos("- The return statement: return ends a method.") < pos("turn-2"));
    assert!(pos("turn-5") < pos("Code Feedback: Check the return type."));
    assert!(pos("Code Feedback") < pos("Student's Last Input: public void sum()"));
    assert!(ctx.contains(e.prompts.no_code_rule.trim()));
  }

  #[test]
  fn reference_solution_only_at_full_solution() {
    let e = engine();
    let personas = seed_personas();
    let persona = &personas[0];
    let exercise = Exercise {
      id: "x".into(),
      title: "Sum".into(),
      prompt: "Write sum.".into(),
      spec: ExerciseSpec::default(),
      reference_solution: Some("SECRET_SOLUTION".into()),
    };
    let build = |level: EscalationLevel| {
      let decision = ScaffoldingDecision { level, instructions: String::new() };
      e.compose_context(&ContextParts {
        persona,
        proficiency: Proficiency::Beginner,
        exercise: &exercise,
        references: &[],
        history: &[],
        decision: &decision,
        validation_feedback: None,
        teacher_notes: &[],
        student_input: "help",
      })
    };
    assert!(!build(EscalationLevel::PartialSolution).contains("SECRET_SOLUTION"));
    assert!(build(EscalationLevel::FullSolution).contains("SECRET_SOLUTION"));
    assert!(!build(EscalationLevel::Guide).contains("CONVERSATION HISTORY"));
  }
}
