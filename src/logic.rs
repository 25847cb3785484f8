//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Processing one student message (validate, escalate, compose, ask the model)
//!   - Starting a session and greeting the student
//!   - Clearing a chat, changing proficiency and ending a session
//!   - Storing teacher feedback on tutor replies

use tracing::{debug, error, info, instrument};

use crate::domain::{ConversationTurn, Exercise, Persona, Proficiency};
use crate::error::TutorError;
use crate::events::TutorEvent;
use crate::protocol::{exercise_out, session_out, SessionOut, TutorResponse};
use crate::scaffolding::{record_attempt, ContextParts};
use crate::state::{AppState, TutorSession};
use crate::util::{excerpt, fill_template, format_reply, trunc_for_log};
use crate::validator::{looks_like_code, validate};

/// Characters of the student's input quoted back in a demo-mode reply.
const DEMO_EXCERPT_CHARS: usize = 50;

/// Handle one student message for `session_id`.
///
/// Lookups happen before anything is mutated, so an unknown session, persona
/// or exercise leaves the session untouched. The session mutex is held for the
/// whole turn, model call included.
#[instrument(level = "info", skip(state, message), fields(%session_id, message_len = message.len()))]
pub async fn process_turn(state: &AppState, session_id: &str, message: &str) -> Result<TutorResponse, TutorError> {
  let handle = state.session(session_id).await?;
  let mut session = handle.lock().await;
  let persona = state.persona(&session.persona_id)?.clone();
  let exercise = state.exercise(&session.exercise_id)?.clone();
  let input = message.trim();
  let keep = state.history_keep();
  session.touch();

  let mut validation = None;
  if looks_like_code(input) {
    let v = validate(input, &exercise.spec);
    let failed_before = session.step.attempts;
    state.events.emit(TutorEvent::AttemptRecorded {
      session_id: session.id.clone(),
      persona_id: persona.id.clone(),
      exercise_id: exercise.id.clone(),
      proficiency: session.proficiency,
      attempt_number: failed_before + 1,
      correct: v.correct,
    });
    record_attempt(&mut session.step, &v);
    debug!(target: "tutor", correct = v.correct, attempts = session.step.attempts, message = %v.message, "Code checked");

    if v.correct {
      return Ok(complete_exercise(state, &mut session, &persona, &exercise, input, failed_before, keep));
    }
    validation = Some(v);
  }

  let decision = state.engine.decide(&session.step, session.proficiency);
  let notes = state.recent_feedback(&persona.id).await;
  let references = state.notes.search(&format!("{} {} {}", exercise.title, exercise.prompt, input));
  let context = state.engine.compose_context(&ContextParts {
    persona: &persona,
    proficiency: session.proficiency,
    exercise: &exercise,
    references: &references,
    history: &session.history,
    decision: &decision,
    validation_feedback: validation.as_ref().map(|v| v.message.as_str()),
    teacher_notes: &notes,
    student_input: input,
  });
  debug!(target: "tutor", references = references.len(), context = %trunc_for_log(&context, 400), "Context ready");

  let (text, demo_mode) = match &state.model {
    Some(model) => match model.reply(&persona, &context).await {
      Ok(raw) => {
        let text = format_reply(&raw);
        if text.is_empty() {
          error!(target: "tutor", persona = %persona.id, "Model reply was empty after formatting; using demo reply.");
          (demo_reply(state, &persona, input), true)
        } else {
          (text, false)
        }
      }
      Err(e) => {
        error!(target: "tutor", persona = %persona.id, error = %e, "Model call failed; using demo reply.");
        (demo_reply(state, &persona, input), true)
      }
    },
    None => {
      debug!(target: "tutor", persona = %persona.id, "Reply via demo mode.");
      (demo_reply(state, &persona, input), true)
    }
  };

  // Only a recorded attempt commits a level; prose leaves the step untouched.
  if validation.is_some() {
    session.step.level = decision.level;
  }
  session.push_turn(ConversationTurn::student(input), keep);
  session.push_turn(ConversationTurn::tutor(text.clone()), keep);

  state.events.emit(TutorEvent::QuestionAnswered {
    session_id: session.id.clone(),
    persona_id: persona.id.clone(),
    level: decision.level,
    response_len: text.len(),
    demo_mode,
  });

  Ok(TutorResponse {
    session_id: session.id.clone(),
    text,
    level: decision.level,
    attempts: session.step.attempts,
    step_id: session.step.step_id,
    exercise: exercise_out(&exercise),
    validation,
    solved: false,
    demo_mode,
  })
}

/// Correct submission: congratulate, move to the next exercise. No model call.
fn complete_exercise(
  state: &AppState,
  session: &mut TutorSession,
  persona: &Persona,
  solved: &Exercise,
  input: &str,
  failed_attempts: u32,
  keep: usize,
) -> TutorResponse {
  let next = state
    .next_exercise(&solved.id, &mut rand::thread_rng())
    .cloned()
    .unwrap_or_else(|| solved.clone());

  let text = fill_template(
    &state.engine.prompts.success_template,
    &[
      ("reaction", persona.reaction.as_str()),
      ("name", persona.name.as_str()),
      ("title", solved.title.as_str()),
      ("next_title", next.title.as_str()),
      ("next_prompt", next.prompt.as_str()),
    ],
  );

  session.exercise_id = next.id.clone();
  session.push_turn(ConversationTurn::student(input), keep);
  session.push_turn(ConversationTurn::tutor(text.clone()), keep);

  state.events.emit(TutorEvent::ExerciseSolved {
    session_id: session.id.clone(),
    persona_id: persona.id.clone(),
    exercise_id: solved.id.clone(),
    failed_attempts,
  });
  info!(target: "tutor", session_id = %session.id, solved = %solved.id, next = %next.id, "Exercise solved");

  TutorResponse {
    session_id: session.id.clone(),
    text,
    level: session.step.level,
    attempts: session.step.attempts,
    step_id: session.step.step_id,
    exercise: exercise_out(&next),
    validation: session.step.last_validation.clone(),
    solved: true,
    demo_mode: false,
  }
}

fn demo_reply(state: &AppState, persona: &Persona, input: &str) -> String {
  let quoted = excerpt(input, DEMO_EXCERPT_CHARS);
  fill_template(
    &state.engine.prompts.demo_reply_template,
    &[("persona", persona.name.as_str()), ("excerpt", quoted.as_str())],
  )
}

fn greeting(state: &AppState, persona: &Persona, exercise: &Exercise) -> String {
  fill_template(
    &state.engine.prompts.greeting_template,
    &[
      ("reaction", persona.reaction.as_str()),
      ("name", persona.name.as_str()),
      ("title", exercise.title.as_str()),
      ("prompt", exercise.prompt.as_str()),
    ],
  )
}

/// Open a new session with `persona_id`. The greeting becomes the first tutor turn.
#[instrument(level = "info", skip(state), fields(%persona_id, %proficiency))]
pub async fn start_session(state: &AppState, persona_id: &str, proficiency: Proficiency) -> Result<SessionOut, TutorError> {
  let created = state.create_session(persona_id, proficiency).await?;
  let handle = state.session(&created.id).await?;
  let mut session = handle.lock().await;
  let persona = state.persona(&session.persona_id)?;
  let exercise = state.exercise(&session.exercise_id)?;

  let text = greeting(state, persona, exercise);
  session.push_turn(ConversationTurn::tutor(text.clone()), state.history_keep());
  Ok(session_out(&session, persona, exercise, text))
}

/// Drop the conversation and restart the current exercise from Guide.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn clear_chat(state: &AppState, session_id: &str) -> Result<SessionOut, TutorError> {
  let handle = state.session(session_id).await?;
  let mut session = handle.lock().await;
  let persona = state.persona(&session.persona_id)?;
  let exercise = state.exercise(&session.exercise_id)?;

  session.history.clear();
  session.step.reset_exercise();
  session.touch();
  let text = greeting(state, persona, exercise);
  session.push_turn(ConversationTurn::tutor(text.clone()), state.history_keep());
  info!(target: "tutor", %session_id, exercise = %exercise.id, "Chat cleared");
  Ok(session_out(&session, persona, exercise, text))
}

/// Switch proficiency mid-exercise. Attempts and the committed level are kept.
#[instrument(level = "info", skip(state), fields(%session_id, %proficiency))]
pub async fn set_proficiency(state: &AppState, session_id: &str, proficiency: Proficiency) -> Result<SessionOut, TutorError> {
  let handle = state.session(session_id).await?;
  let mut session = handle.lock().await;
  let persona = state.persona(&session.persona_id)?;
  let exercise = state.exercise(&session.exercise_id)?;

  session.proficiency = proficiency;
  session.touch();
  let text = greeting(state, persona, exercise);
  Ok(session_out(&session, persona, exercise, text))
}

/// Forget a session and its conversation.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<(), TutorError> {
  state.end_session(session_id).await
}

/// Store a teacher critique of a bad tutor reply for `persona_id`.
#[instrument(level = "info", skip(state, bad_response, critique), fields(%persona_id, critique_len = critique.len()))]
pub async fn submit_feedback(state: &AppState, persona_id: &str, bad_response: &str, critique: &str) -> Result<(), TutorError> {
  let critique = critique.trim();
  let note = if bad_response.trim().is_empty() {
    critique.to_string()
  } else {
    format!("{} (about the reply \"{}...\")", critique, excerpt(bad_response.trim(), 60))
  };
  state.add_feedback(persona_id, &note).await?;
  info!(target: "tutor", %persona_id, bad_response = %trunc_for_log(bad_response, 80), "Teacher feedback stored");
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::config::AgentConfig;
  use crate::domain::EscalationLevel;
  use crate::events::testing::RecordingSink;
  use crate::openai::testing::ScriptedModel;
  use crate::openai::TutorModel;
  use crate::scaffolding::ProficiencyPolicy;

  const SUM_OK: &str = "public int sum(int a, int b) { return a + b; }";
  const SUM_BAD: &str = "public void sum(int a, int b) { System.out.println(a + b); }";

  fn state_with(model: Option<Arc<ScriptedModel>>) -> (AppState, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let model = model.map(|m| m as Arc<dyn TutorModel>);
    (AppState::from_parts(AgentConfig::default(), model, sink.clone()), sink)
  }

  fn replies(n: usize) -> Vec<Result<String, u16>> {
    (0..n).map(|i| Ok(format!("reply {i}"))).collect()
  }

  #[tokio::test]
  async fn prose_question_is_not_an_attempt() {
    let model = Arc::new(ScriptedModel::new(replies(1)));
    let (state, sink) = state_with(Some(model.clone()));
    let s = start_session(&state, "batman", Proficiency::Beginner).await.expect("session");

    let r = process_turn(&state, &s.session_id, "What is a method?").await.expect("turn");
    assert_eq!(r.text, "reply 0");
    assert_eq!(r.level, EscalationLevel::Guide);
    assert_eq!(r.attempts, 0);
    assert!(r.validation.is_none());
    assert!(!r.demo_mode);

    let ctx = &model.contexts()[0];
    assert!(ctx.contains("Student's Last Input: What is a method?"));
    assert!(!ctx.contains("Code Feedback"));
    assert!(ctx.contains(state.engine.prompts.no_code_rule.trim()));

    let events = sink.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], TutorEvent::QuestionAnswered { demo_mode: false, .. }));

    // greeting + student + tutor
    let handle = state.session(&s.session_id).await.expect("stored");
    assert_eq!(handle.lock().await.history.len(), 3);
  }

  #[tokio::test]
  async fn beginner_escalates_one_level_per_failed_attempt() {
    let model = Arc::new(ScriptedModel::new(replies(3)));
    let (state, sink) = state_with(Some(model.clone()));
    let s = start_session(&state, "yoda", Proficiency::Beginner).await.expect("session");

    let mut levels = vec![];
    for _ in 0..3 {
      let r = process_turn(&state, &s.session_id, SUM_BAD).await.expect("turn");
      assert_eq!(r.validation.as_ref().map(|v| v.correct), Some(false));
      levels.push(r.level);
    }
    assert_eq!(
      levels,
      vec![EscalationLevel::Hint, EscalationLevel::PartialSolution, EscalationLevel::FullSolution]
    );

    let contexts = model.contexts();
    assert!(contexts[0].contains("Code Feedback:"));
    assert!(contexts[0].contains(state.engine.prompts.no_code_rule.trim()));
    assert!(!contexts[1].contains(state.engine.prompts.no_code_rule.trim()));
    assert!(!contexts[1].contains("REFERENCE SOLUTION"));
    assert!(contexts[2].contains("REFERENCE SOLUTION"));

    let attempts: Vec<u32> = sink
      .take()
      .into_iter()
      .filter_map(|e| match e {
        TutorEvent::AttemptRecorded { attempt_number, correct: false, .. } => Some(attempt_number),
        _ => None,
      })
      .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn prose_after_a_failure_keeps_the_level() {
    let (state, _sink) = state_with(None);
    let s = start_session(&state, "spider-gwen", Proficiency::Advanced).await.expect("session");

    let failed = process_turn(&state, &s.session_id, SUM_BAD).await.expect("failed turn");
    assert_eq!((failed.attempts, failed.level), (1, EscalationLevel::Hint));

    for question in ["Why is that wrong?", "Can you explain more?", "I still do not get it"] {
      let r = process_turn(&state, &s.session_id, question).await.expect("prose turn");
      assert_eq!((r.attempts, r.level), (1, EscalationLevel::Hint), "after {question:?}");
    }
    let handle = state.session(&s.session_id).await.expect("stored");
    assert_eq!(handle.lock().await.step.level, EscalationLevel::Hint);
  }

  #[tokio::test]
  async fn faster_proficiency_escalates_sooner_on_code() {
    let mut cfg = AgentConfig::default();
    cfg.scaffolding.beginner = Some(ProficiencyPolicy {
      hint: 2,
      partial_solution: 3,
      full_solution: 4,
      code_allowed_from: EscalationLevel::PartialSolution,
    });
    let state = AppState::from_parts(cfg, None, Arc::new(RecordingSink::default()));

    let mut levels = vec![];
    for prof in [Proficiency::Beginner, Proficiency::Advanced] {
      let s = start_session(&state, "shuri", prof).await.expect("session");
      let mut seen = vec![];
      for _ in 0..2 {
        seen.push(process_turn(&state, &s.session_id, SUM_BAD).await.expect("turn").level);
      }
      levels.push(seen);
    }
    assert_eq!(levels[0], vec![EscalationLevel::Guide, EscalationLevel::Hint]);
    assert_eq!(levels[1], vec![EscalationLevel::Hint, EscalationLevel::PartialSolution]);
  }

  #[tokio::test]
  async fn history_stays_within_the_window() {
    let (state, _sink) = state_with(None);
    let s = start_session(&state, "zee", Proficiency::Beginner).await.expect("session");
    for i in 0..20 {
      process_turn(&state, &s.session_id, &format!("question number {i}")).await.expect("turn");
    }
    let handle = state.session(&s.session_id).await.expect("stored");
    let session = handle.lock().await;
    assert_eq!(session.history.len(), state.history_keep());
    assert_eq!(session.history.last().map(|t| t.role), Some(crate::domain::Role::Tutor));
  }

  #[tokio::test]
  async fn reference_notes_reach_the_prompt() {
    let model = Arc::new(ScriptedModel::new(replies(1)));
    let (state, _sink) = state_with(Some(model.clone()));
    let s = start_session(&state, "nova", Proficiency::Beginner).await.expect("session");
    process_turn(&state, &s.session_id, "what should the method return?").await.expect("turn");
    assert!(model.contexts()[0].contains("JAVA REFERENCE NOTES"));
  }

  #[tokio::test]
  async fn ended_session_rejects_messages() {
    let (state, _sink) = state_with(None);
    let s = start_session(&state, "batman", Proficiency::Beginner).await.expect("session");
    end_session(&state, &s.session_id).await.expect("ended");
    assert!(matches!(
      process_turn(&state, &s.session_id, "hi").await,
      Err(TutorError::UnknownSession(_))
    ));
  }

  #[tokio::test]
  async fn correct_code_advances_without_model_call() {
    let model = Arc::new(ScriptedModel::new(replies(1)));
    let (state, sink) = state_with(Some(model.clone()));
    let s = start_session(&state, "shuri", Proficiency::Intermediate).await.expect("session");
    assert_eq!(s.exercise.id, "sum");

    process_turn(&state, &s.session_id, SUM_BAD).await.expect("failed turn");
    let r = process_turn(&state, &s.session_id, SUM_OK).await.expect("solving turn");

    assert!(r.solved);
    assert_eq!(r.step_id, 1);
    assert_eq!(r.attempts, 0);
    assert_eq!(r.level, EscalationLevel::Guide);
    assert_ne!(r.exercise.id, "sum");
    assert!(r.text.contains("Sum of two integers"));
    assert!(r.text.contains(&r.exercise.title));
    assert_eq!(model.contexts().len(), 1);

    let events = sink.take();
    assert!(events.iter().any(|e| matches!(
      e,
      TutorEvent::ExerciseSolved { exercise_id, failed_attempts: 1, .. } if exercise_id == "sum"
    )));

    let handle = state.session(&s.session_id).await.expect("stored");
    assert_eq!(handle.lock().await.exercise_id, r.exercise.id);
  }

  #[tokio::test]
  async fn model_failure_falls_back_to_demo_mode() {
    let model = Arc::new(ScriptedModel::new(vec![Err(503)]));
    let (state, _sink) = state_with(Some(model));
    let s = start_session(&state, "elsa", Proficiency::Beginner).await.expect("session");

    let r = process_turn(&state, &s.session_id, SUM_BAD).await.expect("turn");
    assert!(r.demo_mode);
    assert!(r.text.starts_with("[Demo Mode] Elsa"));
    assert!(r.text.contains(&excerpt(SUM_BAD, DEMO_EXCERPT_CHARS)));
    // the attempt still counts
    assert_eq!(r.attempts, 1);
    assert_eq!(r.level, EscalationLevel::Hint);
  }

  #[tokio::test]
  async fn think_blocks_never_reach_the_student() {
    let model = Arc::new(ScriptedModel::new(vec![Ok("<think>they need a nudge</think>\nWhat should sum return?".into())]));
    let (state, _sink) = state_with(Some(model));
    let s = start_session(&state, "zee", Proficiency::Advanced).await.expect("session");

    let r = process_turn(&state, &s.session_id, "help").await.expect("turn");
    assert_eq!(r.text, "What should sum return?");
  }

  #[tokio::test]
  async fn unknown_session_is_an_error() {
    let (state, sink) = state_with(None);
    let err = process_turn(&state, "missing", "hi").await.unwrap_err();
    assert!(matches!(err, TutorError::UnknownSession(_)));
    assert!(sink.take().is_empty());
  }

  #[tokio::test]
  async fn clear_chat_restarts_current_exercise() {
    let (state, _sink) = state_with(None);
    let s = start_session(&state, "nova", Proficiency::Beginner).await.expect("session");
    process_turn(&state, &s.session_id, SUM_BAD).await.expect("turn");

    let cleared = clear_chat(&state, &s.session_id).await.expect("clear");
    assert_eq!(cleared.step.attempts, 0);
    assert_eq!(cleared.step.level, EscalationLevel::Guide);
    assert_eq!(cleared.exercise.id, "sum");
    let handle = state.session(&s.session_id).await.expect("stored");
    assert_eq!(handle.lock().await.history.len(), 1);
  }

  #[tokio::test]
  async fn proficiency_change_keeps_progress() {
    let (state, _sink) = state_with(None);
    let s = start_session(&state, "iron-man", Proficiency::Beginner).await.expect("session");
    process_turn(&state, &s.session_id, SUM_BAD).await.expect("turn");

    let out = set_proficiency(&state, &s.session_id, Proficiency::Advanced).await.expect("switch");
    assert_eq!(out.proficiency, Proficiency::Advanced);
    assert_eq!(out.step.attempts, 1);
    assert_eq!(out.step.level, EscalationLevel::Hint);
  }

  #[tokio::test]
  async fn teacher_feedback_reaches_the_prompt() {
    let model = Arc::new(ScriptedModel::new(replies(1)));
    let (state, _sink) = state_with(Some(model.clone()));
    submit_feedback(&state, "batman", "Here is the full answer: ...", "Do not give away the answer.")
      .await
      .expect("feedback");
    assert!(submit_feedback(&state, "unknown", "", "x").await.is_err());

    let s = start_session(&state, "batman", Proficiency::Beginner).await.expect("session");
    process_turn(&state, &s.session_id, "hi").await.expect("turn");
    assert!(model.contexts()[0].contains("Do not give away the answer."));
  }
}
