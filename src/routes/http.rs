//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{info, instrument, warn};

use crate::error::TutorError;
use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

impl IntoResponse for TutorError {
  fn into_response(self) -> Response {
    let status = match &self {
      TutorError::UnknownPersona(_) | TutorError::UnknownSession(_) => StatusCode::NOT_FOUND,
      TutorError::UnknownExercise(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(target: "tutor", %status, error = %self, "Request rejected");
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_personas(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let list: Vec<PersonaOut> = state.personas.iter().map(persona_out).collect();
  Json(list)
}

#[instrument(level = "info", skip(state, body), fields(persona = %body.persona, proficiency = %body.proficiency))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> Result<Json<SessionOut>, TutorError> {
  let session = start_session(&state, &body.persona, body.proficiency).await?;
  info!(target: "tutor", session_id = %session.session_id, exercise = %session.exercise.id, "HTTP session started");
  Ok(Json(session))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id, text_len = body.text.len()))]
pub async fn http_post_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MessageIn>,
) -> Result<Json<TutorResponse>, TutorError> {
  let reply = process_turn(&state, &body.session_id, &body.text).await?;
  info!(target: "tutor", level = %reply.level, solved = reply.solved, demo_mode = reply.demo_mode, "HTTP message answered");
  Ok(Json(reply))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id))]
pub async fn http_post_clear(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRefIn>,
) -> Result<Json<SessionOut>, TutorError> {
  Ok(Json(clear_chat(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> Result<Json<HealthOut>, TutorError> {
  end_session(&state, &session_id).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id, proficiency = %body.proficiency))]
pub async fn http_post_proficiency(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProficiencyIn>,
) -> Result<Json<SessionOut>, TutorError> {
  Ok(Json(set_proficiency(&state, &body.session_id, body.proficiency).await?))
}

#[instrument(level = "info", skip(state, body), fields(persona = %body.persona, critique_len = body.critique.len()))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FeedbackIn>,
) -> Result<Json<HealthOut>, TutorError> {
  submit_feedback(&state, &body.persona, &body.bad_response, &body.critique).await?;
  Ok(Json(HealthOut { ok: true }))
}
