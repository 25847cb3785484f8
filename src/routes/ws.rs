//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::TutorError;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "javatutor_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "javatutor_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "javatutor_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "javatutor_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "javatutor_backend", "WebSocket disconnected");
}

fn error_msg(e: TutorError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { persona, proficiency } => {
      match start_session(state, &persona, proficiency).await {
        Ok(session) => {
          info!(target: "tutor", session_id = %session.session_id, %persona, "WS session started");
          ServerWsMessage::Session { session }
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::StudentMessage { session_id, text } => {
      match process_turn(state, &session_id, &text).await {
        Ok(reply) => {
          info!(target: "tutor", %session_id, level = %reply.level, solved = reply.solved, "WS student_message answered");
          ServerWsMessage::TutorReply { reply }
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::ClearChat { session_id } => match clear_chat(state, &session_id).await {
      Ok(session) => ServerWsMessage::Session { session },
      Err(e) => error_msg(e),
    },

    ClientWsMessage::EndSession { session_id } => match end_session(state, &session_id).await {
      Ok(()) => ServerWsMessage::SessionEnded,
      Err(e) => error_msg(e),
    },

    ClientWsMessage::SetProficiency { session_id, proficiency } => {
      match set_proficiency(state, &session_id, proficiency).await {
        Ok(session) => ServerWsMessage::Session { session },
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::TrainingFeedback { persona, bad_response, critique } => {
      match submit_feedback(state, &persona, &bad_response, &critique).await {
        Ok(()) => ServerWsMessage::FeedbackSaved,
        Err(e) => error_msg(e),
      }
    }
  }
}
