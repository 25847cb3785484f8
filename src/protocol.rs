//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{EscalationLevel, Exercise, Persona, Proficiency, TutorStepState, Validation};
use crate::state::TutorSession;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        persona: String,
        #[serde(default)]
        proficiency: Proficiency,
    },
    StudentMessage {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
    ClearChat {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    EndSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SetProficiency {
        #[serde(rename = "sessionId")]
        session_id: String,
        proficiency: Proficiency,
    },
    TrainingFeedback {
        persona: String,
        #[serde(rename = "badResponse")]
        bad_response: String,
        critique: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    TutorReply {
        reply: TutorResponse,
    },
    FeedbackSaved,
    SessionEnded,
    Error {
        message: String,
    },
}

/// Result of one processed student message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorResponse {
    pub session_id: String,
    pub text: String,
    pub level: EscalationLevel,
    pub attempts: u32,
    pub step_id: u32,
    /// Exercise that is active after this turn.
    pub exercise: ExerciseOut,
    /// Present when the input looked like code and was checked.
    pub validation: Option<Validation>,
    pub solved: bool,
    /// True when the model was unavailable and a canned reply was used.
    pub demo_mode: bool,
}

/// DTO used by both WS and HTTP for exercise delivery. The checks and the
/// reference solution stay on the server.
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseOut {
    pub id: String,
    pub title: String,
    pub prompt: String,
}

pub fn exercise_out(e: &Exercise) -> ExerciseOut {
    ExerciseOut {
        id: e.id.clone(),
        title: e.title.clone(),
        prompt: e.prompt.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonaOut {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub role: String,
}

pub fn persona_out(p: &Persona) -> PersonaOut {
    PersonaOut {
        id: p.id.clone(),
        name: p.name.clone(),
        avatar: p.avatar.clone(),
        role: p.role.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: String,
    pub persona: PersonaOut,
    pub proficiency: Proficiency,
    pub exercise: ExerciseOut,
    pub step: TutorStepState,
    /// Tutor's opening message for the current exercise.
    pub greeting: String,
}

pub fn session_out(s: &TutorSession, persona: &Persona, exercise: &Exercise, greeting: String) -> SessionOut {
    SessionOut {
        session_id: s.id.clone(),
        persona: persona_out(persona),
        proficiency: s.proficiency,
        exercise: exercise_out(exercise),
        step: s.step.clone(),
        greeting,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    pub persona: String,
    #[serde(default)]
    pub proficiency: Proficiency,
}

#[derive(Debug, Deserialize)]
pub struct MessageIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRefIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ProficiencyIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub proficiency: Proficiency,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackIn {
    pub persona: String,
    #[serde(rename = "badResponse")]
    pub bad_response: String,
    pub critique: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
