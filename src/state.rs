//! Application state: personas, exercise bank, scaffolding engine, optional
//! model client, event sink, teacher feedback, and the in-memory session store.
//!
//! Each session sits behind its own mutex so one student's turn runs to
//! completion before their next one starts; sessions never share state.
//! Idle sessions expire and the store is capped; both are enforced when a new
//! session is created.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_agent_config_from_env, AgentConfig, SessionsCfg};
use crate::domain::{ConversationTurn, Exercise, Persona, Proficiency, TutorStepState};
use crate::error::TutorError;
use crate::events::{EventSink, TracingEventSink};
use crate::openai::{OpenAI, TutorModel};
use crate::retrieval::NoteIndex;
use crate::scaffolding::ScaffoldingEngine;
use crate::seeds::{seed_exercises, seed_personas, seed_reference_notes};

/// Teacher critiques kept per persona.
const FEEDBACK_KEEP: usize = 20;
/// Most recent critiques injected into a prompt.
pub const FEEDBACK_IN_PROMPT: usize = 3;

/// Everything one student's chat owns.
#[derive(Clone, Debug)]
pub struct TutorSession {
    pub id: String,
    pub persona_id: String,
    pub proficiency: Proficiency,
    pub exercise_id: String,
    /// Most recent turns only; see `push_turn`.
    pub history: Vec<ConversationTurn>,
    pub step: TutorStepState,
    pub last_active: Instant,
}

impl TutorSession {
    /// Append a turn, keeping at most `keep` of the newest ones.
    pub fn push_turn(&mut self, turn: ConversationTurn, keep: usize) {
        self.history.push(turn);
        if self.history.len() > keep {
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

pub type SessionHandle = Arc<Mutex<TutorSession>>;

#[derive(Clone)]
pub struct AppState {
    pub personas: Arc<Vec<Persona>>,
    pub exercises: Arc<Vec<Exercise>>,
    pub engine: Arc<ScaffoldingEngine>,
    pub notes: Arc<NoteIndex>,
    pub model: Option<Arc<dyn TutorModel>>,
    pub events: Arc<dyn EventSink>,
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    pub feedback: Arc<RwLock<HashMap<String, Vec<String>>>>,
    pub limits: SessionsCfg,
}

impl AppState {
    /// Build state from env: load config, seed personas/exercises, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let model = OpenAI::from_env(&cfg.prompts.system_template);
        if let Some(oa) = &model {
            info!(target: "javatutor_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "javatutor_backend", "OpenAI disabled (no OPENAI_API_KEY). Replies use demo mode.");
        }

        Self::from_parts(
            cfg,
            model.map(|m| Arc::new(m) as Arc<dyn TutorModel>),
            Arc::new(TracingEventSink),
        )
    }

    /// Build state from an already-loaded config. Empty persona or exercise
    /// tables fall back to the built-in seeds.
    pub fn from_parts(cfg: AgentConfig, model: Option<Arc<dyn TutorModel>>, events: Arc<dyn EventSink>) -> Self {
        let personas: Vec<Persona> = if cfg.personas.is_empty() {
            seed_personas()
        } else {
            cfg.personas.into_iter().map(|p| p.into_persona()).collect()
        };
        let exercises: Vec<Exercise> = if cfg.exercises.is_empty() {
            seed_exercises()
        } else {
            cfg.exercises
                .into_iter()
                .map(|e| Exercise {
                    id: e.id,
                    title: e.title,
                    prompt: e.prompt,
                    spec: e.spec,
                    reference_solution: e.reference_solution,
                })
                .collect()
        };
        let notes = if cfg.references.is_empty() {
            seed_reference_notes()
        } else {
            cfg.references
        };
        info!(
            target: "javatutor_backend",
            personas = personas.len(),
            exercises = exercises.len(),
            reference_notes = notes.len(),
            "Startup inventory"
        );

        let engine = ScaffoldingEngine::new(cfg.scaffolding.policy(), cfg.prompts, cfg.scaffolding.history_window);
        let notes = NoteIndex::new(notes, cfg.scaffolding.reference_top_k);

        Self {
            personas: Arc::new(personas),
            exercises: Arc::new(exercises),
            engine: Arc::new(engine),
            notes: Arc::new(notes),
            model,
            events,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            feedback: Arc::new(RwLock::new(HashMap::new())),
            limits: cfg.sessions,
        }
    }

    /// Conversation turns kept per session; older ones are never read.
    pub fn history_keep(&self) -> usize {
        self.engine.history_window
    }

    pub fn persona(&self, id: &str) -> Result<&Persona, TutorError> {
        self.personas
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| TutorError::UnknownPersona(id.to_string()))
    }

    pub fn exercise(&self, id: &str) -> Result<&Exercise, TutorError> {
        self.exercises
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| TutorError::UnknownExercise(id.to_string()))
    }

    /// Selection policy: uniformly among exercises other than `current`,
    /// or `current` itself if it is the only one.
    pub fn next_exercise<R: Rng + ?Sized>(&self, current: &str, rng: &mut R) -> Option<&Exercise> {
        let others: Vec<&Exercise> = self.exercises.iter().filter(|e| e.id != current).collect();
        match others.choose(rng) {
            Some(e) => Some(*e),
            None => {
                warn!(target: "tutor", %current, "Only one exercise configured; repeating it");
                self.exercises.first()
            }
        }
    }

    /// Register a new session. The persona must exist; nothing is stored otherwise.
    #[instrument(level = "info", skip(self), fields(%persona_id, %proficiency))]
    pub async fn create_session(&self, persona_id: &str, proficiency: Proficiency) -> Result<TutorSession, TutorError> {
        self.persona(persona_id)?;
        let first = self.exercises.first().ok_or_else(|| TutorError::UnknownExercise(String::new()))?;

        let session = TutorSession {
            id: Uuid::new_v4().to_string(),
            persona_id: persona_id.to_string(),
            proficiency,
            exercise_id: first.id.clone(),
            history: Vec::new(),
            step: TutorStepState::default(),
            last_active: Instant::now(),
        };

        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions);
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session.clone())));
        drop(sessions);
        info!(target: "tutor", session_id = %session.id, exercise = %session.exercise_id, "Session created");
        Ok(session)
    }

    pub async fn session(&self, id: &str) -> Result<SessionHandle, TutorError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TutorError::UnknownSession(id.to_string()))
    }

    /// Drop a session. Unknown ids are an error so callers can tell.
    pub async fn end_session(&self, id: &str) -> Result<(), TutorError> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!(target: "tutor", session_id = %id, "Session ended");
                Ok(())
            }
            None => Err(TutorError::UnknownSession(id.to_string())),
        }
    }

    /// Expire idle sessions, then evict the least recently active ones until a
    /// new session fits. Sessions locked mid-turn are left alone.
    fn prune(&self, sessions: &mut HashMap<String, SessionHandle>) {
        let ttl = Duration::from_secs(self.limits.idle_ttl_secs);
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(s) => s.last_active.elapsed() < ttl,
            Err(_) => true,
        });
        while sessions.len() >= self.limits.max_sessions {
            let oldest = sessions
                .iter()
                .filter_map(|(id, handle)| handle.try_lock().ok().map(|s| (id.clone(), s.last_active)))
                .min_by_key(|(_, last_active)| *last_active);
            match oldest {
                Some((id, _)) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
        if sessions.len() < before {
            debug!(target: "tutor", removed = before - sessions.len(), remaining = sessions.len(), "Pruned sessions");
        }
    }

    /// Store a teacher's critique of a tutor reply for later prompts.
    #[instrument(level = "info", skip(self, critique), fields(%persona_id, critique_len = critique.len()))]
    pub async fn add_feedback(&self, persona_id: &str, critique: &str) -> Result<(), TutorError> {
        self.persona(persona_id)?;
        let mut feedback = self.feedback.write().await;
        let notes = feedback.entry(persona_id.to_string()).or_default();
        notes.push(critique.trim().to_string());
        if notes.len() > FEEDBACK_KEEP {
            let excess = notes.len() - FEEDBACK_KEEP;
            notes.drain(..excess);
        }
        Ok(())
    }

    /// Newest first, at most `FEEDBACK_IN_PROMPT`.
    pub async fn recent_feedback(&self, persona_id: &str) -> Vec<String> {
        self.feedback
            .read()
            .await
            .get(persona_id)
            .map(|notes| notes.iter().rev().take(FEEDBACK_IN_PROMPT).cloned().collect())
            .unwrap_or_default()
    }
}
