//! Loading agent configuration (prompts, personas, exercises, reference notes,
//! scaffolding thresholds, session limits) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema. Every section is
//! optional; missing ones fall back to built-in defaults and seeds.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ExerciseSpec, Persona};
use crate::retrieval::ReferenceNote;
use crate::scaffolding::{EscalationPolicy, ProficiencyPolicy};

/// Last N conversation turns included in each prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
/// Reference notes added to each prompt.
pub const DEFAULT_REFERENCE_TOP_K: usize = 2;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub personas: Vec<PersonaCfg>,
  #[serde(default)]
  pub exercises: Vec<ExerciseCfg>,
  #[serde(default)]
  pub references: Vec<ReferenceNote>,
  #[serde(default)]
  pub scaffolding: ScaffoldingCfg,
  #[serde(default)]
  pub sessions: SessionsCfg,
}

/// Persona entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct PersonaCfg {
  #[serde(default)] pub id: Option<String>,
  pub name: String,
  #[serde(default)] pub avatar: Option<String>,
  pub role: String,
  pub goal: String,
  #[serde(default)] pub backstory: String,
  #[serde(default)] pub reaction: Option<String>,
}

impl PersonaCfg {
  pub fn into_persona(self) -> Persona {
    let id = self.id.unwrap_or_else(|| slug(&self.name));
    Persona {
      id,
      avatar: self.avatar.unwrap_or_else(|| "🤖".into()),
      reaction: self.reaction.unwrap_or_else(|| "Code received. Let's take a look.".into()),
      name: self.name,
      role: self.role,
      goal: self.goal,
      backstory: self.backstory,
    }
  }
}

/// Exercise entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseCfg {
  pub id: String,
  pub title: String,
  pub prompt: String,
  #[serde(default)] pub spec: ExerciseSpec,
  #[serde(default)] pub reference_solution: Option<String>,
}

/// `[scaffolding]` table. Proficiency sub-tables are optional and replace the
/// default thresholds for that proficiency only.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScaffoldingCfg {
  pub history_window: usize,
  /// 0 disables reference notes in prompts.
  pub reference_top_k: usize,
  pub beginner: Option<ProficiencyPolicy>,
  pub intermediate: Option<ProficiencyPolicy>,
  pub advanced: Option<ProficiencyPolicy>,
}

impl Default for ScaffoldingCfg {
  fn default() -> Self {
    Self {
      history_window: DEFAULT_HISTORY_WINDOW,
      reference_top_k: DEFAULT_REFERENCE_TOP_K,
      beginner: None,
      intermediate: None,
      advanced: None,
    }
  }
}

impl ScaffoldingCfg {
  pub fn policy(&self) -> EscalationPolicy {
    let defaults = EscalationPolicy::default();
    EscalationPolicy {
      beginner: self.beginner.unwrap_or(defaults.beginner),
      intermediate: self.intermediate.unwrap_or(defaults.intermediate),
      advanced: self.advanced.unwrap_or(defaults.advanced),
    }
  }
}

/// `[sessions]` table: in-memory store limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionsCfg {
  pub max_sessions: usize,
  /// Sessions idle longer than this are dropped when a new one is created.
  pub idle_ttl_secs: u64,
}

impl Default for SessionsCfg {
  fn default() -> Self {
    Self { max_sessions: 1000, idle_ttl_secs: 60 * 60 }
  }
}

/// Text fragments used to build tutor prompts and canned replies.
/// Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// `{name}`, `{role}`, `{goal}`, `{backstory}`
  pub persona_preamble_template: String,
  /// System message for the model; same placeholders as the preamble.
  pub system_template: String,
  pub common_rules: String,
  pub guide_rule: String,
  pub hint_rule: String,
  pub partial_solution_rule: String,
  pub full_solution_rule: String,
  pub no_code_rule: String,
  /// `{reaction}`, `{title}`, `{next_title}`, `{next_prompt}`
  pub success_template: String,
  /// `{reaction}`, `{name}`, `{title}`, `{prompt}`
  pub greeting_template: String,
  /// `{persona}`, `{excerpt}`
  pub demo_reply_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      persona_preamble_template: "You are {name}, a Java tutor.\nRole: {role}\nGoal: {goal}\nBackstory: {backstory}\nStay in character and speak in {name}'s voice.".into(),
      system_template: "You are {name}. {role} Your goal: {goal}".into(),
      common_rules: "- Never reveal more than the current help level allows.\n- Always end your reply with exactly one direct follow-up question.\n- Keep the reply short: at most five sentences plus any code the help level allows.".into(),
      guide_rule: "- Help level GUIDE: ask one guiding question that helps the student take the next step on their own. Do not name the exact syntax they need.".into(),
      hint_rule: "- Help level HINT: give one concise conceptual hint that points at the missing piece, then let the student try again.".into(),
      partial_solution_rule: "- Help level PARTIAL SOLUTION: show a skeleton (method signature and structure) with the key logic left blank for the student to fill in.".into(),
      full_solution_rule: "- Help level FULL SOLUTION: the student has tried enough. Show the complete working solution and briefly explain each part.".into(),
      no_code_rule: "- No code shown yet: do not write any Java code in this reply, not even a single line.".into(),
      success_template: "{reaction} Perfect! Your solution to \"{title}\" works.\n\nReady for the next one? {next_title}: {next_prompt}".into(),
      greeting_template: "{reaction} I'm {name}. Today's challenge, {title}: {prompt}".into(),
      demo_reply_template: "[Demo Mode] {persona} is unavailable right now and would explain: {excerpt}...".into(),
    }
  }
}

/// Lowercase, dash-separated id from a display name ("Iron Man" -> "iron-man").
pub fn slug(name: &str) -> String {
  name
    .split(|c: char| !c.is_alphanumeric())
    .filter(|s| !s.is_empty())
    .map(|s| s.to_lowercase())
    .collect::<Vec<_>>()
    .join("-")
}

/// Parse and sanity-check a TOML document.
pub fn parse_agent_config(s: &str) -> Result<AgentConfig, String> {
  let cfg = toml::from_str::<AgentConfig>(s).map_err(|e| e.to_string())?;
  cfg.scaffolding.policy().check()?;
  if cfg.scaffolding.history_window == 0 {
    return Err("scaffolding.history_window must be at least 1".into());
  }
  if cfg.sessions.max_sessions == 0 {
    return Err("sessions.max_sessions must be at least 1".into());
  }
  Ok(cfg)
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "javatutor_backend", %path, personas = cfg.personas.len(), exercises = cfg.exercises.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "javatutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "javatutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
