//! Application-level configuration loading, including the runtime team palette.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ECO_QUIZ_BACK_CONFIG_PATH";

/// Seconds each question stays open for answers.
const DEFAULT_QUESTION_DURATION_SECS: u64 = 20;
/// Number of questions sampled from the bank for a session.
const DEFAULT_QUESTIONS_PER_SESSION: usize = 20;
/// Points awarded for a correct answer submitted instantly.
const DEFAULT_SCORE_BASE: i64 = 1000;
/// Points lost per elapsed second on a correct answer.
const DEFAULT_SCORE_DECAY_PER_SECOND: i64 = 50;
/// Delay between the quiz-start broadcast and the first question.
const DEFAULT_QUIZ_START_DELAY_SECS: u64 = 2;
/// How long an ended session's orchestrator state is kept before eviction.
const DEFAULT_ENDED_SESSION_TTL_SECS: u64 = 3600;

/// One entry of the ordered team palette used at session bootstrap.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamSlot {
    /// Display name assigned to the team.
    pub name: String,
    /// CSS color class assigned to the team.
    pub color: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    team_palette: Vec<TeamSlot>,
    question_duration_secs: u64,
    questions_per_session: usize,
    score_base: i64,
    score_decay_per_second: i64,
    quiz_start_delay_secs: u64,
    ended_session_ttl_secs: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        teams = app_config.team_palette.len(),
                        "loaded configuration from file"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Palette entry for the team created at `index`, when the palette is large enough.
    pub fn team_slot(&self, index: usize) -> Option<&TeamSlot> {
        self.team_palette.get(index)
    }

    /// Number of teams the palette can bootstrap.
    pub fn max_team_count(&self) -> usize {
        self.team_palette.len()
    }

    /// How long a question accepts answers.
    pub fn question_duration(&self) -> Duration {
        Duration::from_secs(self.question_duration_secs)
    }

    /// How long a question accepts answers, in whole seconds.
    pub fn question_duration_secs(&self) -> u64 {
        self.question_duration_secs
    }

    /// How many questions are sampled from the bank per session.
    pub fn questions_per_session(&self) -> usize {
        self.questions_per_session
    }

    /// Points awarded for an instant correct answer.
    pub fn score_base(&self) -> i64 {
        self.score_base
    }

    /// Points lost per elapsed second on a correct answer.
    pub fn score_decay_per_second(&self) -> i64 {
        self.score_decay_per_second
    }

    /// Pause between the quiz-start broadcast and the first question.
    pub fn quiz_start_delay(&self) -> Duration {
        Duration::from_secs(self.quiz_start_delay_secs)
    }

    /// Retention period for ended sessions before their state is evicted.
    pub fn ended_session_ttl(&self) -> Duration {
        Duration::from_secs(self.ended_session_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            team_palette: default_team_palette(),
            question_duration_secs: DEFAULT_QUESTION_DURATION_SECS,
            questions_per_session: DEFAULT_QUESTIONS_PER_SESSION,
            score_base: DEFAULT_SCORE_BASE,
            score_decay_per_second: DEFAULT_SCORE_DECAY_PER_SECOND,
            quiz_start_delay_secs: DEFAULT_QUIZ_START_DELAY_SECS,
            ended_session_ttl_secs: DEFAULT_ENDED_SESSION_TTL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    team_palette: Option<Vec<TeamSlot>>,
    #[serde(default)]
    question_duration_secs: Option<u64>,
    #[serde(default)]
    questions_per_session: Option<usize>,
    #[serde(default)]
    score_base: Option<i64>,
    #[serde(default)]
    score_decay_per_second: Option<i64>,
    #[serde(default)]
    quiz_start_delay_secs: Option<u64>,
    #[serde(default)]
    ended_session_ttl_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            team_palette: value
                .team_palette
                .filter(|palette| !palette.is_empty())
                .unwrap_or(defaults.team_palette),
            question_duration_secs: value
                .question_duration_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.question_duration_secs),
            questions_per_session: value
                .questions_per_session
                .filter(|count| *count > 0)
                .unwrap_or(defaults.questions_per_session),
            score_base: value.score_base.unwrap_or(defaults.score_base),
            score_decay_per_second: value
                .score_decay_per_second
                .unwrap_or(defaults.score_decay_per_second),
            quiz_start_delay_secs: value
                .quiz_start_delay_secs
                .unwrap_or(defaults.quiz_start_delay_secs),
            ended_session_ttl_secs: value
                .ended_session_ttl_secs
                .unwrap_or(defaults.ended_session_ttl_secs),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in team palette shipped with the binary.
fn default_team_palette() -> Vec<TeamSlot> {
    [
        ("Forêt", "team-color-1"),
        ("Océan", "team-color-2"),
        ("Montagne", "team-color-3"),
        ("Prairie", "team-color-4"),
        ("Ciel", "team-color-5"),
        ("Désert", "team-color-6"),
    ]
    .into_iter()
    .map(|(name, color)| TeamSlot {
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}
