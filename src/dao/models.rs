use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Quiz session shared across layers, identified by its shareable code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Short human-shareable session code.
    pub id: String,
    /// Display name of the session.
    pub name: String,
    /// Name of the organizer who created the session.
    pub organizer: String,
    /// Number of teams configured at creation.
    pub team_count: usize,
    /// Whether the session is still accepting activity.
    pub active: bool,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
}

/// Representation of a team stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name drawn from the team palette.
    pub name: String,
    /// Session this team belongs to.
    pub session_id: String,
    /// Accumulated score across closed questions.
    pub score: i64,
    /// CSS color class drawn from the team palette.
    pub color: String,
}

/// Role a participant holds within a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PlayerRole {
    /// May start the quiz and advance questions.
    Organizer,
    /// Regular team member.
    Participant,
}

impl PlayerRole {
    /// Whether this role carries organizer privileges.
    pub fn is_organizer(self) -> bool {
        matches!(self, PlayerRole::Organizer)
    }
}

/// Participant record created when a player joins a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Display name chosen by the player.
    pub name: String,
    /// Team the player joined.
    pub team_id: Uuid,
    /// Session the player belongs to.
    pub session_id: String,
    /// Role held within the session.
    pub role: PlayerRole,
}

/// One answer option of a multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    /// Option text shown to participants.
    pub text: String,
    /// Whether this option is the correct one.
    #[serde(default)]
    pub is_correct: bool,
    /// Explanation revealed alongside the correct answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Typed payload of a multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContent {
    /// Question text.
    pub text: String,
    /// Optional illustration shown with the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Ordered answer options; exactly one is marked correct.
    pub options: Vec<AnswerOption>,
}

impl QuestionContent {
    /// Index of the option flagged as correct.
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|option| option.is_correct)
    }

    /// The option flagged as correct.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.correct_index().map(|index| &self.options[index])
    }
}

/// Session-scoped copy of a bank question, immutable after quiz start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for this session-scoped question.
    pub id: Uuid,
    /// Session the question was selected for.
    pub session_id: String,
    /// Question payload copied from the bank.
    pub content: QuestionContent,
    /// Position within the session's selected set.
    pub order: usize,
}

/// A player's submission for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Stable identifier for the answer.
    pub id: Uuid,
    /// Question the answer targets.
    pub question_id: Uuid,
    /// Player who submitted the answer.
    pub player_id: Uuid,
    /// Team credited for the answer.
    pub team_id: Uuid,
    /// Submitted option letter (A, B, C, ...).
    pub answer: char,
    /// Whether the submitted letter matched the correct option.
    pub is_correct: bool,
    /// Seconds elapsed between question start and submission.
    pub time_to_answer: u64,
    /// Points earned by this answer.
    pub points_earned: i64,
    /// Submission timestamp.
    pub created_at: SystemTime,
}
