use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::QuestionContent;

/// The correct option of a question as revealed to clients.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswerDto {
    pub letter: char,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Per-team outcome for a single question.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamQuestionResultDto {
    pub team_id: Uuid,
    pub team_name: String,
    pub team_color: String,
    /// Whether any of the team's players answered correctly.
    pub is_correct: bool,
    /// Sum of points earned by the team's answers to this question.
    pub points_earned: i64,
    /// Current rank on the session leaderboard.
    pub ranking: usize,
}

/// Vote share for one answer option.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStatDto {
    pub letter: char,
    pub text: String,
    /// Share of submissions that picked this option, rounded to the nearest percent.
    pub percentage: u32,
}

/// Detailed results pulled by clients after a question closes.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResultsDto {
    pub session_id: String,
    pub question_id: Uuid,
    /// Full question payload including correct flags and explanations.
    pub question: QuestionContent,
    pub question_index: usize,
    pub total_questions: usize,
    pub correct_answer: CorrectAnswerDto,
    pub team_results: Vec<TeamQuestionResultDto>,
    pub answer_stats: Vec<AnswerStatDto>,
    pub percent_correct: u32,
    pub is_last_question: bool,
    /// Echoed caller flag, used by clients to gate the advance control.
    pub is_organizer: bool,
}

/// Final standing of one team.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalTeamResultDto {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub score: i64,
    pub rank: usize,
    pub correct_answers: usize,
    pub total_answers: usize,
}

/// One of the hardest questions of the session, shown during the debrief.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DifficultQuestionDto {
    pub id: Uuid,
    pub index: usize,
    pub text: String,
    pub correct_answer: String,
    pub correct_answer_letter: char,
    pub correct_percent: u32,
    pub answer_stats: Vec<AnswerStatDto>,
}

/// Aggregated results pulled by clients once the quiz has ended.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalResultsDto {
    pub session_id: String,
    pub session_name: String,
    pub teams: Vec<FinalTeamResultDto>,
    pub correct_answers_percent: u32,
    /// Average seconds to answer, rounded to one decimal.
    pub average_response_time: f64,
    pub participant_count: usize,
    pub difficult_questions: Vec<DifficultQuestionDto>,
}
