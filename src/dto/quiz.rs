use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::QuestionEntity, state::quiz::TeamRanking, state::scoring};

/// One answer option of the currently open question, without the correct flag.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOptionDto {
    pub letter: char,
    pub text: String,
}

/// The currently open question as pushed to participants.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQuestionDto {
    pub id: Uuid,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub options: Vec<QuestionOptionDto>,
}

impl From<&QuestionEntity> for CurrentQuestionDto {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            id: question.id,
            text: question.content.text.clone(),
            image_url: question.content.image_url.clone(),
            options: question
                .content
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| QuestionOptionDto {
                    letter: scoring::option_letter(index),
                    text: option.text.clone(),
                })
                .collect(),
        }
    }
}

/// One entry of the live team leaderboard.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamRankingDto {
    pub id: Uuid,
    pub name: String,
    pub score: i64,
    pub rank: usize,
}

impl From<TeamRanking> for TeamRankingDto {
    fn from(ranking: TeamRanking) -> Self {
        Self {
            id: ranking.id,
            name: ranking.name,
            score: ranking.score,
            rank: ranking.rank,
        }
    }
}

/// Denormalized quiz state pushed on every countdown tick and question start.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizStateDto {
    pub session_id: String,
    pub session_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<CurrentQuestionDto>,
    /// Index of the current question, `-1` before the first one starts.
    pub current_question_index: i64,
    pub total_questions: usize,
    pub time_remaining: u64,
    pub team_count: usize,
    pub team_rankings: Vec<TeamRankingDto>,
}
