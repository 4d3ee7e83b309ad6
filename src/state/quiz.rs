//! Per-session quiz state tracked by the orchestrator.

use thiserror::Error;
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::dao::models::QuestionEntity;
use crate::dto::quiz::{CurrentQuestionDto, QuizStateDto};

/// Lifecycle phase of a session's quiz.
///
/// `Uninitialized` has no representation here: it is the absence of a
/// [`SessionState`] entry in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    /// Questions are selected but none has started yet.
    Lobby,
    /// A question is broadcast and accepting answers; a countdown is running.
    Open,
    /// The countdown elapsed; scores are applied and the reveal was sent.
    Closed,
    /// The question list is exhausted; only result queries remain.
    Ended,
}

/// Events that can be applied to the quiz phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizEvent {
    /// A new question is selected and opened for answers.
    OpenQuestion,
    /// The open question stops accepting answers and is scored.
    CloseQuestion,
    /// The question list ran out.
    Exhaust,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the quiz was in when the invalid event was received.
    pub from: QuizPhase,
    /// The event that cannot be applied from this phase.
    pub event: QuizEvent,
}

impl QuizPhase {
    /// Compute the phase reached by applying `event`, when the transition is valid.
    pub fn transition(self, event: QuizEvent) -> Result<QuizPhase, InvalidTransition> {
        let next = match (self, event) {
            (QuizPhase::Lobby, QuizEvent::OpenQuestion) => QuizPhase::Open,
            // The organizer may advance past a question that never closed.
            (QuizPhase::Open, QuizEvent::OpenQuestion) => QuizPhase::Open,
            (QuizPhase::Closed, QuizEvent::OpenQuestion) => QuizPhase::Open,
            (QuizPhase::Open, QuizEvent::CloseQuestion) => QuizPhase::Closed,
            (QuizPhase::Lobby, QuizEvent::Exhaust)
            | (QuizPhase::Open, QuizEvent::Exhaust)
            | (QuizPhase::Closed, QuizEvent::Exhaust) => QuizPhase::Ended,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

/// One entry of the live team leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRanking {
    /// Stable identifier of the team.
    pub id: Uuid,
    /// Display name of the team.
    pub name: String,
    /// Accumulated score.
    pub score: i64,
    /// Position on the leaderboard, starting at 1.
    pub rank: usize,
}

/// Orchestrator-private state of one session's quiz.
pub struct SessionState {
    /// Session this state belongs to.
    pub session_id: String,
    /// Display name of the session, denormalized for broadcasts.
    pub session_name: String,
    /// Questions selected for this session, in play order.
    pub questions: Vec<QuestionEntity>,
    /// Current lifecycle phase.
    pub phase: QuizPhase,
    /// Index of the current question; `None` until the first one starts.
    pub current_index: Option<usize>,
    /// Identifier of the question currently open or last closed.
    pub current_question_id: Option<Uuid>,
    /// Wall-clock deadline of the open question.
    pub deadline: Option<Instant>,
    /// Seconds remaining as of the last countdown tick.
    pub time_remaining: u64,
    /// Handle of the running countdown task, if a question is open.
    pub countdown: Option<JoinHandle<()>>,
    /// Number of teams in the session, denormalized for broadcasts.
    pub team_count: usize,
    /// Current leaderboard, recomputed when a question closes.
    pub team_rankings: Vec<TeamRanking>,
    /// Whether the quiz is still running.
    pub active: bool,
}

impl SessionState {
    /// Build the state stored at quiz initialization.
    pub fn new(
        session_id: String,
        session_name: String,
        questions: Vec<QuestionEntity>,
        team_rankings: Vec<TeamRanking>,
    ) -> Self {
        let team_count = team_rankings.len();
        Self {
            session_id,
            session_name,
            questions,
            phase: QuizPhase::Lobby,
            current_index: None,
            current_question_id: None,
            deadline: None,
            time_remaining: 0,
            countdown: None,
            team_count,
            team_rankings,
            active: true,
        }
    }

    /// The question currently open or last closed.
    pub fn current_question(&self) -> Option<&QuestionEntity> {
        let id = self.current_question_id?;
        self.questions.iter().find(|question| question.id == id)
    }

    /// Seconds left before the deadline, floored, zero once elapsed.
    pub fn remaining_secs(&self) -> u64 {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    /// Whether the current question is the last of the session.
    pub fn is_last_question(&self) -> bool {
        match self.current_index {
            Some(index) => index + 1 >= self.questions.len(),
            None => self.questions.is_empty(),
        }
    }

    /// Abort the running countdown task, if any.
    pub fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    /// Denormalized broadcast snapshot of the quiz state.
    pub fn snapshot(&self) -> QuizStateDto {
        let current_question = match self.phase {
            QuizPhase::Open | QuizPhase::Closed => {
                self.current_question().map(CurrentQuestionDto::from)
            }
            _ => None,
        };

        QuizStateDto {
            session_id: self.session_id.clone(),
            session_name: self.session_name.clone(),
            current_question,
            current_question_index: self.current_index.map_or(-1, |index| index as i64),
            total_questions: self.questions.len(),
            time_remaining: self.time_remaining,
            team_count: self.team_count,
            team_rankings: self
                .team_rankings
                .iter()
                .cloned()
                .map(Into::into)
                .collect(),
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.cancel_countdown();
    }
}
