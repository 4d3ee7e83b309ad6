use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AnswerEntity, PlayerEntity, QuestionEntity, SessionEntity, TeamEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for sessions, teams, players,
/// questions, and answers.
pub trait QuizStore: Send + Sync {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    /// Teams of a session in creation order.
    fn teams_by_session(&self, session_id: &str)
    -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Players of a team in join order.
    fn players_by_team(&self, team_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Players of a session in join order.
    fn players_by_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_question(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Questions of a session sorted by their order index.
    fn questions_by_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    /// Store an answer, replacing any previous answer from the same player to
    /// the same question.
    fn upsert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn answers_by_question(
        &self,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    fn answers_by_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    fn answers_by_team(&self, team_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
