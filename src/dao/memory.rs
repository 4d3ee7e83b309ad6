//! In-memory storage backend keeping all entities in process-local maps.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{AnswerEntity, PlayerEntity, QuestionEntity, SessionEntity, TeamEntity},
    quiz_store::QuizStore,
    storage::StorageResult,
};

/// Entity wrapper carrying the global insertion sequence used to keep
/// list-by-* results in creation order.
#[derive(Debug, Clone)]
struct Sequenced<T> {
    seq: u64,
    entity: T,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<String, SessionEntity>,
    teams: DashMap<Uuid, Sequenced<TeamEntity>>,
    players: DashMap<Uuid, Sequenced<PlayerEntity>>,
    questions: DashMap<Uuid, QuestionEntity>,
    /// Answers keyed by (question, player) so resubmission overwrites.
    answers: DashMap<(Uuid, Uuid), Sequenced<AnswerEntity>>,
    sequence: AtomicU64,
}

impl MemoryInner {
    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

/// [`QuizStore`] implementation backed by in-process maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_seq<T>(mut entries: Vec<Sequenced<T>>) -> Vec<T> {
    entries.sort_by_key(|entry| entry.seq);
    entries.into_iter().map(|entry| entry.entity).collect()
}

impl QuizStore for MemoryStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.sessions.insert(session.id.clone(), session);
            Ok(())
        })
    }

    fn find_session(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(inner.sessions.get(&id).map(|entry| entry.clone())) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            // Preserve the original insertion slot on score updates.
            let seq = inner
                .teams
                .get(&team.id)
                .map(|entry| entry.seq)
                .unwrap_or_else(|| inner.next_seq());
            inner.teams.insert(team.id, Sequenced { seq, entity: team });
            Ok(())
        })
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.teams.get(&id).map(|entry| entry.entity.clone())) })
    }

    fn teams_by_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let inner = self.inner.clone();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let entries = inner
                .teams
                .iter()
                .filter(|entry| entry.entity.session_id == session_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let seq = inner
                .players
                .get(&player.id)
                .map(|entry| entry.seq)
                .unwrap_or_else(|| inner.next_seq());
            inner
                .players
                .insert(player.id, Sequenced { seq, entity: player });
            Ok(())
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.players.get(&id).map(|entry| entry.entity.clone())) })
    }

    fn players_by_team(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let entries = inner
                .players
                .iter()
                .filter(|entry| entry.entity.team_id == team_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn players_by_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let inner = self.inner.clone();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let entries = inner
                .players
                .iter()
                .filter(|entry| entry.entity.session_id == session_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.questions.insert(question.id, question);
            Ok(())
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.questions.get(&id).map(|entry| entry.clone())) })
    }

    fn questions_by_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let mut questions: Vec<QuestionEntity> = inner
                .questions
                .iter()
                .filter(|entry| entry.session_id == session_id)
                .map(|entry| entry.clone())
                .collect();
            questions.sort_by_key(|question| question.order);
            Ok(questions)
        })
    }

    fn upsert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let key = (answer.question_id, answer.player_id);
            let seq = inner
                .answers
                .get(&key)
                .map(|entry| entry.seq)
                .unwrap_or_else(|| inner.next_seq());
            inner.answers.insert(key, Sequenced { seq, entity: answer });
            Ok(())
        })
    }

    fn answers_by_question(
        &self,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let entries = inner
                .answers
                .iter()
                .filter(|entry| entry.entity.question_id == question_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn answers_by_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let entries = inner
                .answers
                .iter()
                .filter(|entry| entry.entity.player_id == player_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn answers_by_team(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let entries = inner
                .answers
                .iter()
                .filter(|entry| entry.entity.team_id == team_id)
                .map(|entry| entry.value().clone())
                .collect();
            Ok(sorted_by_seq(entries))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
