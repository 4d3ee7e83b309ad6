//! Session/quiz orchestration: per-session game state, the question
//! lifecycle (select, broadcast, countdown, close, score, report), and the
//! scoring/statistics queries built on top of it.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use rand::{rng, seq::SliceRandom};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    bank::QuestionBank,
    config::AppConfig,
    dao::{
        models::{AnswerEntity, QuestionEntity},
        quiz_store::QuizStore,
    },
    dto::{
        quiz::QuizStateDto,
        results::{
            CorrectAnswerDto, DifficultQuestionDto, FinalResultsDto, FinalTeamResultDto,
            QuestionResultsDto, TeamQuestionResultDto,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        hub::SessionHub,
        quiz::{QuizEvent, QuizPhase, SessionState, TeamRanking},
        scoring,
    },
};

/// Owns every session's in-memory quiz state and coordinates the question
/// lifecycle across the connected clients of each session.
///
/// All mutations of one session's state run under that session's lock, so a
/// read-then-write sequence spanning a repository call cannot interleave with
/// another mutation of the same session. Sessions are fully isolated: every
/// entry is keyed by session id and a failure never touches another entry.
pub struct QuizOrchestrator {
    sessions: DashMap<String, Arc<Mutex<SessionState>>>,
    store: Arc<dyn QuizStore>,
    hub: Arc<SessionHub>,
    config: Arc<AppConfig>,
}

impl QuizOrchestrator {
    /// Build an orchestrator over the given repository, hub, and configuration.
    pub fn new(store: Arc<dyn QuizStore>, hub: Arc<SessionHub>, config: Arc<AppConfig>) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            hub,
            config,
        }
    }

    fn session(&self, session_id: &str) -> Result<Arc<Mutex<SessionState>>, ServiceError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("quiz for session `{session_id}` not initialized"))
            })
    }

    /// Select this session's questions and build its initial state.
    ///
    /// Samples the bank in randomized order, truncated to the configured
    /// count (silently fewer when the bank is smaller), and persists each
    /// sampled question with its order index. Nothing is broadcast yet.
    pub async fn initialize_quiz(
        &self,
        session_id: &str,
        bank: &QuestionBank,
    ) -> Result<(), ServiceError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
        let teams = self.store.teams_by_session(session_id).await?;

        let mut sampled = bank.questions().to_vec();
        {
            let mut rng = rng();
            sampled.shuffle(&mut rng);
        }
        sampled.truncate(self.config.questions_per_session());

        let mut questions = Vec::with_capacity(sampled.len());
        for (order, content) in sampled.into_iter().enumerate() {
            let question = QuestionEntity {
                id: Uuid::new_v4(),
                session_id: session_id.to_string(),
                content,
                order,
            };
            self.store.save_question(question.clone()).await?;
            questions.push(question);
        }

        // Initial ranks follow team creation order; scores are not compared yet.
        let rankings = teams
            .iter()
            .enumerate()
            .map(|(index, team)| TeamRanking {
                id: team.id,
                name: team.name.clone(),
                score: team.score,
                rank: index + 1,
            })
            .collect();

        let state = SessionState::new(session.id, session.name, questions, rankings);
        self.sessions
            .insert(session_id.to_string(), Arc::new(Mutex::new(state)));

        info!(session_id, "quiz initialized");
        Ok(())
    }

    /// Advance to the next question, or end the quiz when the list is
    /// exhausted.
    ///
    /// Returns `false` without broadcasting when no questions remain; the
    /// caller announces the quiz end. Otherwise opens the question, pushes a
    /// state update, and arms the countdown.
    pub async fn start_next_question(
        self: &Arc<Self>,
        session_id: &str,
    ) -> Result<bool, ServiceError> {
        let entry = self.session(session_id)?;
        let mut state = entry.lock().await;

        state.cancel_countdown();

        let next = state.current_index.map_or(0, |index| index + 1);
        state.current_index = Some(next);

        if next >= state.questions.len() {
            if state.phase != QuizPhase::Ended {
                state.phase = state.phase.transition(QuizEvent::Exhaust)?;
                self.schedule_eviction(session_id.to_string());
            }
            state.active = false;
            state.current_question_id = None;
            state.deadline = None;
            state.time_remaining = 0;
            info!(session_id, "question list exhausted");
            return Ok(false);
        }

        let question = &state.questions[next];
        let question_id = question.id;
        state.phase = state.phase.transition(QuizEvent::OpenQuestion)?;
        state.current_question_id = Some(question_id);

        let duration = self.config.question_duration();
        state.time_remaining = duration.as_secs();
        state.deadline = Some(Instant::now() + duration);

        self.hub.broadcast(
            session_id,
            ServerMessage::QuizStateUpdate(state.snapshot()),
        );
        state.countdown = Some(self.spawn_countdown(session_id.to_string(), question_id));

        info!(session_id, index = next, %question_id, "question opened");
        Ok(true)
    }

    /// Tick once per second against the absolute deadline, broadcasting the
    /// remaining time, and trigger the close when it reaches zero.
    ///
    /// This task is the single close trigger for the question it was armed
    /// for. The scoring pass runs in a separate task, so aborting the ticker
    /// never interrupts a close in progress.
    fn spawn_countdown(self: &Arc<Self>, session_id: String, question_id: Uuid) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(1)).await;

                let Some(entry) = orchestrator
                    .sessions
                    .get(&session_id)
                    .map(|entry| entry.value().clone())
                else {
                    return;
                };

                let mut state = entry.lock().await;
                if state.phase != QuizPhase::Open
                    || state.current_question_id != Some(question_id)
                {
                    // The question was closed or replaced; this ticker is stale.
                    return;
                }

                let remaining = state.remaining_secs();
                state.time_remaining = remaining;
                orchestrator.hub.broadcast(
                    &session_id,
                    ServerMessage::QuizStateUpdate(state.snapshot()),
                );

                if remaining == 0 {
                    break;
                }
            }

            let closer = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                if let Err(err) = closer.close_question(&session_id, question_id).await {
                    warn!(%session_id, %question_id, error = %err, "failed to close question");
                }
            });
        })
    }

    /// Stop accepting answers for the named question, apply team scores, and
    /// broadcast the reveal signal.
    ///
    /// A no-op when the question is no longer the open one, which makes the
    /// close safe under racing triggers: the first caller past the phase gate
    /// performs the transition, any other sees a stale id and returns.
    pub async fn close_question(
        &self,
        session_id: &str,
        question_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(entry) = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
        else {
            return Ok(());
        };

        let mut state = entry.lock().await;
        if state.phase != QuizPhase::Open || state.current_question_id != Some(question_id) {
            return Ok(());
        }

        state.phase = state.phase.transition(QuizEvent::CloseQuestion)?;
        state.time_remaining = 0;
        state.cancel_countdown();

        let answers = self.store.answers_by_question(question_id).await?;
        let teams = self.store.teams_by_session(session_id).await?;

        // A team is credited the best of its players' answers to this question.
        for team in &teams {
            let best = answers
                .iter()
                .filter(|answer| answer.team_id == team.id)
                .map(|answer| answer.points_earned)
                .max();
            if let Some(points) = best {
                let mut updated = team.clone();
                updated.score += points;
                self.store.save_team(updated).await?;
            }
        }

        let updated_teams = self.store.teams_by_session(session_id).await?;
        state.team_rankings = scoring::rank_teams(&updated_teams);

        self.hub.broadcast(
            session_id,
            ServerMessage::ShowAnswer {
                session_id: session_id.to_string(),
                question_id,
            },
        );

        info!(session_id, %question_id, "question closed and scored");
        Ok(())
    }

    /// Record a player's answer to the currently open question.
    ///
    /// Refused when the question is not the open one, which covers late and
    /// stale submissions. A resubmission by the same player overwrites the
    /// previous answer.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: Uuid,
        player_id: Uuid,
        team_id: Uuid,
        letter: char,
    ) -> Result<(), ServiceError> {
        let entry = self.session(session_id)?;
        let state = entry.lock().await;

        if state.phase != QuizPhase::Open || state.current_question_id != Some(question_id) {
            return Err(ServiceError::InvalidState("question not active".into()));
        }

        let question = state.current_question().ok_or_else(|| {
            ServiceError::NotFound(format!("question `{question_id}` not found"))
        })?;

        let elapsed = self
            .config
            .question_duration_secs()
            .saturating_sub(state.time_remaining);
        let correct_letter = question.content.correct_index().map(scoring::option_letter);
        let is_correct = correct_letter == Some(letter);
        let points = scoring::points_earned(
            is_correct,
            elapsed,
            self.config.score_base(),
            self.config.score_decay_per_second(),
        );

        // The session lock is still held: the close transition cannot run
        // between the open check above and this write.
        self.store
            .upsert_answer(AnswerEntity {
                id: Uuid::new_v4(),
                question_id,
                player_id,
                team_id,
                answer: letter,
                is_correct,
                time_to_answer: elapsed,
                points_earned: points,
                created_at: SystemTime::now(),
            })
            .await?;

        Ok(())
    }

    /// Assemble the detailed results of one question for the requesting client.
    pub async fn question_results(
        &self,
        session_id: &str,
        question_id: Uuid,
        is_organizer: bool,
    ) -> Result<QuestionResultsDto, ServiceError> {
        let entry = self.session(session_id)?;
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
        let question = self
            .store
            .find_question(question_id)
            .await?
            .filter(|question| question.session_id == session_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("question `{question_id}` not found"))
            })?;
        let answers = self.store.answers_by_question(question_id).await?;
        let teams = self.store.teams_by_session(session_id).await?;

        let (rankings, total_questions, is_last_question) = {
            let state = entry.lock().await;
            (
                state.team_rankings.clone(),
                state.questions.len(),
                state.is_last_question(),
            )
        };

        let correct_index = question.content.correct_index().ok_or_else(|| {
            ServiceError::InvalidState(format!("question `{question_id}` has no correct option"))
        })?;
        let correct_option = &question.content.options[correct_index];
        let correct_answer = CorrectAnswerDto {
            letter: scoring::option_letter(correct_index),
            text: correct_option.text.clone(),
            explanation: correct_option.explanation.clone(),
        };

        let mut team_results: Vec<TeamQuestionResultDto> = teams
            .iter()
            .enumerate()
            .map(|(index, team)| {
                let team_answers: Vec<&AnswerEntity> = answers
                    .iter()
                    .filter(|answer| answer.team_id == team.id)
                    .collect();
                TeamQuestionResultDto {
                    team_id: team.id,
                    team_name: team.name.clone(),
                    team_color: team.color.clone(),
                    is_correct: team_answers.iter().any(|answer| answer.is_correct),
                    points_earned: team_answers.iter().map(|answer| answer.points_earned).sum(),
                    ranking: rankings
                        .iter()
                        .find(|ranking| ranking.id == team.id)
                        .map(|ranking| ranking.rank)
                        .unwrap_or(index + 1),
                }
            })
            .collect();
        team_results.sort_by_key(|result| result.ranking);

        let answer_stats = scoring::answer_stats(&question.content, &answers);
        let percent_correct = scoring::percent_correct(&answers);

        Ok(QuestionResultsDto {
            session_id: session.id,
            question_id,
            question_index: question.order,
            total_questions,
            question: question.content,
            correct_answer,
            team_results,
            answer_stats,
            percent_correct,
            is_last_question,
            is_organizer,
        })
    }

    /// Aggregate the whole session's answers into the final standings and
    /// debrief statistics.
    pub async fn final_results(&self, session_id: &str) -> Result<FinalResultsDto, ServiceError> {
        // Results are only defined once a quiz was initialized for the session.
        let _entry = self.session(session_id)?;
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
        let teams = self.store.teams_by_session(session_id).await?;
        let questions = self.store.questions_by_session(session_id).await?;

        let mut all_answers = Vec::new();
        let mut per_question = Vec::with_capacity(questions.len());
        for question in questions {
            let answers = self.store.answers_by_question(question.id).await?;
            all_answers.extend(answers.iter().cloned());
            per_question.push((question, answers));
        }

        let mut team_results: Vec<FinalTeamResultDto> = teams
            .iter()
            .map(|team| {
                let team_answers: Vec<&AnswerEntity> = all_answers
                    .iter()
                    .filter(|answer| answer.team_id == team.id)
                    .collect();
                FinalTeamResultDto {
                    id: team.id,
                    name: team.name.clone(),
                    color: team.color.clone(),
                    score: team.score,
                    rank: 0,
                    correct_answers: team_answers
                        .iter()
                        .filter(|answer| answer.is_correct)
                        .count(),
                    total_answers: team_answers.len(),
                }
            })
            .collect();
        team_results.sort_by(|a, b| b.score.cmp(&a.score));
        for (index, team) in team_results.iter_mut().enumerate() {
            team.rank = index + 1;
        }

        let participant_count = self.store.players_by_session(session_id).await?.len();

        // Surface the hardest questions for the debrief: lowest share of
        // correct answers first, ties keeping the original question order.
        let mut question_results: Vec<DifficultQuestionDto> = per_question
            .iter()
            .filter_map(|(question, answers)| {
                if answers.is_empty() {
                    return None;
                }
                let correct_index = question.content.correct_index()?;
                Some(DifficultQuestionDto {
                    id: question.id,
                    index: question.order,
                    text: question.content.text.clone(),
                    correct_answer: question.content.options[correct_index].text.clone(),
                    correct_answer_letter: scoring::option_letter(correct_index),
                    correct_percent: scoring::percent_correct(answers),
                    answer_stats: scoring::answer_stats(&question.content, answers),
                })
            })
            .collect();
        question_results.sort_by_key(|result| result.correct_percent);
        question_results.truncate(2);

        Ok(FinalResultsDto {
            session_id: session.id,
            session_name: session.name,
            teams: team_results,
            correct_answers_percent: scoring::percent_correct(&all_answers),
            average_response_time: scoring::average_response_time(&all_answers),
            participant_count,
            difficult_questions: question_results,
        })
    }

    /// Broadcast snapshot of the session's quiz, when one is initialized.
    pub async fn quiz_state(&self, session_id: &str) -> Option<QuizStateDto> {
        let entry = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())?;
        let state = entry.lock().await;
        Some(state.snapshot())
    }

    /// Whether a quiz is currently running for the session.
    pub async fn is_quiz_active(&self, session_id: &str) -> bool {
        match self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
        {
            Some(entry) => entry.lock().await.active,
            None => false,
        }
    }

    /// Drop the session's state and hub channel after the configured TTL,
    /// unless the quiz was re-initialized in the meantime.
    fn schedule_eviction(self: &Arc<Self>, session_id: String) {
        let orchestrator = Arc::clone(self);
        let ttl = self.config.ended_session_ttl();
        tokio::spawn(async move {
            sleep(ttl).await;

            let still_ended = match orchestrator
                .sessions
                .get(&session_id)
                .map(|entry| entry.value().clone())
            {
                Some(entry) => entry.lock().await.phase == QuizPhase::Ended,
                None => false,
            };

            if still_ended {
                orchestrator.teardown(&session_id);
                info!(%session_id, "evicted ended session state");
            }
        });
    }

    /// Remove the session's state immediately, cancelling its countdown.
    pub fn teardown(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.hub.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use tokio::sync::broadcast;

    use super::*;
    use crate::dao::{
        memory::MemoryStore,
        models::{
            AnswerOption, PlayerEntity, PlayerRole, QuestionContent, SessionEntity, TeamEntity,
        },
    };

    const SESSION_ID: &str = "AB12CD";

    struct Fixture {
        orchestrator: Arc<QuizOrchestrator>,
        store: MemoryStore,
        hub: Arc<SessionHub>,
        bank: QuestionBank,
        teams: Vec<TeamEntity>,
        players: Vec<PlayerEntity>,
    }

    fn bank_question(index: usize) -> QuestionContent {
        QuestionContent {
            text: format!("Question {index} ?"),
            image_url: None,
            options: vec![
                AnswerOption {
                    text: "Mauvaise".to_string(),
                    is_correct: false,
                    explanation: None,
                },
                AnswerOption {
                    text: "Bonne".to_string(),
                    is_correct: true,
                    explanation: Some("Parce que.".to_string()),
                },
                AnswerOption {
                    text: "Autre".to_string(),
                    is_correct: false,
                    explanation: None,
                },
            ],
        }
    }

    async fn fixture(bank_size: usize) -> Fixture {
        let store = MemoryStore::new();
        let hub = Arc::new(SessionHub::new(64));
        let config = Arc::new(AppConfig::default());
        let orchestrator = Arc::new(QuizOrchestrator::new(
            Arc::new(store.clone()),
            hub.clone(),
            config,
        ));

        store
            .save_session(SessionEntity {
                id: SESSION_ID.to_string(),
                name: "Quiz environnement".to_string(),
                organizer: "Claire".to_string(),
                team_count: 2,
                active: true,
                created_at: SystemTime::now(),
            })
            .await
            .unwrap();

        let mut teams = Vec::new();
        let mut players = Vec::new();
        for (index, name) in ["Forêt", "Océan"].iter().enumerate() {
            let team = TeamEntity {
                id: Uuid::new_v4(),
                name: name.to_string(),
                session_id: SESSION_ID.to_string(),
                score: 0,
                color: format!("team-color-{}", index + 1),
            };
            store.save_team(team.clone()).await.unwrap();

            let player = PlayerEntity {
                id: Uuid::new_v4(),
                name: format!("Joueur {}", index + 1),
                team_id: team.id,
                session_id: SESSION_ID.to_string(),
                role: PlayerRole::Participant,
            };
            store.save_player(player.clone()).await.unwrap();

            teams.push(team);
            players.push(player);
        }

        let bank =
            QuestionBank::from_records((0..bank_size).map(bank_question).collect()).unwrap();

        Fixture {
            orchestrator,
            store,
            hub,
            bank,
            teams,
            players,
        }
    }

    async fn open_question_id(fixture: &Fixture) -> Uuid {
        let entry = fixture.orchestrator.session(SESSION_ID).unwrap();
        let state = entry.lock().await;
        state.current_question_id.unwrap()
    }

    async fn set_time_remaining(fixture: &Fixture, remaining: u64) {
        let entry = fixture.orchestrator.session(SESSION_ID).unwrap();
        let mut state = entry.lock().await;
        state.time_remaining = remaining;
    }

    fn drain(receiver: &mut broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn initialize_quiz_fails_for_unknown_session() {
        let fixture = fixture(3).await;
        let err = fixture
            .orchestrator
            .initialize_quiz("ZZ99ZZ", &fixture.bank)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn initialize_quiz_persists_questions_and_initial_rankings() {
        let fixture = fixture(5).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();

        let stored = fixture
            .store
            .questions_by_session(SESSION_ID)
            .await
            .unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored[0].order, 0);
        assert_eq!(stored[4].order, 4);

        let state = fixture.orchestrator.quiz_state(SESSION_ID).await.unwrap();
        assert_eq!(state.current_question_index, -1);
        assert_eq!(state.total_questions, 5);
        assert!(state.current_question.is_none());
        assert_eq!(state.team_rankings.len(), 2);
        assert_eq!(state.team_rankings[0].name, "Forêt");
        assert_eq!(state.team_rankings[0].rank, 1);
        assert_eq!(state.team_rankings[1].name, "Océan");
        assert_eq!(state.team_rankings[1].rank, 2);
        assert!(fixture.orchestrator.is_quiz_active(SESSION_ID).await);
    }

    #[tokio::test]
    async fn bank_sampling_is_capped_at_the_configured_count() {
        let fixture = fixture(25).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();

        let stored = fixture
            .store
            .questions_by_session(SESSION_ID)
            .await
            .unwrap();
        assert_eq!(stored.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn start_next_question_opens_and_broadcasts() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        let mut receiver = fixture.hub.subscribe(SESSION_ID);

        let has_next = fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        assert!(has_next);

        let message = receiver.recv().await.unwrap();
        match message {
            ServerMessage::QuizStateUpdate(state) => {
                assert_eq!(state.current_question_index, 0);
                assert_eq!(state.time_remaining, 20);
                assert_eq!(state.total_questions, 3);
                let question = state.current_question.unwrap();
                assert_eq!(question.options.len(), 3);
                assert_eq!(question.options[0].letter, 'A');
                assert_eq!(question.options[2].letter, 'C');
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_question_list_ends_quiz_without_broadcast() {
        let fixture = fixture(1).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        let mut receiver = fixture.hub.subscribe(SESSION_ID);

        assert!(fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap());
        drain(&mut receiver);

        let has_next = fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        assert!(!has_next);
        assert!(drain(&mut receiver).is_empty());

        let state = fixture.orchestrator.quiz_state(SESSION_ID).await.unwrap();
        assert_eq!(state.current_question_index, 1);
        assert_eq!(state.total_questions, 1);
        assert!(!fixture.orchestrator.is_quiz_active(SESSION_ID).await);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_advances_open_a_single_question() {
        let fixture = fixture(5).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            fixture.orchestrator.start_next_question(SESSION_ID),
            fixture.orchestrator.start_next_question(SESSION_ID),
        );
        assert!(first.unwrap());
        assert!(second.unwrap());

        let entry = fixture.orchestrator.session(SESSION_ID).unwrap();
        let state = entry.lock().await;
        assert_eq!(state.phase, QuizPhase::Open);
        assert_eq!(state.current_index, Some(1));
        assert_eq!(state.current_question_id, Some(state.questions[1].id));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_with_stale_question_id_is_refused() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();

        let stale = Uuid::new_v4();
        let err = fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                stale,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(fixture
            .store
            .answers_by_question(stale)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_after_close_is_refused() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        fixture
            .orchestrator
            .close_question(SESSION_ID, question_id)
            .await
            .unwrap();

        let err = fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(fixture
            .store
            .answers_by_question(question_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_awards_speed_and_floors_at_zero() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        // Instant correct answer earns the full base.
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();
        // Incorrect answer earns nothing regardless of speed.
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[1].id,
                fixture.teams[1].id,
                'A',
            )
            .await
            .unwrap();

        let answers = fixture
            .store
            .answers_by_question(question_id)
            .await
            .unwrap();
        let first = answers
            .iter()
            .find(|answer| answer.player_id == fixture.players[0].id)
            .unwrap();
        assert!(first.is_correct);
        assert_eq!(first.time_to_answer, 0);
        assert_eq!(first.points_earned, 1000);

        let second = answers
            .iter()
            .find(|answer| answer.player_id == fixture.players[1].id)
            .unwrap();
        assert!(!second.is_correct);
        assert_eq!(second.points_earned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resubmission_overwrites_the_previous_answer() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'A',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();

        let answers = fixture
            .store
            .answers_by_question(question_id)
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer, 'B');
        assert!(answers[0].is_correct);
    }

    #[tokio::test(start_paused = true)]
    async fn close_credits_each_team_with_its_best_answer() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        // Second player of the same team answers slower for fewer points.
        let teammate = PlayerEntity {
            id: Uuid::new_v4(),
            name: "Joueur 3".to_string(),
            team_id: fixture.teams[0].id,
            session_id: SESSION_ID.to_string(),
            role: PlayerRole::Participant,
        };
        fixture.store.save_player(teammate.clone()).await.unwrap();

        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();
        set_time_remaining(&fixture, 10).await;
        fixture
            .orchestrator
            .submit_answer(SESSION_ID, question_id, teammate.id, fixture.teams[0].id, 'B')
            .await
            .unwrap();

        fixture
            .orchestrator
            .close_question(SESSION_ID, question_id)
            .await
            .unwrap();

        let scored = fixture
            .store
            .find_team(fixture.teams[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.score, 1000);

        let silent = fixture
            .store
            .find_team(fixture.teams[1].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(silent.score, 0);

        let state = fixture.orchestrator.quiz_state(SESSION_ID).await.unwrap();
        assert_eq!(state.team_rankings[0].name, "Forêt");
        assert_eq!(state.team_rankings[0].score, 1000);
        assert_eq!(state.team_rankings[0].rank, 1);
        assert_eq!(state.team_rankings[1].rank, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent_under_racing_triggers() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();

        let mut receiver = fixture.hub.subscribe(SESSION_ID);
        let (first, second) = tokio::join!(
            fixture.orchestrator.close_question(SESSION_ID, question_id),
            fixture.orchestrator.close_question(SESSION_ID, question_id),
        );
        first.unwrap();
        second.unwrap();

        let team = fixture
            .store
            .find_team(fixture.teams[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team.score, 1000);

        let reveals = drain(&mut receiver)
            .into_iter()
            .filter(|message| matches!(message, ServerMessage::ShowAnswer { .. }))
            .count();
        assert_eq!(reveals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_then_closes_the_question() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        let mut receiver = fixture.hub.subscribe(SESSION_ID);

        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();

        // Let the 20 virtual seconds elapse and the close task settle.
        sleep(Duration::from_secs(25)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let messages = drain(&mut receiver);
        let reveals = messages
            .iter()
            .filter(|message| matches!(message, ServerMessage::ShowAnswer { .. }))
            .count();
        assert_eq!(reveals, 1);

        let last_tick = messages
            .iter()
            .filter_map(|message| match message {
                ServerMessage::QuizStateUpdate(state) => Some(state.time_remaining),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_tick, 0);

        let entry = fixture.orchestrator.session(SESSION_ID).unwrap();
        let state = entry.lock().await;
        assert_eq!(state.phase, QuizPhase::Closed);
        drop(state);

        let team = fixture
            .store
            .find_team(fixture.teams[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team.score, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn question_results_report_stats_and_rankings() {
        let fixture = fixture(2).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let question_id = open_question_id(&fixture).await;

        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                question_id,
                fixture.players[1].id,
                fixture.teams[1].id,
                'A',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .close_question(SESSION_ID, question_id)
            .await
            .unwrap();

        let results = fixture
            .orchestrator
            .question_results(SESSION_ID, question_id, true)
            .await
            .unwrap();

        assert_eq!(results.correct_answer.letter, 'B');
        assert_eq!(results.correct_answer.text, "Bonne");
        assert_eq!(results.percent_correct, 50);
        assert!(!results.is_last_question);
        assert!(results.is_organizer);

        let total: u32 = results
            .answer_stats
            .iter()
            .map(|stat| stat.percentage)
            .sum();
        assert!((99..=101).contains(&total));

        assert_eq!(results.team_results[0].team_name, "Forêt");
        assert!(results.team_results[0].is_correct);
        assert_eq!(results.team_results[0].points_earned, 1000);
        assert_eq!(results.team_results[0].ranking, 1);
        assert!(!results.team_results[1].is_correct);
        assert_eq!(results.team_results[1].points_earned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn final_results_reconcile_scores_with_answers() {
        let fixture = fixture(2).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();

        // First question: one correct instant answer, one incorrect.
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let first_question = open_question_id(&fixture).await;
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                first_question,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                first_question,
                fixture.players[1].id,
                fixture.teams[1].id,
                'C',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .close_question(SESSION_ID, first_question)
            .await
            .unwrap();

        // Second question: one slower correct answer.
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();
        let second_question = open_question_id(&fixture).await;
        set_time_remaining(&fixture, 10).await;
        fixture
            .orchestrator
            .submit_answer(
                SESSION_ID,
                second_question,
                fixture.players[0].id,
                fixture.teams[0].id,
                'B',
            )
            .await
            .unwrap();
        fixture
            .orchestrator
            .close_question(SESSION_ID, second_question)
            .await
            .unwrap();

        assert!(!fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap());

        let results = fixture.orchestrator.final_results(SESSION_ID).await.unwrap();

        assert_eq!(results.teams[0].name, "Forêt");
        assert_eq!(results.teams[0].score, 1500);
        assert_eq!(results.teams[0].rank, 1);
        assert_eq!(results.teams[0].correct_answers, 2);
        assert_eq!(results.teams[0].total_answers, 2);
        assert_eq!(results.teams[1].score, 0);
        assert_eq!(results.teams[1].rank, 2);

        // Team score sum equals the sum of points across all answers.
        let team_total: i64 = results.teams.iter().map(|team| team.score).sum();
        let mut answer_total = 0;
        for question in [first_question, second_question] {
            answer_total += fixture
                .store
                .answers_by_question(question)
                .await
                .unwrap()
                .iter()
                .map(|answer| answer.points_earned)
                .sum::<i64>();
        }
        assert_eq!(team_total, answer_total);

        assert_eq!(results.correct_answers_percent, 67);
        assert_eq!(results.average_response_time, 3.3);
        assert_eq!(results.participant_count, 2);

        // The 50%-correct question ranks as harder than the 100% one.
        assert_eq!(results.difficult_questions.len(), 2);
        assert_eq!(results.difficult_questions[0].correct_percent, 50);
        assert_eq!(results.difficult_questions[1].correct_percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_sessions_are_evicted_after_the_ttl() {
        let fixture = fixture(1).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        assert!(fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap());
        assert!(!fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap());
        assert!(fixture.orchestrator.quiz_state(SESSION_ID).await.is_some());

        sleep(Duration::from_secs(3601)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert!(fixture.orchestrator.quiz_state(SESSION_ID).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_never_touch_other_sessions() {
        let fixture = fixture(3).await;
        fixture
            .orchestrator
            .initialize_quiz(SESSION_ID, &fixture.bank)
            .await
            .unwrap();
        fixture
            .orchestrator
            .start_next_question(SESSION_ID)
            .await
            .unwrap();

        let err = fixture
            .orchestrator
            .start_next_question("ZZ99ZZ")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let state = fixture.orchestrator.quiz_state(SESSION_ID).await.unwrap();
        assert_eq!(state.current_question_index, 0);
    }
}
