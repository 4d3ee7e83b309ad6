use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, PlayerRole},
    dto::{
        session::SessionStatePayload,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::session_service,
    state::{ConnectionRole, SharedState},
};

/// Writer channel closed; the connection is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle for an individual quiz WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    state.registry().insert(connection_id, outbound_tx.clone());
    info!(%connection_id, "client connected");

    // Forwarder between the session hub and this connection's writer.
    let mut subscription: Option<JoinHandle<()>> = None;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(inbound) => {
                    dispatch(&state, connection_id, &outbound_tx, &mut subscription, inbound)
                        .await;
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "failed to parse client message");
                    let _ = send_message(
                        &outbound_tx,
                        &ServerMessage::Error {
                            message: format!("failed to process message: {err}"),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(handle) = subscription.take() {
        handle.abort();
    }

    // Dropping a connection never alters game state; peers are only notified.
    if let Some(connection) = state.registry().remove(connection_id) {
        if let (Some(session_id), Some(player_id)) = (connection.session_id, connection.player_id)
        {
            state.hub().broadcast(
                &session_id,
                ServerMessage::PlayerDisconnected {
                    session_id: session_id.clone(),
                    player_id,
                },
            );
        }
    }

    info!(%connection_id, "client disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed message to its handler and surface failures as an
/// `ERROR` reply to the originating connection only.
async fn dispatch(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    subscription: &mut Option<JoinHandle<()>>,
    message: ClientMessage,
) {
    let result = match message {
        ClientMessage::JoinSession {
            session_id,
            player_name,
            is_organizer,
        } => {
            handle_join_session(
                state,
                connection_id,
                outbound_tx,
                subscription,
                &session_id,
                &player_name,
                is_organizer,
            )
            .await
        }
        ClientMessage::GetSessionState { session_id } => {
            handle_get_session_state(state, connection_id, outbound_tx, &session_id).await
        }
        ClientMessage::GetAvailableTeams { session_id } => {
            handle_get_available_teams(state, outbound_tx, &session_id).await
        }
        ClientMessage::JoinTeam {
            session_id,
            player_name,
            team_id,
        } => {
            handle_join_team(
                state,
                connection_id,
                outbound_tx,
                subscription,
                &session_id,
                &player_name,
                team_id,
            )
            .await
        }
        ClientMessage::StartQuiz { session_id } => {
            handle_start_quiz(state, connection_id, &session_id).await
        }
        ClientMessage::GetQuizState { session_id } => {
            handle_get_quiz_state(state, outbound_tx, &session_id).await
        }
        ClientMessage::SubmitAnswer {
            session_id,
            question_id,
            answer,
        } => {
            handle_submit_answer(
                state,
                connection_id,
                outbound_tx,
                &session_id,
                question_id,
                answer,
            )
            .await
        }
        ClientMessage::GetQuestionResults {
            session_id,
            question_id,
        } => {
            handle_get_question_results(state, connection_id, outbound_tx, &session_id, question_id)
                .await
        }
        ClientMessage::RequestNextQuestion { session_id } => {
            handle_request_next_question(state, connection_id, &session_id).await
        }
        ClientMessage::GetFinalResults { session_id } => {
            handle_get_final_results(state, outbound_tx, &session_id).await
        }
    };

    if let Err(err) = result {
        warn!(%connection_id, error = %err, "message handling failed");
        let _ = send_message(
            outbound_tx,
            &ServerMessage::Error {
                message: err.to_string(),
            },
        );
    }
}

async fn handle_join_session(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    subscription: &mut Option<JoinHandle<()>>,
    session_id: &str,
    player_name: &str,
    is_organizer: bool,
) -> Result<(), ServiceError> {
    state
        .store()
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;

    let role = if is_organizer {
        ConnectionRole::Organizer
    } else {
        ConnectionRole::Participant
    };
    state.registry().set_session(connection_id, session_id, role);
    resubscribe(state, outbound_tx, subscription, session_id);
    info!(%connection_id, session_id, player_name, "joined session");

    send_session_state(state, outbound_tx, session_id, role.is_organizer()).await?;

    if state.orchestrator().is_quiz_active(session_id).await {
        let _ = send_message(
            outbound_tx,
            &ServerMessage::QuizActive {
                session_id: session_id.to_string(),
            },
        );
    }
    Ok(())
}

async fn handle_get_session_state(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let is_organizer = connection_is_organizer(state, connection_id);
    send_session_state(state, outbound_tx, session_id, is_organizer).await
}

async fn handle_get_available_teams(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let teams = state.store().teams_by_session(session_id).await?;
    let _ = send_message(
        outbound_tx,
        &ServerMessage::SessionTeams {
            session_id: session_id.to_string(),
            teams: teams.into_iter().map(Into::into).collect(),
        },
    );
    Ok(())
}

async fn handle_join_team(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    subscription: &mut Option<JoinHandle<()>>,
    session_id: &str,
    player_name: &str,
    team_id: Uuid,
) -> Result<(), ServiceError> {
    state
        .store()
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    let team = state
        .store()
        .find_team(team_id)
        .await?
        .filter(|team| team.session_id == session_id)
        .ok_or_else(|| ServiceError::NotFound(format!("team `{team_id}` not found")))?;

    if player_name.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".to_string(),
        ));
    }

    let player = PlayerEntity {
        id: Uuid::new_v4(),
        name: player_name.to_string(),
        team_id: team.id,
        session_id: session_id.to_string(),
        role: PlayerRole::Participant,
    };
    state.store().save_player(player.clone()).await?;

    // A client may join a team without a prior JOIN_SESSION.
    let connection = state.registry().get(connection_id);
    let role = connection.as_ref().map(|c| c.role).unwrap_or_default();
    let already_joined = connection
        .and_then(|c| c.session_id)
        .is_some_and(|joined| joined == session_id);
    if !already_joined {
        state.registry().set_session(connection_id, session_id, role);
        resubscribe(state, outbound_tx, subscription, session_id);
    }
    state.registry().set_player(connection_id, player.id);

    info!(%connection_id, session_id, player_id = %player.id, team_id = %team_id, "player joined team");

    let _ = send_message(
        outbound_tx,
        &ServerMessage::JoinSuccess {
            session_id: session_id.to_string(),
            player_id: player.id,
            team_id,
        },
    );

    broadcast_session_update(state, session_id).await
}

async fn handle_start_quiz(
    state: &SharedState,
    connection_id: Uuid,
    session_id: &str,
) -> Result<(), ServiceError> {
    require_organizer(state, connection_id, "only the organizer can start the quiz")?;

    state
        .orchestrator()
        .initialize_quiz(session_id, state.bank())
        .await?;

    state.hub().broadcast(
        session_id,
        ServerMessage::QuizStart {
            session_id: session_id.to_string(),
        },
    );

    // First question fires after a short delay so clients can switch screens.
    let delayed_state = state.clone();
    let delayed_session = session_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(delayed_state.config().quiz_start_delay()).await;
        match delayed_state
            .orchestrator()
            .start_next_question(&delayed_session)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                delayed_state.hub().broadcast(
                    &delayed_session,
                    ServerMessage::QuizEnded {
                        session_id: delayed_session.clone(),
                    },
                );
            }
            Err(err) => {
                warn!(session_id = %delayed_session, error = %err, "failed to start first question");
            }
        }
    });

    Ok(())
}

async fn handle_get_quiz_state(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let quiz_state = state
        .orchestrator()
        .quiz_state(session_id)
        .await
        .ok_or_else(|| {
            ServiceError::NotFound(format!("no active quiz for session `{session_id}`"))
        })?;
    let _ = send_message(outbound_tx, &ServerMessage::QuizStateUpdate(quiz_state));
    Ok(())
}

async fn handle_submit_answer(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
    question_id: Uuid,
    answer: char,
) -> Result<(), ServiceError> {
    let player_id = state
        .registry()
        .get(connection_id)
        .and_then(|connection| connection.player_id)
        .ok_or_else(|| ServiceError::NotFound("player not found".to_string()))?;
    let player = state
        .store()
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("player not found".to_string()))?;

    state
        .orchestrator()
        .submit_answer(session_id, question_id, player.id, player.team_id, answer)
        .await?;

    let _ = send_message(
        outbound_tx,
        &ServerMessage::AnswerReceived {
            session_id: session_id.to_string(),
            question_id,
        },
    );
    Ok(())
}

async fn handle_get_question_results(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
    question_id: Uuid,
) -> Result<(), ServiceError> {
    let is_organizer = connection_is_organizer(state, connection_id);
    let results = state
        .orchestrator()
        .question_results(session_id, question_id, is_organizer)
        .await?;
    let _ = send_message(outbound_tx, &ServerMessage::QuestionResults(results));
    Ok(())
}

async fn handle_request_next_question(
    state: &SharedState,
    connection_id: Uuid,
    session_id: &str,
) -> Result<(), ServiceError> {
    require_organizer(
        state,
        connection_id,
        "only the organizer can advance to the next question",
    )?;

    let has_next = state
        .orchestrator()
        .start_next_question(session_id)
        .await?;
    if !has_next {
        state.hub().broadcast(
            session_id,
            ServerMessage::QuizEnded {
                session_id: session_id.to_string(),
            },
        );
    }
    Ok(())
}

async fn handle_get_final_results(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let results = state.orchestrator().final_results(session_id).await?;
    let _ = send_message(outbound_tx, &ServerMessage::FinalResults(results));
    Ok(())
}

/// Build and send the personalised session state to a single connection.
async fn send_session_state(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: &str,
    is_organizer: bool,
) -> Result<(), ServiceError> {
    let payload = session_service::session_rosters(state, session_id, is_organizer).await?;
    let _ = send_message(outbound_tx, &ServerMessage::SessionUpdate(payload));
    Ok(())
}

/// Push a personalised `SESSION_UPDATE` to every connection in the session.
///
/// The organizer flag differs per connection, so this goes point-to-point
/// through the registry rather than through the session hub.
async fn broadcast_session_update(
    state: &SharedState,
    session_id: &str,
) -> Result<(), ServiceError> {
    let base = session_service::session_rosters(state, session_id, false).await?;
    for (_, connection) in state.registry().connections_in_session(session_id) {
        let payload = SessionStatePayload {
            is_organizer: connection.role.is_organizer(),
            ..base.clone()
        };
        let _ = send_message(&connection.tx, &ServerMessage::SessionUpdate(payload));
    }
    Ok(())
}

/// Replace the connection's hub subscription with one for `session_id`,
/// forwarding broadcasts through the connection's writer in order.
fn resubscribe(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    subscription: &mut Option<JoinHandle<()>>,
    session_id: &str,
) {
    if let Some(handle) = subscription.take() {
        handle.abort();
    }

    let mut receiver = state.hub().subscribe(session_id);
    let tx = outbound_tx.clone();
    *subscription = Some(tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if send_message(&tx, &message).is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dropped broadcast messages for a slow client");
                }
            }
        }
    }));
}

fn connection_is_organizer(state: &SharedState, connection_id: Uuid) -> bool {
    state
        .registry()
        .get(connection_id)
        .map(|connection| connection.role.is_organizer())
        .unwrap_or(false)
}

fn require_organizer(
    state: &SharedState,
    connection_id: Uuid,
    message: &str,
) -> Result<(), ServiceError> {
    if connection_is_organizer(state, connection_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(message.to_string()))
    }
}

/// Serialize a payload and push it onto the provided WebSocket writer.
///
/// Serialization failure is a permanent error: it is logged and swallowed.
/// A closed writer channel is reported so forwarders can stop.
fn send_message(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> Result<(), ConnectionClosed> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
