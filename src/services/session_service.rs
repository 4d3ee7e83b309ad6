use std::time::SystemTime;

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{SessionEntity, TeamEntity},
    dto::session::{CreateSessionRequest, SessionDetail, SessionStatePayload, SessionSummary},
    error::ServiceError,
    state::SharedState,
};

const SESSION_CODE_LENGTH: usize = 6;
const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 8;

/// Create a session and its fixed batch of palette teams.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionSummary, ServiceError> {
    let CreateSessionRequest {
        organizer_name,
        session_name,
        team_count,
    } = request;

    if team_count > state.config().max_team_count() {
        return Err(ServiceError::InvalidInput(format!(
            "team count exceeds the palette size ({})",
            state.config().max_team_count()
        )));
    }

    let id = unused_session_code(state).await?;
    let session = SessionEntity {
        id: id.clone(),
        name: session_name,
        organizer: organizer_name,
        team_count,
        active: true,
        created_at: SystemTime::now(),
    };
    state.store().save_session(session.clone()).await?;

    for index in 0..team_count {
        // Palette size was checked above.
        let slot = state.config().team_slot(index).ok_or_else(|| {
            ServiceError::InvalidInput("team palette exhausted".to_string())
        })?;
        state
            .store()
            .save_team(TeamEntity {
                id: Uuid::new_v4(),
                name: slot.name.clone(),
                session_id: id.clone(),
                score: 0,
                color: slot.color.clone(),
            })
            .await?;
    }

    info!(session_id = %id, teams = team_count, "session created");
    Ok(session.into())
}

/// Fetch a session together with its teams.
pub async fn session_detail(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionDetail, ServiceError> {
    let session = state
        .store()
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    let teams = state.store().teams_by_session(session_id).await?;
    Ok((session, teams).into())
}

/// Assemble the session-state payload pushed as `SESSION_UPDATE`: every team
/// with its current roster, plus the caller's organizer flag.
pub async fn session_rosters(
    state: &SharedState,
    session_id: &str,
    is_organizer: bool,
) -> Result<SessionStatePayload, ServiceError> {
    let session = state
        .store()
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    let teams = state.store().teams_by_session(session_id).await?;

    let mut rosters = Vec::with_capacity(teams.len());
    for team in teams {
        let players = state.store().players_by_team(team.id).await?;
        rosters.push((team, players).into());
    }

    Ok(SessionStatePayload {
        session_id: session.id,
        session_name: session.name,
        teams: rosters,
        is_organizer,
    })
}

async fn unused_session_code(state: &SharedState) -> Result<String, ServiceError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_session_code();
        if state.store().find_session(&code).await?.is_none() {
            return Ok(code);
        }
    }
    Err(ServiceError::InvalidState(
        "could not allocate a unique session code".to_string(),
    ))
}

fn generate_session_code() -> String {
    let mut rng = rand::rng();
    (0..SESSION_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..SESSION_CODE_ALPHABET.len());
            SESSION_CODE_ALPHABET[index] as char
        })
        .collect()
}
