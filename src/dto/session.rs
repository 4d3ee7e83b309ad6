use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{PlayerEntity, SessionEntity, TeamEntity},
    dto::format_system_time,
};

/// Payload used to create a brand-new quiz session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Name of the person organizing the session.
    #[validate(length(min = 1, message = "organizer name must not be empty"))]
    pub organizer_name: String,
    /// Display name for the session.
    #[validate(length(min = 1, message = "session name must not be empty"))]
    pub session_name: String,
    /// Number of teams to bootstrap from the palette.
    #[validate(range(min = 2, max = 6, message = "team count must be between 2 and 6"))]
    pub team_count: usize,
}

/// Summary returned once a session has been created.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub organizer: String,
    pub team_count: usize,
    pub active: bool,
    pub created_at: String,
}

impl From<SessionEntity> for SessionSummary {
    fn from(session: SessionEntity) -> Self {
        Self {
            id: session.id,
            name: session.name,
            organizer: session.organizer,
            team_count: session.team_count,
            active: session.active,
            created_at: format_system_time(session.created_at),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public projection of a team.
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub score: i64,
}

impl From<TeamEntity> for TeamSummary {
    fn from(team: TeamEntity) -> Self {
        Self {
            id: team.id,
            name: team.name,
            color: team.color,
            score: team.score,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public projection of a player.
pub struct PlayerSummary {
    pub id: Uuid,
    pub name: String,
    pub is_organizer: bool,
}

impl From<PlayerEntity> for PlayerSummary {
    fn from(player: PlayerEntity) -> Self {
        Self {
            id: player.id,
            name: player.name,
            is_organizer: player.role.is_organizer(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// A team together with its current roster.
pub struct TeamRoster {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub score: i64,
    pub players: Vec<PlayerSummary>,
}

impl From<(TeamEntity, Vec<PlayerEntity>)> for TeamRoster {
    fn from((team, players): (TeamEntity, Vec<PlayerEntity>)) -> Self {
        Self {
            id: team.id,
            name: team.name,
            color: team.color,
            score: team.score,
            players: players.into_iter().map(Into::into).collect(),
        }
    }
}

/// Session metadata and teams returned by the session lookup endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub name: String,
    pub organizer: String,
    pub team_count: usize,
    pub active: bool,
    pub created_at: String,
    pub teams: Vec<TeamSummary>,
}

impl From<(SessionEntity, Vec<TeamEntity>)> for SessionDetail {
    fn from((session, teams): (SessionEntity, Vec<TeamEntity>)) -> Self {
        Self {
            id: session.id,
            name: session.name,
            organizer: session.organizer,
            team_count: session.team_count,
            active: session.active,
            created_at: format_system_time(session.created_at),
            teams: teams.into_iter().map(Into::into).collect(),
        }
    }
}

/// Payload of the `SESSION_UPDATE` push, personalised per connection.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatePayload {
    pub session_id: String,
    pub session_name: String,
    pub teams: Vec<TeamRoster>,
    pub is_organizer: bool,
}
