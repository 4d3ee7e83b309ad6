use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    quiz::QuizStateDto,
    results::{FinalResultsDto, QuestionResultsDto},
    session::{SessionStatePayload, TeamSummary},
};

/// Messages accepted from quiz WebSocket clients.
///
/// The wire envelope is `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_id: String,
        player_name: String,
        #[serde(default)]
        is_organizer: bool,
    },
    #[serde(rename_all = "camelCase")]
    GetSessionState { session_id: String },
    #[serde(rename_all = "camelCase")]
    GetAvailableTeams { session_id: String },
    #[serde(rename_all = "camelCase")]
    JoinTeam {
        session_id: String,
        player_name: String,
        team_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    StartQuiz { session_id: String },
    #[serde(rename_all = "camelCase")]
    GetQuizState { session_id: String },
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        session_id: String,
        question_id: Uuid,
        answer: char,
    },
    #[serde(rename_all = "camelCase")]
    GetQuestionResults {
        session_id: String,
        question_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    RequestNextQuestion { session_id: String },
    #[serde(rename_all = "camelCase")]
    GetFinalResults { session_id: String },
}

impl ClientMessage {
    /// Parse and validate a message from its JSON representation.
    pub fn from_json_str(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }
}

/// Messages pushed to quiz WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    SessionUpdate(SessionStatePayload),
    #[serde(rename_all = "camelCase")]
    SessionTeams {
        session_id: String,
        teams: Vec<TeamSummary>,
    },
    #[serde(rename_all = "camelCase")]
    JoinSuccess {
        session_id: String,
        player_id: Uuid,
        team_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    QuizActive { session_id: String },
    #[serde(rename_all = "camelCase")]
    QuizStart { session_id: String },
    QuizStateUpdate(QuizStateDto),
    #[serde(rename_all = "camelCase")]
    ShowAnswer {
        session_id: String,
        question_id: Uuid,
    },
    QuestionResults(QuestionResultsDto),
    #[serde(rename_all = "camelCase")]
    QuizEnded { session_id: String },
    FinalResults(FinalResultsDto),
    #[serde(rename_all = "camelCase")]
    AnswerReceived {
        session_id: String,
        question_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected {
        session_id: String,
        player_id: Uuid,
    },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_session_envelope_round_trips() {
        let json = r#"{
            "type": "JOIN_SESSION",
            "payload": { "sessionId": "AB12CD", "playerName": "Alice", "isOrganizer": true }
        }"#;
        let message = ClientMessage::from_json_str(json).unwrap();
        match &message {
            ClientMessage::JoinSession {
                session_id,
                player_name,
                is_organizer,
            } => {
                assert_eq!(session_id, "AB12CD");
                assert_eq!(player_name, "Alice");
                assert!(is_organizer);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let serialized = serde_json::to_value(&message).unwrap();
        assert_eq!(serialized["type"], "JOIN_SESSION");
        assert_eq!(serialized["payload"]["sessionId"], "AB12CD");
    }

    #[test]
    fn submit_answer_carries_option_letter() {
        let question_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type": "SUBMIT_ANSWER", "payload": {{"sessionId": "AB12CD", "questionId": "{question_id}", "answer": "B"}}}}"#
        );
        let message = ClientMessage::from_json_str(&json).unwrap();
        match message {
            ClientMessage::SubmitAnswer { answer, .. } => assert_eq!(answer, 'B'),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn is_organizer_defaults_to_false() {
        let json = r#"{
            "type": "JOIN_SESSION",
            "payload": { "sessionId": "AB12CD", "playerName": "Bob" }
        }"#;
        let message = ClientMessage::from_json_str(json).unwrap();
        match message {
            ClientMessage::JoinSession { is_organizer, .. } => assert!(!is_organizer),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let json = r#"{"type": "NOT_A_THING", "payload": {}}"#;
        assert!(ClientMessage::from_json_str(json).is_err());
    }

    #[test]
    fn error_message_serializes_with_screaming_type() {
        let message = ServerMessage::Error {
            message: "session not found".to_string(),
        };
        let serialized = serde_json::to_value(&message).unwrap();
        assert_eq!(serialized["type"], "ERROR");
        assert_eq!(serialized["payload"]["message"], "session not found");
    }

    #[test]
    fn show_answer_serializes_camel_case_payload() {
        let question_id = Uuid::new_v4();
        let message = ServerMessage::ShowAnswer {
            session_id: "AB12CD".to_string(),
            question_id,
        };
        let serialized = serde_json::to_value(&message).unwrap();
        assert_eq!(serialized["type"], "SHOW_ANSWER");
        assert_eq!(serialized["payload"]["sessionId"], "AB12CD");
        assert_eq!(
            serialized["payload"]["questionId"],
            question_id.to_string()
        );
    }
}
