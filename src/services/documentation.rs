use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Eco Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionSummary,
            crate::dto::session::SessionDetail,
            crate::dto::session::SessionStatePayload,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::quiz::QuizStateDto,
            crate::dto::results::QuestionResultsDto,
            crate::dto::results::FinalResultsDto,
            crate::dao::models::QuestionContent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session creation and lookup"),
        (name = "quiz", description = "WebSocket operations for quiz clients"),
    )
)]
pub struct ApiDoc;
