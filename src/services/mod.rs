/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Session bootstrap and roster assembly.
pub mod session_service;
/// WebSocket connection handling and message routing.
pub mod websocket_service;
