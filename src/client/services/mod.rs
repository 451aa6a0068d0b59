pub mod api;
pub mod auth_service;
pub mod conversation_session;
pub mod directory;
pub mod person_picker;
pub mod websocket_client;

#[cfg(test)]
pub mod testing;
