// Chat list and conversation state for the dashboard chat
pub mod api;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod layout;
pub mod models;

// Re-export main types for convenience
pub use api::{ApiError, ChatDataSource, FallbackSource, GraphQlClient, RestClient};
pub use chat::{ChatContext, ChatError, Notice, NoticeLevel};
pub use models::*;
