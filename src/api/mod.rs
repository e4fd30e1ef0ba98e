// Data sources for contacts and messages
// The GraphQL API is the primary source; the REST chat API is used as a fallback.

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{DeliveryStatus, MessageKind};

pub mod graphql;
pub mod rest;

pub use graphql::GraphQlClient;
pub use rest::RestClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Response contained no usable data")]
    NoData,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation not supported by the {0} API")]
    Unsupported(&'static str),
}

impl ApiError {
    /// The request was refused or never reached the server, so sending it again
    /// elsewhere cannot create a second copy. Timeouts and 5xx answers do not qualify.
    pub fn was_rejected(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_connect() || e.is_builder(),
            ApiError::Status { status, .. } => (400..500).contains(status) && *status != 408,
            ApiError::GraphQl(_) | ApiError::Unsupported(_) => true,
            ApiError::NoData | ApiError::Decode(_) => false,
        }
    }
}

/// Mutations that change how a contact is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactFlag {
    ToggleFavorite,
    ToggleBlock,
    Archive,
    Unarchive,
}

/// Payload of a message being sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    /// Echoed back by the server so the optimistic entry can be matched
    #[serde(rename = "client_id")]
    pub correlation_id: String,
    pub content: String,
    #[serde(rename = "reply_to", skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
    pub forwarded: bool,
    #[serde(flatten)]
    pub kind: MessageKind,
}

/// Raw records are returned as JSON values and normalized by the caller,
/// so one malformed record cannot fail a whole response.
#[async_trait]
pub trait ChatDataSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError>;

    async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError>;

    async fn send_message(
        &self,
        conversation_id: i64,
        message: &OutgoingMessage,
    ) -> Result<Value, ApiError>;

    async fn update_message_status(
        &self,
        message_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), ApiError>;

    async fn delete_message(&self, message_id: i64) -> Result<(), ApiError>;

    async fn set_contact_flag(&self, contact_id: i64, flag: ContactFlag) -> Result<(), ApiError>;
}

/// Uses `primary` and falls back to `fallback` when it fails
/// (or, for message lists, when it comes back empty).
///
/// Sends only fall back when the primary rejected the message outright; after a
/// timeout the message may already exist on the server.
pub struct FallbackSource {
    primary: Arc<dyn ChatDataSource>,
    fallback: Arc<dyn ChatDataSource>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn ChatDataSource>, fallback: Arc<dyn ChatDataSource>) -> Self {
        FallbackSource { primary, fallback }
    }

    fn log_fallback(&self, operation: &str, error: &ApiError) {
        warn!(
            "{} via {} failed ({}), trying {}",
            operation,
            self.primary.name(),
            error,
            self.fallback.name()
        );
    }
}

#[async_trait]
impl ChatDataSource for FallbackSource {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
        match self.primary.fetch_contacts().await {
            Ok(contacts) => Ok(contacts),
            Err(e) => {
                self.log_fallback("fetch_contacts", &e);
                match self.fallback.fetch_contacts().await {
                    // Report the original failure when the fallback cannot list contacts at all
                    Err(ApiError::Unsupported(_)) => Err(e),
                    other => other,
                }
            }
        }
    }

    async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError> {
        match self.primary.fetch_messages(conversation_id).await {
            Ok(messages) if !messages.is_empty() => Ok(messages),
            Ok(_) => {
                debug!(
                    "{} returned no messages for {}, asking {}",
                    self.primary.name(),
                    conversation_id,
                    self.fallback.name()
                );
                // An empty primary answer is still a valid answer if the fallback fails
                Ok(self
                    .fallback
                    .fetch_messages(conversation_id)
                    .await
                    .unwrap_or_default())
            }
            Err(e) => {
                self.log_fallback("fetch_messages", &e);
                self.fallback.fetch_messages(conversation_id).await
            }
        }
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        message: &OutgoingMessage,
    ) -> Result<Value, ApiError> {
        match self.primary.send_message(conversation_id, message).await {
            Ok(record) => Ok(record),
            Err(e) if e.was_rejected() => {
                self.log_fallback("send_message", &e);
                self.fallback.send_message(conversation_id, message).await
            }
            Err(e) => {
                warn!(
                    "send_message via {} failed ({}), not resending in case it was accepted",
                    self.primary.name(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn update_message_status(
        &self,
        message_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), ApiError> {
        match self.primary.update_message_status(message_id, status).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.log_fallback("update_message_status", &e);
                self.fallback.update_message_status(message_id, status).await
            }
        }
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        match self.primary.delete_message(message_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.log_fallback("delete_message", &e);
                self.fallback.delete_message(message_id).await
            }
        }
    }

    async fn set_contact_flag(&self, contact_id: i64, flag: ContactFlag) -> Result<(), ApiError> {
        self.primary.set_contact_flag(contact_id, flag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_message_wire_format() {
        let outgoing = OutgoingMessage {
            correlation_id: "c-1".to_string(),
            content: "hello".to_string(),
            reply_to_id: Some(4),
            forwarded: false,
            kind: MessageKind::Text,
        };
        let json = serde_json::to_value(&outgoing).unwrap();
        assert_eq!(json["client_id"], "c-1");
        assert_eq!(json["reply_to"], 4);
        assert_eq!(json["type"], "text");

        let no_reply = OutgoingMessage {
            reply_to_id: None,
            ..outgoing
        };
        let json = serde_json::to_value(&no_reply).unwrap();
        assert!(json.get("reply_to").is_none());
    }

    #[test]
    fn test_rejected_errors() {
        let status = |status| ApiError::Status {
            status,
            body: String::new(),
        };
        assert!(status(400).was_rejected());
        assert!(status(422).was_rejected());
        assert!(!status(408).was_rejected());
        assert!(!status(503).was_rejected());
        assert!(ApiError::GraphQl("sendMessage was rejected".to_string()).was_rejected());
        assert!(ApiError::Unsupported("rest").was_rejected());
        assert!(!ApiError::NoData.was_rejected());
    }
}
