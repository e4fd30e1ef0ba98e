// GraphQL client for the dashboard API
// Queries users and conversation messages, and runs the chat mutations.

use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ApiError, ChatDataSource, ContactFlag, OutgoingMessage};
use crate::models::DeliveryStatus;

const MESSAGE_FIELDS: &str = "id senderId senderName timestamp content type status forwarded edited clientId \
     url caption duration thumbnailUrl fileName fileSize mimeType latitude longitude address \
     contactName phone replyTo { id senderId senderName content type }";

pub const ALL_USERS_QUERY: &str = "query AllUsers { allUsers { id username email firstName lastName \
     avatar avatarUrl position department status lastMessage lastMessageTime unreadCount isGroup \
     members isFavorite isBlocked isArchived } }";

fn messages_query() -> String {
    format!(
        "query ChatMessages($chatId: ID!) {{ chatMessages(chatId: $chatId) {{ {} }} }}",
        MESSAGE_FIELDS
    )
}

fn send_message_mutation() -> String {
    format!(
        "mutation SendMessage($chatId: ID!, $input: MessageInput!) {{ \
         sendMessage(chatId: $chatId, input: $input) {{ message {{ {} }} }} }}",
        MESSAGE_FIELDS
    )
}

pub const UPDATE_STATUS_MUTATION: &str = "mutation UpdateMessageStatus($messageId: ID!, $status: String!) \
     { updateMessageStatus(messageId: $messageId, status: $status) { success } }";

pub const DELETE_MESSAGE_MUTATION: &str =
    "mutation DeleteMessage($messageId: ID!) { deleteMessage(messageId: $messageId) { success } }";

fn flag_mutation(flag: ContactFlag) -> (&'static str, &'static str) {
    match flag {
        ContactFlag::ToggleFavorite => (
            "toggleFavorite",
            "mutation ToggleFavorite($userId: ID!) { toggleFavorite(userId: $userId) { success } }",
        ),
        ContactFlag::ToggleBlock => (
            "toggleBlock",
            "mutation ToggleBlock($userId: ID!) { toggleBlock(userId: $userId) { success } }",
        ),
        ContactFlag::Archive => (
            "archiveChat",
            "mutation ArchiveChat($userId: ID!) { archiveChat(userId: $userId) { success } }",
        ),
        ContactFlag::Unarchive => (
            "unarchiveChat",
            "mutation UnarchiveChat($userId: ID!) { unarchiveChat(userId: $userId) { success } }",
        ),
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Turn a GraphQL envelope into its `data`, treating any reported error as a failure
fn extract_data(response: GraphQlResponse) -> Result<Value, ApiError> {
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(ApiError::GraphQl(messages.join("; ")));
    }
    match response.data {
        Some(Value::Null) | None => Err(ApiError::NoData),
        Some(data) => Ok(data),
    }
}

/// Pull a list out of `data.<field>`; a null list counts as empty
fn take_list(data: &Value, field: &str) -> Result<Vec<Value>, ApiError> {
    match data.get(field) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(ApiError::NoData),
    }
}

fn check_success(data: &Value, field: &str) -> Result<(), ApiError> {
    match data.get(field).and_then(|v| v.get("success")).and_then(Value::as_bool) {
        Some(true) => Ok(()),
        Some(false) => Err(ApiError::GraphQl(format!("{} was rejected", field))),
        None => Err(ApiError::NoData),
    }
}

pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphQlClient {
    pub fn new(endpoint: &str, timeout: Duration, token: Option<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(GraphQlClient {
            http,
            endpoint: endpoint.to_string(),
            token,
        })
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        debug!("GraphQL request to {}: {}", self.endpoint, query.split('{').next().unwrap_or(query).trim());

        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("GraphQL endpoint returned {}", status);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlResponse = response.json().await?;
        extract_data(envelope)
    }
}

#[async_trait]
impl ChatDataSource for GraphQlClient {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
        let data = self.execute(ALL_USERS_QUERY, json!({})).await?;
        let users = take_list(&data, "allUsers")?;
        info!("Fetched {} users", users.len());
        Ok(users)
    }

    async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError> {
        let data = self
            .execute(&messages_query(), json!({ "chatId": conversation_id.to_string() }))
            .await?;
        take_list(&data, "chatMessages")
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        message: &OutgoingMessage,
    ) -> Result<Value, ApiError> {
        let input = serde_json::to_value(message)?;
        let data = self
            .execute(
                &send_message_mutation(),
                json!({ "chatId": conversation_id.to_string(), "input": input }),
            )
            .await?;
        match data.get("sendMessage").and_then(|v| v.get("message")) {
            Some(record) if record.is_object() => Ok(record.clone()),
            _ => Err(ApiError::NoData),
        }
    }

    async fn update_message_status(
        &self,
        message_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), ApiError> {
        let data = self
            .execute(
                UPDATE_STATUS_MUTATION,
                json!({ "messageId": message_id.to_string(), "status": status.as_str() }),
            )
            .await?;
        check_success(&data, "updateMessageStatus")
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        let data = self
            .execute(DELETE_MESSAGE_MUTATION, json!({ "messageId": message_id.to_string() }))
            .await?;
        check_success(&data, "deleteMessage")
    }

    async fn set_contact_flag(&self, contact_id: i64, flag: ContactFlag) -> Result<(), ApiError> {
        let (field, mutation) = flag_mutation(flag);
        let data = self
            .execute(mutation, json!({ "userId": contact_id.to_string() }))
            .await?;
        check_success(&data, field)
    }
}
