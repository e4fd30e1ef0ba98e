// REST chat API, used when the GraphQL API yields nothing usable
//
//   GET    /api/chat/<id>/messages/
//   POST   /api/chat/<id>/messages/
//   PUT    /api/message/<id>/status/
//   DELETE /api/message/<id>/

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use std::time::Duration;

use super::{ApiError, ChatDataSource, ContactFlag, OutgoingMessage};
use crate::models::DeliveryStatus;

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

fn messages_url(base_url: &str, conversation_id: i64) -> String {
    format!("{}/api/chat/{}/messages/", base_url.trim_end_matches('/'), conversation_id)
}

fn status_url(base_url: &str, message_id: i64) -> String {
    format!("{}/api/message/{}/status/", base_url.trim_end_matches('/'), message_id)
}

fn message_url(base_url: &str, message_id: i64) -> String {
    format!("{}/api/message/{}/", base_url.trim_end_matches('/'), message_id)
}

/// Accept a bare array or the paginated `{"results": [...]}` / `{"messages": [...]}` shapes
fn extract_records(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["results", "messages", "data"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Ok(items);
                }
            }
            Err(ApiError::NoData)
        }
        _ => Err(ApiError::NoData),
    }
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RestClient {
            http,
            base_url: base_url.to_string(),
            token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ChatDataSource for RestClient {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
        Err(ApiError::Unsupported("REST"))
    }

    async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError> {
        let url = messages_url(&self.base_url, conversation_id);
        debug!("GET {}", url);
        let response = self.authorize(self.http.get(&url)).send().await?;
        let body: Value = Self::check(response).await?.json().await?;
        let records = extract_records(body)?;
        info!("Fetched {} messages for conversation {} over REST", records.len(), conversation_id);
        Ok(records)
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        message: &OutgoingMessage,
    ) -> Result<Value, ApiError> {
        let url = messages_url(&self.base_url, conversation_id);
        debug!("POST {}", url);
        let response = self.authorize(self.http.post(&url).json(message)).send().await?;
        let record: Value = Self::check(response).await?.json().await?;
        if record.is_object() {
            Ok(record)
        } else {
            Err(ApiError::NoData)
        }
    }

    async fn update_message_status(
        &self,
        message_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), ApiError> {
        let url = status_url(&self.base_url, message_id);
        debug!("PUT {}", url);
        let request = self.http.put(&url).json(&json!({ "status": status.as_str() }));
        Self::check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        let url = message_url(&self.base_url, message_id);
        debug!("DELETE {}", url);
        match Self::check(self.authorize(self.http.delete(&url)).send().await?).await {
            Ok(_) => Ok(()),
            // Already gone
            Err(ApiError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_contact_flag(&self, _contact_id: i64, _flag: ContactFlag) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("REST"))
    }
}
