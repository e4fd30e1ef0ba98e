// Common test utilities for integration tests
// A scripted in-memory data source and contact/message fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use log::{debug, LevelFilter};
use serde_json::{json, Value};

use dashchat::api::{ApiError, ChatDataSource, ContactFlag, OutgoingMessage};
use dashchat::chat::ChatContext;
use dashchat::models::{CurrentUser, DeliveryStatus};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub const ME: i64 = 1;

pub fn me() -> CurrentUser {
    CurrentUser {
        id: ME,
        name: "Me".to_string(),
    }
}

#[derive(Default)]
struct ScriptState {
    contacts: Vec<Value>,
    messages: HashMap<i64, Vec<Value>>,
    fail_contacts: bool,
    fail_messages: bool,
    fail_send: bool,
    send_unsupported: bool,
    contacts_unsupported: bool,
    next_message_id: i64,
    sent: Vec<(i64, OutgoingMessage)>,
    deleted: Vec<i64>,
    status_updates: Vec<(i64, DeliveryStatus)>,
    flags: Vec<(i64, ContactFlag)>,
    contact_fetches: usize,
}

/// In-memory backend whose answers and failures are set by the test
#[derive(Clone)]
pub struct ScriptedSource {
    name: &'static str,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSource {
    pub fn new(name: &'static str) -> Self {
        ScriptedSource {
            name,
            state: Arc::new(Mutex::new(ScriptState {
                next_message_id: 1000,
                ..Default::default()
            })),
        }
    }

    pub fn with_contacts(self, contacts: Vec<Value>) -> Self {
        self.state.lock().unwrap().contacts = contacts;
        self
    }

    pub fn with_messages(self, conversation_id: i64, messages: Vec<Value>) -> Self {
        self.state.lock().unwrap().messages.insert(conversation_id, messages);
        self
    }

    pub fn set_fail_contacts(&self, fail: bool) {
        self.state.lock().unwrap().fail_contacts = fail;
    }

    pub fn set_fail_messages(&self, fail: bool) {
        self.state.lock().unwrap().fail_messages = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    pub fn set_send_unsupported(&self, unsupported: bool) {
        self.state.lock().unwrap().send_unsupported = unsupported;
    }

    pub fn set_contacts_unsupported(&self, unsupported: bool) {
        self.state.lock().unwrap().contacts_unsupported = unsupported;
    }

    pub fn sent(&self) -> Vec<(i64, OutgoingMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn status_updates(&self) -> Vec<(i64, DeliveryStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn flags(&self) -> Vec<(i64, ContactFlag)> {
        self.state.lock().unwrap().flags.clone()
    }

    pub fn contact_fetches(&self) -> usize {
        self.state.lock().unwrap().contact_fetches
    }

    pub fn context(&self) -> ChatContext {
        ChatContext::new(Arc::new(self.clone()), me())
    }
}

fn toggle(record: &mut Value, field: &str) {
    let current = record.get(field).and_then(Value::as_bool).unwrap_or(false);
    record[field] = Value::Bool(!current);
}

#[async_trait]
impl ChatDataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.contact_fetches += 1;
        if state.contacts_unsupported {
            return Err(ApiError::Unsupported("scripted"));
        }
        if state.fail_contacts {
            return Err(ApiError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(state.contacts.clone())
    }

    async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError> {
        let state = self.state.lock().unwrap();
        if state.fail_messages {
            return Err(ApiError::GraphQl("internal error".to_string()));
        }
        Ok(state.messages.get(&conversation_id).cloned().unwrap_or_default())
    }

    async fn send_message(&self, conversation_id: i64, message: &OutgoingMessage) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.send_unsupported {
            return Err(ApiError::Unsupported("scripted"));
        }
        state.sent.push((conversation_id, message.clone()));
        if state.fail_send {
            return Err(ApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        state.next_message_id += 1;
        // Echo the payload back the way the API does, under its canonical field names
        let mut record = serde_json::to_value(message)?;
        if let Some(fields) = record.as_object_mut() {
            fields.remove("reply_to");
            fields.insert("id".to_string(), json!(state.next_message_id));
            fields.insert("senderId".to_string(), json!(ME));
            fields.insert("senderName".to_string(), json!("Me"));
            fields.insert("timestamp".to_string(), json!("2024-03-01T12:00:00Z"));
            fields.insert("status".to_string(), json!("sent"));
            if let Some(reply_id) = message.reply_to_id {
                fields.insert(
                    "replyTo".to_string(),
                    json!({"id": reply_id, "senderId": 2, "content": "quoted"}),
                );
            }
        }
        state
            .messages
            .entry(conversation_id)
            .or_default()
            .push(record.clone());
        debug!("Scripted source stored message {}", state.next_message_id);
        Ok(record)
    }

    async fn update_message_status(&self, message_id: i64, status: DeliveryStatus) -> Result<(), ApiError> {
        self.state.lock().unwrap().status_updates.push((message_id, status));
        Ok(())
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        self.state.lock().unwrap().deleted.push(message_id);
        Ok(())
    }

    async fn set_contact_flag(&self, contact_id: i64, flag: ContactFlag) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.flags.push((contact_id, flag));
        let Some(record) = state
            .contacts
            .iter_mut()
            .find(|c| c.get("id").and_then(Value::as_i64) == Some(contact_id))
        else {
            return Err(ApiError::Status {
                status: 404,
                body: "no such user".to_string(),
            });
        };
        match flag {
            ContactFlag::ToggleFavorite => toggle(record, "isFavorite"),
            ContactFlag::ToggleBlock => toggle(record, "isBlocked"),
            ContactFlag::Archive => record["isArchived"] = Value::Bool(true),
            ContactFlag::Unarchive => record["isArchived"] = Value::Bool(false),
        }
        Ok(())
    }
}

pub fn contact(id: i64, name: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": status,
        "position": "Engineer",
        "department": "Engineering",
        "lastMessage": "",
        "lastMessageTime": "",
        "unreadCount": 0,
    })
}

/// Eight contacts across statuses and departments, plus one malformed record
pub fn team_contacts() -> Vec<Value> {
    vec![
        json!({"id": 2, "firstName": "Bob", "lastName": "Stone", "status": "online",
               "position": "Designer", "department": "Design", "unreadCount": 2,
               "lastMessageTime": "2024-03-01T09:00:00Z"}),
        json!({"id": 3, "name": "Carol", "status": "away", "department": "Engineering",
               "unreadCount": 0, "lastMessageTime": "2024-03-01T11:00:00Z", "isFavorite": true}),
        json!({"id": "4", "name": "alice", "status": "offline", "department": "Sales",
               "unreadCount": "5", "lastMessageTime": "2024-02-28T08:00:00Z"}),
        json!({"id": 5, "name": "Dave", "status": "ONLINE", "department": "Engineering",
               "lastMessageTime": "2024-03-01T10:00:00Z"}),
        json!({"id": 6, "name": "Design Team", "isGroup": true, "members": 4,
               "lastMessageTime": "2024-03-01T08:30:00Z"}),
        json!({"id": 7, "name": "Eve", "status": "online", "isBlocked": true}),
        json!({"id": 8, "name": "Frank", "status": "busy", "isArchived": true}),
        json!({"id": 9, "name": "Grace", "status": "offline", "department": "Sales", "unreadCount": 1}),
        json!({"name": "No Id"}),
    ]
}

pub fn message(id: i64, sender_id: i64, content: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "senderId": sender_id,
        "senderName": if sender_id == ME { "Me" } else { "Bob" },
        "timestamp": timestamp,
        "content": content,
        "type": "text",
        "status": "delivered",
    })
}

pub fn conversation_with_bob() -> Vec<Value> {
    vec![
        message(10, 2, "Morning! Did you see the report?", "2024-03-01T09:00:00Z"),
        message(11, ME, "Yes, looks good", "2024-03-01T09:01:00Z"),
        message(12, 2, "Great, shipping the report today", "2024-03-01T09:02:00Z"),
    ]
}
