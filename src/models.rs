// Canonical data types shared by the chat pipeline, the message store and the API clients

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A contact or group as shown in the chat list.
///
/// Contacts are produced by the normalizer and never mutated in place;
/// a refetch replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub status: ContactStatus,
    pub last_message: String,
    /// Opaque sortable token supplied by the backend
    pub last_message_time: String,
    pub unread_count: u32,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_archived: bool,
}

impl Contact {
    /// Minimal contact used by fixtures and by callers building lists by hand
    pub fn new(id: i64, name: &str, status: ContactStatus) -> Self {
        Contact {
            id,
            name: name.to_string(),
            title: String::new(),
            department: None,
            status,
            last_message: String::new(),
            last_message_time: String::new(),
            unread_count: 0,
            avatar: avatar_initial(name),
            avatar_url: None,
            is_group: status == ContactStatus::Group,
            members: None,
            email: None,
            is_favorite: false,
            is_blocked: false,
            is_archived: false,
        }
    }

    pub fn is_group_chat(&self) -> bool {
        self.is_group || self.status == ContactStatus::Group
    }
}

/// Single uppercase initial used when a contact has no avatar
pub fn avatar_initial(name: &str) -> String {
    name.chars()
        .find(|c| !c.is_whitespace())
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Online,
    Away,
    #[default]
    Offline,
    Group,
}

impl ContactStatus {
    /// Parse a backend status string; anything unrecognized is treated as offline
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or(ContactStatus::Offline)
    }

    /// Fixed sort rank: online < away < offline < group
    pub fn rank(self) -> u8 {
        match self {
            ContactStatus::Online => 0,
            ContactStatus::Away => 1,
            ContactStatus::Offline => 2,
            ContactStatus::Group => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Online => "online",
            ContactStatus::Away => "away",
            ContactStatus::Offline => "offline",
            ContactStatus::Group => "group",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(ContactStatus::Online),
            "away" => Ok(ContactStatus::Away),
            "offline" => Ok(ContactStatus::Offline),
            "group" => Ok(ContactStatus::Group),
            other => Err(format!("unknown contact status '{}'", other)),
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,   // Optimistically appended, not yet acknowledged
    Sent,      // Accepted by the server
    Delivered, // Delivered to the recipient's device
    Read,      // Read by the recipient
    Failed,    // The send request failed
}

impl DeliveryStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sending" | "pending" => Some(DeliveryStatus::Sending),
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" | "seen" => Some(DeliveryStatus::Read),
            "failed" | "error" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    fn progress(self) -> Option<u8> {
        match self {
            DeliveryStatus::Sending => Some(0),
            DeliveryStatus::Sent => Some(1),
            DeliveryStatus::Delivered => Some(2),
            DeliveryStatus::Read => Some(3),
            DeliveryStatus::Failed => None,
        }
    }

    /// Whether a status update may move a message from `self` to `next`.
    ///
    /// Acknowledgements only move forward along sending -> sent -> delivered -> read,
    /// and only a message still sending can fail. Retrying a failed message is a
    /// separate, explicit operation.
    pub fn can_advance_to(self, next: DeliveryStatus) -> bool {
        match (self, next) {
            (DeliveryStatus::Sending, DeliveryStatus::Failed) => true,
            (_, DeliveryStatus::Failed) | (DeliveryStatus::Failed, _) => false,
            (current, next) => next.progress() > current.progress(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Type-specific payload of a message, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Audio {
        url: String,
        duration_secs: u32,
    },
    Video {
        url: String,
        duration_secs: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    Document {
        url: String,
        file_name: String,
        file_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    Contact {
        contact_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image { .. } => "image",
            MessageKind::Audio { .. } => "audio",
            MessageKind::Video { .. } => "video",
            MessageKind::Document { .. } => "document",
            MessageKind::Location { .. } => "location",
            MessageKind::Contact { .. } => "contact",
        }
    }
}

/// Copy of a replied-to message.
///
/// Only one level is kept: a snapshot never carries its own reply target,
/// so reply chains cannot form cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplySnapshot {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub kind_label: String,
}

impl From<&Message> for ReplySnapshot {
    fn from(message: &Message) -> Self {
        ReplySnapshot {
            id: message.id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            content: message.content.clone(),
            kind_label: message.kind.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    /// ISO-8601 timestamp as supplied by the backend
    pub timestamp: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplySnapshot>,
    #[serde(default)]
    pub forwarded: bool,
    #[serde(default)]
    pub edited: bool,
    /// Client-generated id linking an optimistic entry to its server copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub kind: MessageKind,
}

impl Message {
    pub fn text(id: i64, sender_id: i64, sender_name: &str, content: &str, timestamp: &str) -> Self {
        Message {
            id,
            sender_id,
            sender_name: sender_name.to_string(),
            timestamp: timestamp.to_string(),
            content: content.to_string(),
            status: None,
            reply_to: None,
            forwarded: false,
            edited: false,
            correlation_id: None,
            kind: MessageKind::Text,
        }
    }

    pub fn timestamp_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }

    /// Optimistic entries still waiting on (or failed against) the server
    pub fn is_pending(&self) -> bool {
        self.correlation_id.is_some()
            && matches!(self.status, Some(DeliveryStatus::Sending) | Some(DeliveryStatus::Failed))
    }
}

/// Content of a message the user is about to send
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageDraft {
    pub content: String,
    pub kind: MessageKind,
    pub forwarded: bool,
}

impl MessageDraft {
    pub fn text(content: &str) -> Self {
        MessageDraft {
            content: content.to_string(),
            kind: MessageKind::Text,
            forwarded: false,
        }
    }
}

/// The signed-in user, used as the sender of outgoing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
}
