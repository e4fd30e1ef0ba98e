// Converts raw contact and message records from the data sources into the
// canonical shapes used by the rest of the pipeline.
// Malformed records are dropped and counted, never turned into errors.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::models::{
    avatar_initial, Contact, ContactStatus, DeliveryStatus, Message, MessageKind, ReplySnapshot,
};

/// Output of a normalization pass together with its diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub items: Vec<T>,
    /// Records that could not be read (not an object, bad id, id conflicts)
    pub dropped: usize,
    /// Exact duplicates that were folded into an earlier record
    pub duplicates: usize,
}

impl<T> Normalized<T> {
    fn empty() -> Self {
        Normalized {
            items: Vec::new(),
            dropped: 0,
            duplicates: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.dropped == 0 && self.duplicates == 0
    }

    /// Report the diagnostics of this pass through the log
    pub fn log_diagnostics(&self, what: &str) {
        if self.is_clean() {
            debug!("Normalized {} {} records", self.items.len(), what);
        } else {
            warn!(
                "Normalized {} {} records ({} dropped, {} duplicates)",
                self.items.len(),
                what,
                self.dropped,
                self.duplicates
            );
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawContact {
    id: Option<Value>,
    name: Option<Value>,
    username: Option<Value>,
    #[serde(alias = "first_name")]
    first_name: Option<Value>,
    #[serde(alias = "last_name")]
    last_name: Option<Value>,
    title: Option<Value>,
    position: Option<Value>,
    department: Option<Value>,
    email: Option<Value>,
    status: Option<Value>,
    #[serde(alias = "last_message")]
    last_message: Option<Value>,
    #[serde(alias = "last_message_time")]
    last_message_time: Option<Value>,
    #[serde(alias = "unread_count")]
    unread_count: Option<Value>,
    avatar: Option<Value>,
    #[serde(alias = "avatar_url")]
    avatar_url: Option<Value>,
    #[serde(alias = "is_group")]
    is_group: Option<Value>,
    members: Option<Value>,
    #[serde(alias = "is_favorite")]
    is_favorite: Option<Value>,
    #[serde(alias = "is_blocked")]
    is_blocked: Option<Value>,
    #[serde(alias = "is_archived")]
    is_archived: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMessage {
    id: Option<Value>,
    #[serde(alias = "sender_id")]
    sender_id: Option<Value>,
    #[serde(alias = "sender_name")]
    sender_name: Option<Value>,
    #[serde(alias = "created_at", alias = "createdAt")]
    timestamp: Option<Value>,
    #[serde(alias = "text")]
    content: Option<Value>,
    #[serde(rename = "type", alias = "message_type", alias = "messageType")]
    kind: Option<Value>,
    status: Option<Value>,
    #[serde(alias = "reply_to")]
    reply_to: Option<Value>,
    forwarded: Option<Value>,
    edited: Option<Value>,
    #[serde(alias = "client_id", alias = "correlationId", alias = "correlation_id")]
    client_id: Option<Value>,
    #[serde(alias = "file_url", alias = "fileUrl")]
    url: Option<Value>,
    caption: Option<Value>,
    #[serde(alias = "duration_secs", alias = "durationSecs")]
    duration: Option<Value>,
    #[serde(alias = "thumbnail_url", alias = "thumbnail")]
    thumbnail_url: Option<Value>,
    #[serde(alias = "file_name")]
    file_name: Option<Value>,
    #[serde(alias = "file_size")]
    file_size: Option<Value>,
    #[serde(alias = "mime_type")]
    mime_type: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
    address: Option<Value>,
    #[serde(alias = "contact_name")]
    contact_name: Option<Value>,
    phone: Option<Value>,
}

/// Coerce a JSON id (number or numeric string) into a non-negative integer
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(id) = n.as_i64() {
                (id >= 0).then_some(id)
            } else {
                let f = n.as_f64()?;
                if f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok().filter(|id| *id >= 0),
        _ => None,
    }
}

fn coerce_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// A string field; any other JSON type reads as missing
fn text(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}

fn non_empty(value: &Option<Value>) -> Option<String> {
    text(value)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text_or_default(value: &Option<Value>) -> String {
    text(value).map(str::to_string).unwrap_or_default()
}

fn flag(value: &Option<Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn coordinate(value: &Option<Value>) -> Option<f64> {
    let parsed = match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn resolve_name(raw: &RawContact) -> String {
    if let Some(name) = non_empty(&raw.name) {
        return name;
    }
    let full = format!(
        "{} {}",
        text(&raw.first_name).unwrap_or("").trim(),
        text(&raw.last_name).unwrap_or("").trim()
    );
    let full = full.trim();
    if !full.is_empty() {
        return full.to_string();
    }
    non_empty(&raw.username).unwrap_or_default()
}

fn contact_from_raw(raw: RawContact, id: i64) -> Contact {
    let name = resolve_name(&raw);
    let is_group = flag(&raw.is_group);
    let status = if is_group {
        ContactStatus::Group
    } else {
        text(&raw.status)
            .map(ContactStatus::parse_lossy)
            .unwrap_or_default()
    };
    let avatar = non_empty(&raw.avatar).unwrap_or_else(|| avatar_initial(&name));
    let title = non_empty(&raw.title)
        .or_else(|| non_empty(&raw.position))
        .unwrap_or_default();

    Contact {
        id,
        title,
        department: non_empty(&raw.department),
        status,
        last_message: text_or_default(&raw.last_message),
        last_message_time: text_or_default(&raw.last_message_time),
        unread_count: coerce_count(raw.unread_count.as_ref())
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        avatar,
        avatar_url: non_empty(&raw.avatar_url),
        is_group,
        members: coerce_count(raw.members.as_ref()).map(|n| n.min(u32::MAX as u64) as u32),
        email: non_empty(&raw.email),
        is_favorite: flag(&raw.is_favorite),
        is_blocked: flag(&raw.is_blocked),
        is_archived: flag(&raw.is_archived),
        name,
    }
}

/// Normalize raw contact/user records.
///
/// Records are de-duplicated by `(id, name)` keeping the first occurrence. A later
/// record that reuses an id under a different name is dropped so ids stay unique.
pub fn normalize_contacts(records: &[Value]) -> Normalized<Contact> {
    let mut out = Normalized::empty();
    let mut seen_pairs: HashSet<(i64, String)> = HashSet::new();
    let mut seen_ids: HashSet<i64> = HashSet::new();

    for record in records {
        if !record.is_object() {
            debug!("Dropping contact record that is not an object");
            out.dropped += 1;
            continue;
        }
        let raw: RawContact = match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Dropping unreadable contact record: {}", e);
                out.dropped += 1;
                continue;
            }
        };
        let Some(id) = raw.id.as_ref().and_then(coerce_id) else {
            debug!("Dropping contact record without a usable id: {:?}", raw.id);
            out.dropped += 1;
            continue;
        };

        let contact = contact_from_raw(raw, id);
        if seen_pairs.contains(&(id, contact.name.clone())) {
            out.duplicates += 1;
            continue;
        }
        if !seen_ids.insert(id) {
            debug!("Dropping contact {} ('{}'): id already used", id, contact.name);
            out.dropped += 1;
            continue;
        }
        seen_pairs.insert((id, contact.name.clone()));
        out.items.push(contact);
    }

    out
}

fn kind_from_raw(raw: &RawMessage) -> MessageKind {
    let url = text_or_default(&raw.url);
    let duration = coerce_count(raw.duration.as_ref())
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    match text(&raw.kind).map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        Some("image") => MessageKind::Image {
            url,
            caption: non_empty(&raw.caption),
        },
        Some("audio") | Some("voice") => MessageKind::Audio {
            url,
            duration_secs: duration,
        },
        Some("video") => MessageKind::Video {
            url,
            duration_secs: duration,
            thumbnail_url: non_empty(&raw.thumbnail_url),
        },
        Some("document") | Some("file") => MessageKind::Document {
            url,
            file_name: non_empty(&raw.file_name).unwrap_or_else(|| "attachment".to_string()),
            file_size: coerce_count(raw.file_size.as_ref()).unwrap_or(0),
            mime_type: non_empty(&raw.mime_type),
        },
        Some("location") => match (coordinate(&raw.latitude), coordinate(&raw.longitude)) {
            (Some(latitude), Some(longitude)) => MessageKind::Location {
                latitude,
                longitude,
                address: non_empty(&raw.address),
            },
            _ => MessageKind::Text,
        },
        Some("contact") => MessageKind::Contact {
            contact_name: non_empty(&raw.contact_name).unwrap_or_default(),
            phone: non_empty(&raw.phone),
        },
        _ => MessageKind::Text,
    }
}

fn reply_snapshot(value: &Value) -> Option<ReplySnapshot> {
    if !value.is_object() {
        return None;
    }
    let raw: RawMessage = serde_json::from_value(value.clone()).ok()?;
    let id = raw.id.as_ref().and_then(coerce_id)?;
    Some(ReplySnapshot {
        id,
        sender_id: raw.sender_id.as_ref().and_then(coerce_id).unwrap_or(0),
        sender_name: text_or_default(&raw.sender_name),
        content: text_or_default(&raw.content),
        kind_label: kind_from_raw(&raw).label().to_string(),
    })
}

fn message_from_raw(raw: RawMessage, id: i64) -> Message {
    let kind = kind_from_raw(&raw);
    // Only the first level of a reply chain is kept
    let reply_to = raw.reply_to.as_ref().and_then(reply_snapshot);

    Message {
        id,
        sender_id: raw.sender_id.as_ref().and_then(coerce_id).unwrap_or(0),
        sender_name: text_or_default(&raw.sender_name),
        timestamp: text_or_default(&raw.timestamp),
        content: text_or_default(&raw.content),
        status: text(&raw.status).and_then(DeliveryStatus::parse),
        reply_to,
        forwarded: flag(&raw.forwarded),
        edited: flag(&raw.edited),
        correlation_id: non_empty(&raw.client_id),
        kind,
    }
}

/// Normalize raw message records for one conversation. Duplicate ids keep the first record.
pub fn normalize_messages(records: &[Value]) -> Normalized<Message> {
    let mut out = Normalized::empty();
    let mut seen_ids: HashSet<i64> = HashSet::new();

    for record in records {
        if !record.is_object() {
            debug!("Dropping message record that is not an object");
            out.dropped += 1;
            continue;
        }
        let raw: RawMessage = match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Dropping unreadable message record: {}", e);
                out.dropped += 1;
                continue;
            }
        };
        let Some(id) = raw.id.as_ref().and_then(coerce_id) else {
            out.dropped += 1;
            continue;
        };
        if !seen_ids.insert(id) {
            out.duplicates += 1;
            continue;
        }
        out.items.push(message_from_raw(raw, id));
    }

    out
}
