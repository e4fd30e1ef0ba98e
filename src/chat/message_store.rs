// Local message log for one conversation.
//
// Outgoing messages are appended optimistically with a time-based local id and a
// client-generated correlation id. The server copy later replaces the optimistic
// entry by correlation id, so a message never shows up twice.

use log::{debug, info, warn};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{CurrentUser, DeliveryStatus, Message, MessageDraft, ReplySnapshot};

#[derive(Debug, Clone)]
pub struct MessageStore {
    conversation_id: i64,
    messages: Vec<Message>,
    last_local_id: i64,
}

impl MessageStore {
    pub fn new(conversation_id: i64) -> Self {
        MessageStore {
            conversation_id,
            messages: Vec::new(),
            last_local_id: 0,
        }
    }

    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn find_by_correlation(&self, correlation_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.correlation_id.as_deref() == Some(correlation_id))
    }

    /// Append a message, or replace the entry that already has its id
    pub fn append(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            self.messages.push(message);
        }
    }

    fn next_local_id(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut id = now.max(self.last_local_id + 1);
        while self.get(id).is_some() {
            id += 1;
        }
        self.last_local_id = id;
        id
    }

    /// Append an outgoing message before the server has seen it.
    ///
    /// Returns the local id and the correlation id the server copy must carry.
    pub fn append_optimistic(
        &mut self,
        draft: MessageDraft,
        sender: &CurrentUser,
        reply_to: Option<ReplySnapshot>,
    ) -> (i64, String) {
        let id = self.next_local_id();
        let correlation_id = Uuid::new_v4().to_string();

        self.messages.push(Message {
            id,
            sender_id: sender.id,
            sender_name: sender.name.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            content: draft.content,
            status: Some(DeliveryStatus::Sending),
            reply_to,
            forwarded: draft.forwarded,
            edited: false,
            correlation_id: Some(correlation_id.clone()),
            kind: draft.kind,
        });
        debug!(
            "Appended optimistic message {} ({}) to conversation {}",
            id, correlation_id, self.conversation_id
        );

        (id, correlation_id)
    }

    /// Replace the optimistic entry for `correlation_id` with the server copy
    pub fn confirm(&mut self, correlation_id: &str, mut confirmed: Message) {
        if confirmed
            .status
            .map_or(true, |s| matches!(s, DeliveryStatus::Sending | DeliveryStatus::Failed))
        {
            confirmed.status = Some(DeliveryStatus::Sent);
        }
        confirmed.correlation_id = Some(correlation_id.to_string());

        let optimistic = self
            .messages
            .iter()
            .position(|m| m.correlation_id.as_deref() == Some(correlation_id) && m.is_pending());
        let already_present = self.messages.iter().position(|m| m.id == confirmed.id);

        // The server may echo only part of the quoted message; the snapshot
        // taken when the reply was composed wins for the same target
        if let Some(local) = optimistic.and_then(|idx| self.messages[idx].reply_to.clone()) {
            if confirmed.reply_to.as_ref().map_or(true, |r| r.id == local.id) {
                confirmed.reply_to = Some(local);
            }
        }

        match (optimistic, already_present) {
            (Some(idx), Some(existing)) if idx != existing => {
                // The server copy arrived through a refetch before the send completed
                self.messages[existing] = confirmed;
                self.messages.remove(idx);
            }
            (Some(idx), _) => {
                self.messages[idx] = confirmed;
            }
            (None, _) => {
                debug!("No optimistic entry for {}, appending server copy", correlation_id);
                self.append(confirmed);
            }
        }
    }

    /// Mark the optimistic entry for `correlation_id` as failed
    pub fn fail(&mut self, correlation_id: &str) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|m| m.correlation_id.as_deref() == Some(correlation_id))
        {
            Some(message) if message.status == Some(DeliveryStatus::Sending) => {
                warn!("Message {} failed to send", message.id);
                message.status = Some(DeliveryStatus::Failed);
                true
            }
            _ => false,
        }
    }

    /// Put a failed message back into the sending state.
    ///
    /// A failed message loaded from the server has no correlation id yet and gets
    /// a fresh one, so the retried send can still be reconciled.
    pub fn retry(&mut self, id: i64) -> Option<&Message> {
        let message = self.messages.iter_mut().find(|m| m.id == id)?;
        if message.status != Some(DeliveryStatus::Failed) {
            return None;
        }
        if message.correlation_id.is_none() {
            message.correlation_id = Some(Uuid::new_v4().to_string());
        }
        message.status = Some(DeliveryStatus::Sending);
        Some(&*message)
    }

    /// Apply an acknowledgement. Only forward transitions are accepted.
    pub fn update_status(&mut self, id: i64, status: DeliveryStatus) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            debug!("Status update for unknown message {}", id);
            return false;
        };
        // Server messages without a status count as sent
        let current = message.status.unwrap_or(DeliveryStatus::Sent);
        if !current.can_advance_to(status) {
            debug!("Ignoring status change {:?} -> {:?} for message {}", current, status, id);
            return false;
        }
        message.status = Some(status);
        true
    }

    /// Whether an optimistic entry is still waiting for the server or a retry
    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(Message::is_pending)
    }

    /// Remove a message. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: i64) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    /// Take an authoritative snapshot from the server.
    ///
    /// Optimistic entries the snapshot does not know about yet stay at the end.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        let known_correlations: HashSet<String> = messages
            .iter()
            .filter_map(|m| m.correlation_id.clone())
            .collect();
        let known_ids: HashSet<i64> = messages.iter().map(|m| m.id).collect();

        let carried: Vec<Message> = self
            .messages
            .drain(..)
            .filter(|m| {
                m.is_pending()
                    && !known_ids.contains(&m.id)
                    && m.correlation_id
                        .as_ref()
                        .map_or(true, |c| !known_correlations.contains(c))
            })
            .collect();

        info!(
            "Loaded {} messages for conversation {} ({} pending kept)",
            messages.len(),
            self.conversation_id,
            carried.len()
        );
        self.messages = messages;
        self.messages.extend(carried);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;

    fn me() -> CurrentUser {
        CurrentUser {
            id: 1,
            name: "Me".to_string(),
        }
    }

    fn server_msg(id: i64, content: &str) -> Message {
        Message::text(id, 1, "Me", content, "2024-03-01T10:00:00Z")
    }

    #[test]
    fn test_append_replaces_same_id() {
        let mut store = MessageStore::new(7);
        store.append(server_msg(1, "draft"));
        store.append(server_msg(1, "final"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).map(|m| m.content.as_str()), Some("final"));
    }

    #[test]
    fn test_optimistic_ids_are_unique() {
        let mut store = MessageStore::new(7);
        let (a, ca) = store.append_optimistic(MessageDraft::text("one"), &me(), None);
        let (b, cb) = store.append_optimistic(MessageDraft::text("two"), &me(), None);
        assert!(b > a);
        assert_ne!(ca, cb);
        assert_eq!(store.get(a).and_then(|m| m.status), Some(DeliveryStatus::Sending));
    }

    #[test]
    fn test_confirm_replaces_in_place() {
        let mut store = MessageStore::new(7);
        store.append(server_msg(1, "earlier"));
        let (local_id, correlation) = store.append_optimistic(MessageDraft::text("hello"), &me(), None);
        store.append(server_msg(2, "later from bob"));

        store.confirm(&correlation, server_msg(500, "hello"));

        let ids: Vec<i64> = store.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 500, 2]);
        assert!(store.get(local_id).is_none());
        assert_eq!(store.get(500).and_then(|m| m.status), Some(DeliveryStatus::Sent));
    }

    #[test]
    fn test_confirm_after_refetch_does_not_duplicate() {
        let mut store = MessageStore::new(7);
        let (_, correlation) = store.append_optimistic(MessageDraft::text("hello"), &me(), None);
        // A refetch raced ahead and already contains the server copy (without client id)
        store.append(server_msg(500, "hello"));

        store.confirm(&correlation, server_msg(500, "hello"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].id, 500);
    }

    #[test]
    fn test_fail_and_retry() {
        let mut store = MessageStore::new(7);
        let (id, correlation) = store.append_optimistic(MessageDraft::text("hi"), &me(), None);

        assert!(store.fail(&correlation));
        assert_eq!(store.get(id).and_then(|m| m.status), Some(DeliveryStatus::Failed));
        assert!(!store.fail(&correlation));

        assert!(store.retry(id).is_some());
        assert_eq!(store.get(id).and_then(|m| m.status), Some(DeliveryStatus::Sending));
        assert!(store.retry(id).is_none());
    }

    #[test]
    fn test_status_updates_are_monotonic() {
        let mut store = MessageStore::new(7);
        let mut msg = server_msg(1, "x");
        msg.status = Some(DeliveryStatus::Sent);
        store.append(msg);

        assert!(store.update_status(1, DeliveryStatus::Read));
        assert!(!store.update_status(1, DeliveryStatus::Delivered));
        assert!(!store.update_status(1, DeliveryStatus::Failed));
        assert!(!store.update_status(99, DeliveryStatus::Read));
        assert_eq!(store.get(1).and_then(|m| m.status), Some(DeliveryStatus::Read));
    }

    #[test]
    fn test_status_without_value_counts_as_sent() {
        let mut store = MessageStore::new(7);
        store.append(server_msg(5, "no status"));

        assert!(!store.update_status(5, DeliveryStatus::Failed));
        assert!(!store.update_status(5, DeliveryStatus::Sending));
        assert!(!store.update_status(5, DeliveryStatus::Sent));
        assert_eq!(store.get(5).and_then(|m| m.status), None);
        assert!(store.update_status(5, DeliveryStatus::Delivered));
    }

    #[test]
    fn test_retry_of_loaded_failure_gets_correlation_id() {
        let mut store = MessageStore::new(7);
        let mut failed = server_msg(13, "lost");
        failed.status = Some(DeliveryStatus::Failed);
        store.append(failed);
        assert!(!store.has_pending());

        let retried = store.retry(13).cloned().unwrap();
        assert_eq!(retried.status, Some(DeliveryStatus::Sending));
        assert!(retried.correlation_id.is_some());
        assert!(store.has_pending());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = MessageStore::new(7);
        store.append(server_msg(1, "x"));
        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        assert!(store.remove(42).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_keeps_unconfirmed_pending() {
        let mut store = MessageStore::new(7);
        store.append(server_msg(1, "old"));
        let (_, confirmed_corr) = store.append_optimistic(MessageDraft::text("made it"), &me(), None);
        let (pending_id, _) = store.append_optimistic(MessageDraft::text("in flight"), &me(), None);

        let mut echoed = server_msg(11, "made it");
        echoed.correlation_id = Some(confirmed_corr);
        store.replace_all(vec![server_msg(10, "fresh"), echoed]);

        let ids: Vec<i64> = store.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 11, pending_id]);
    }

    #[test]
    fn test_optimistic_keeps_payload_and_reply() {
        let mut store = MessageStore::new(7);
        let original = server_msg(3, "question");
        let draft = MessageDraft {
            content: String::new(),
            kind: MessageKind::Image {
                url: "https://x/p.png".to_string(),
                caption: None,
            },
            forwarded: true,
        };
        let (id, _) = store.append_optimistic(draft, &me(), Some(ReplySnapshot::from(&original)));
        let stored = store.get(id).unwrap();
        assert_eq!(stored.kind.label(), "image");
        assert!(stored.forwarded);
        assert_eq!(stored.reply_to.as_ref().map(|r| r.id), Some(3));
    }
}
