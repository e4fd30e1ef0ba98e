// Per-conversation ephemeral state: selected messages, reply target and message search.
// Everything here is reset when the active conversation changes.

use log::debug;
use std::collections::BTreeSet;

use crate::models::{Message, ReplySnapshot};

/// Coarse state derived from the individual fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    SelectionMode,
    Replying,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    conversation_id: Option<i64>,
    selected_messages: BTreeSet<i64>,
    is_selection_mode: bool,
    reply_to: Option<ReplySnapshot>,
    search_query: String,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn selected_messages(&self) -> &BTreeSet<i64> {
        &self.selected_messages
    }

    pub fn is_selection_mode(&self) -> bool {
        self.is_selection_mode
    }

    pub fn reply_to(&self) -> Option<&ReplySnapshot> {
        self.reply_to.as_ref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn phase(&self) -> Phase {
        if self.is_selection_mode {
            Phase::SelectionMode
        } else if self.reply_to.is_some() {
            Phase::Replying
        } else if !self.search_query.trim().is_empty() {
            Phase::Searching
        } else {
            Phase::Idle
        }
    }

    /// Make `conversation_id` the active conversation.
    ///
    /// A change of conversation always drops selection, reply target and search,
    /// whatever state we were in. Returns false when the id is already active.
    pub fn switch_conversation(&mut self, conversation_id: i64) -> bool {
        if self.conversation_id == Some(conversation_id) {
            return false;
        }
        debug!(
            "Switching conversation {:?} -> {}, resetting selection/reply/search",
            self.conversation_id, conversation_id
        );
        self.conversation_id = Some(conversation_id);
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.selected_messages.clear();
        self.is_selection_mode = false;
        self.reply_to = None;
        self.search_query.clear();
    }

    /// Add or remove a message from the selection. Returns whether it is now selected.
    pub fn toggle_message(&mut self, message_id: i64) -> bool {
        let selected = if self.selected_messages.remove(&message_id) {
            false
        } else {
            self.selected_messages.insert(message_id);
            true
        };
        // The first toggle enters selection mode, emptying the selection leaves it
        self.is_selection_mode = !self.selected_messages.is_empty();
        selected
    }

    pub fn enter_selection_mode(&mut self) {
        self.is_selection_mode = true;
    }

    pub fn exit_selection_mode(&mut self) {
        self.is_selection_mode = false;
        self.selected_messages.clear();
    }

    pub fn select_all<I: IntoIterator<Item = i64>>(&mut self, message_ids: I) {
        self.selected_messages.extend(message_ids);
        self.is_selection_mode = !self.selected_messages.is_empty();
    }

    /// Forget a message that no longer exists
    pub fn deselect(&mut self, message_id: i64) {
        if self.selected_messages.remove(&message_id) && self.selected_messages.is_empty() {
            self.is_selection_mode = false;
        }
        if self.reply_to.as_ref().map(|r| r.id) == Some(message_id) {
            self.reply_to = None;
        }
    }

    /// Reply to `message`; leaves selection mode
    pub fn set_reply_to(&mut self, message: &Message) {
        self.exit_selection_mode();
        self.reply_to = Some(ReplySnapshot::from(message));
    }

    pub fn clear_reply(&mut self) {
        self.reply_to = None;
    }

    /// Hand the reply target to an outgoing message and clear it
    pub fn take_reply(&mut self) -> Option<ReplySnapshot> {
        self.reply_to.take()
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
    }

    /// Messages matching the current search query by content or sender name
    pub fn matching_messages<'a>(&self, messages: &'a [Message]) -> Vec<&'a Message> {
        let query = self.search_query.trim().to_lowercase();
        if query.is_empty() {
            return messages.iter().collect();
        }
        messages
            .iter()
            .filter(|m| {
                m.content.to_lowercase().contains(&query)
                    || m.sender_name.to_lowercase().contains(&query)
            })
            .collect()
    }
}
