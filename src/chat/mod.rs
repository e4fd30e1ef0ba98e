// Chat state container
//
// ChatContext owns everything the chat view needs: the contact snapshot and its
// filter/sort/page state, the active conversation with its selection/reply/search
// state, one message store per visited conversation, typing indicators and the
// voice recorder. It is constructed explicitly with its data source injected.

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Duration;

pub mod filter;
pub mod media;
pub mod message_store;
pub mod normalizer;
pub mod pagination;
pub mod selection;
pub mod typing;

use crate::api::{ApiError, ChatDataSource, ContactFlag, OutgoingMessage};
use crate::models::{Contact, CurrentUser, DeliveryStatus, Message, MessageDraft};
use filter::{ContactCategory, FilterState, SortKey, SortOrder, SortState, StatusFilter};
use media::{Clipboard, MediaDevices, VoiceRecorder};
use message_store::MessageStore;
use pagination::{AutoSizer, PageOutcome, Paginator};
use selection::ConversationState;
use typing::{TypingEvent, TypingStatus, TypingTimer, TypingTracker};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No conversation is selected")]
    NoActiveConversation,

    #[error("Unknown message {0}")]
    UnknownMessage(i64),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Dismissible inline message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
}

/// Identifies a message load so late responses can be recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub conversation_id: i64,
    generation: u64,
}

/// An optimistically appended message waiting for the server
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub conversation_id: i64,
    pub local_id: i64,
    pub outgoing: OutgoingMessage,
}

pub struct ChatContext {
    source: Arc<dyn ChatDataSource>,
    me: CurrentUser,

    contacts: Vec<Contact>,
    dropped_contacts: usize,
    filter: FilterState,
    sort: SortState,
    paginator: Paginator,
    auto_sizer: AutoSizer,

    conversation: ConversationState,
    stores: HashMap<i64, MessageStore>,
    generation: u64,
    /// Correlation ids of in-flight sends the user deleted
    deleted_in_flight: HashSet<String>,

    typing: TypingTracker,
    typing_timers: Vec<TypingTimer>,
    recorder: VoiceRecorder,

    notices: Vec<Notice>,
    next_notice_id: u64,
}

impl ChatContext {
    pub fn new(source: Arc<dyn ChatDataSource>, me: CurrentUser) -> Self {
        ChatContext {
            source,
            me,
            contacts: Vec::new(),
            dropped_contacts: 0,
            filter: FilterState::default(),
            sort: SortState::default(),
            paginator: Paginator::default(),
            auto_sizer: AutoSizer::default(),
            conversation: ConversationState::new(),
            stores: HashMap::new(),
            generation: 0,
            deleted_in_flight: HashSet::new(),
            typing: TypingTracker::default(),
            typing_timers: Vec::new(),
            recorder: VoiceRecorder::new(),
            notices: Vec::new(),
            next_notice_id: 1,
        }
    }

    pub fn with_auto_sizer(mut self, auto_sizer: AutoSizer) -> Self {
        self.auto_sizer = auto_sizer;
        self
    }

    pub fn with_typing_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.typing = TypingTracker::new(timeout);
        self
    }

    pub fn current_user(&self) -> &CurrentUser {
        &self.me
    }

    pub fn source(&self) -> Arc<dyn ChatDataSource> {
        Arc::clone(&self.source)
    }

    // ------------------- Notices -------------------

    fn push_notice(&mut self, level: NoticeLevel, text: String) {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice { id, level, text });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: u64) {
        self.notices.retain(|n| n.id != id);
    }

    // ------------------- Contact list -------------------

    /// Refetch the contact list. On failure the cached list stays in place.
    pub async fn refresh_contacts(&mut self) -> bool {
        let result = self.source.fetch_contacts().await;
        self.apply_contacts(result)
    }

    /// Replace the contact snapshot with a fetched list
    pub fn apply_contacts(&mut self, result: Result<Vec<Value>, ApiError>) -> bool {
        match result {
            Ok(records) => {
                let normalized = normalizer::normalize_contacts(&records);
                normalized.log_diagnostics("contact");
                self.dropped_contacts = normalized.dropped;
                self.contacts = normalized.items;
                true
            }
            Err(e) => {
                warn!("Failed to load contacts from {}: {}", self.source.name(), e);
                self.push_notice(
                    NoticeLevel::Error,
                    format!("Could not refresh contacts: {}", e),
                );
                false
            }
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Records skipped by the last successful contact refresh
    pub fn dropped_contacts(&self) -> usize {
        self.dropped_contacts
    }

    pub fn contact(&self, id: i64) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn set_contact_search(&mut self, query: &str) {
        self.filter.search_query = query.to_string();
    }

    pub fn set_category(&mut self, category: ContactCategory) {
        self.filter.category = category;
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
    }

    pub fn set_department(&mut self, department: Option<String>) {
        self.filter.department = department;
    }

    pub fn set_unread_only(&mut self, unread_only: bool) {
        self.filter.unread_only = unread_only;
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.filter.favorites_only = favorites_only;
    }

    pub fn set_sort(&mut self, sort_by: SortKey, sort_order: SortOrder) {
        self.sort = SortState::new(sort_by, sort_order);
    }

    /// Filtered and sorted contacts, not paginated
    pub fn filtered_contacts(&self) -> Vec<Contact> {
        filter::apply(&self.contacts, &self.filter, &self.sort)
    }

    /// The page of contacts to display
    pub fn visible_contacts(&mut self) -> PageOutcome<Contact> {
        let filtered = self.filtered_contacts();
        let outcome = self.paginator.paginate(&filtered);
        if outcome.reset {
            info!("Contact list shrank to {} entries, back to page 1", filtered.len());
        }
        outcome
    }

    pub fn set_page(&mut self, page: usize) {
        self.paginator.set_current_page(page);
    }

    pub fn next_page(&mut self) -> bool {
        let total = self.filtered_contacts().len();
        self.paginator.next_page(total)
    }

    pub fn prev_page(&mut self) -> bool {
        self.paginator.prev_page()
    }

    /// Recompute records per page for a new container height
    pub fn resize(&mut self, container_height: u32) -> usize {
        let records = self.auto_sizer.records_for_height(container_height);
        if self.paginator.set_records_per_page(records) {
            debug!("Container height {} -> {} records per page", container_height, records);
        }
        records
    }

    async fn apply_contact_flag(&mut self, contact_id: i64, flag: ContactFlag) -> Result<(), ChatError> {
        if let Err(e) = self.source.set_contact_flag(contact_id, flag).await {
            warn!("{:?} failed for contact {}: {}", flag, contact_id, e);
            self.push_notice(NoticeLevel::Error, format!("Could not update contact: {}", e));
            return Err(e.into());
        }
        // Contacts are never patched locally; the fresh list replaces the snapshot
        self.refresh_contacts().await;
        Ok(())
    }

    pub async fn toggle_favorite(&mut self, contact_id: i64) -> Result<(), ChatError> {
        self.apply_contact_flag(contact_id, ContactFlag::ToggleFavorite).await
    }

    pub async fn toggle_block(&mut self, contact_id: i64) -> Result<(), ChatError> {
        self.apply_contact_flag(contact_id, ContactFlag::ToggleBlock).await
    }

    pub async fn set_archived(&mut self, contact_id: i64, archived: bool) -> Result<(), ChatError> {
        let flag = if archived {
            ContactFlag::Archive
        } else {
            ContactFlag::Unarchive
        };
        self.apply_contact_flag(contact_id, flag).await
    }

    // ------------------- Conversation -------------------

    pub fn active_conversation(&self) -> Option<i64> {
        self.conversation.conversation_id()
    }

    pub fn active_contact(&self) -> Option<&Contact> {
        self.active_conversation().and_then(|id| self.contact(id))
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut ConversationState {
        &mut self.conversation
    }

    /// Messages of the active conversation
    pub fn messages(&self) -> &[Message] {
        self.active_conversation()
            .and_then(|id| self.stores.get(&id))
            .map(|store| store.messages())
            .unwrap_or(&[])
    }

    pub fn message_search_results(&self) -> Vec<&Message> {
        self.conversation.matching_messages(self.messages())
    }

    fn active_store_mut(&mut self) -> Result<&mut MessageStore, ChatError> {
        let id = self
            .conversation
            .conversation_id()
            .ok_or(ChatError::NoActiveConversation)?;
        Ok(self.stores.entry(id).or_insert_with(|| MessageStore::new(id)))
    }

    /// Make `conversation_id` active and hand out a ticket for loading its messages.
    ///
    /// Switching drops selection, reply and search state, stops any recording and
    /// cancels pending typing timers of the previous conversation. Stores of
    /// inactive conversations are only kept while they hold unconfirmed sends.
    pub fn switch_to(&mut self, conversation_id: i64) -> LoadTicket {
        if self.conversation.switch_conversation(conversation_id) {
            info!("Switched to conversation {}", conversation_id);
            self.typing_timers.clear();
            self.typing.clear();
            self.recorder.cancel();
            self.stores
                .entry(conversation_id)
                .or_insert_with(|| MessageStore::new(conversation_id));
            self.evict_idle_stores();
        }
        self.begin_load(conversation_id)
    }

    fn evict_idle_stores(&mut self) {
        let active = self.conversation.conversation_id();
        let before = self.stores.len();
        self.stores
            .retain(|id, store| Some(*id) == active || store.has_pending());
        if self.stores.len() < before {
            debug!("Evicted {} idle message stores", before - self.stores.len());
        }
    }

    /// Conversations whose messages are currently held in memory
    pub fn cached_conversations(&self) -> usize {
        self.stores.len()
    }

    pub fn begin_load(&mut self, conversation_id: i64) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            conversation_id,
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.conversation.conversation_id() == Some(ticket.conversation_id)
            && ticket.generation == self.generation
    }

    /// Apply a message load. Late responses for a conversation that is no longer
    /// active, or superseded by a newer load, are discarded.
    pub fn apply_loaded(&mut self, ticket: LoadTicket, result: Result<Vec<Value>, ApiError>) -> bool {
        if !self.is_current(&ticket) {
            debug!(
                "Discarding stale message response for conversation {}",
                ticket.conversation_id
            );
            return false;
        }
        match result {
            Ok(records) => {
                let normalized = normalizer::normalize_messages(&records);
                normalized.log_diagnostics("message");
                self.stores
                    .entry(ticket.conversation_id)
                    .or_insert_with(|| MessageStore::new(ticket.conversation_id))
                    .replace_all(normalized.items);
                true
            }
            Err(e) => {
                warn!("Failed to load messages for {}: {}", ticket.conversation_id, e);
                // Whatever the store already holds stays visible
                self.push_notice(NoticeLevel::Error, format!("Could not load messages: {}", e));
                false
            }
        }
    }

    /// Switch to a conversation and load its messages
    pub async fn select_conversation(&mut self, conversation_id: i64) -> bool {
        let ticket = self.switch_to(conversation_id);
        let result = self.source.fetch_messages(conversation_id).await;
        self.apply_loaded(ticket, result)
    }

    /// Reload the active conversation
    pub async fn refresh_messages(&mut self) -> Result<bool, ChatError> {
        let id = self
            .active_conversation()
            .ok_or(ChatError::NoActiveConversation)?;
        let ticket = self.begin_load(id);
        let result = self.source.fetch_messages(id).await;
        Ok(self.apply_loaded(ticket, result))
    }

    // ------------------- Sending -------------------

    /// Append the draft optimistically and build the request for the server.
    /// The current reply target travels with the message and is cleared.
    pub fn prepare_send(&mut self, draft: MessageDraft) -> Result<PendingSend, ChatError> {
        let conversation_id = self
            .active_conversation()
            .ok_or(ChatError::NoActiveConversation)?;
        let reply_to = self.conversation.take_reply();
        let reply_to_id = reply_to.as_ref().map(|r| r.id);
        let me = self.me.clone();

        let store = self.active_store_mut()?;
        let (local_id, correlation_id) = store.append_optimistic(draft.clone(), &me, reply_to);

        Ok(PendingSend {
            conversation_id,
            local_id,
            outgoing: OutgoingMessage {
                correlation_id,
                content: draft.content,
                reply_to_id,
                forwarded: draft.forwarded,
                kind: draft.kind,
            },
        })
    }

    /// Reconcile the optimistic entry with the server's answer.
    ///
    /// The entry lives in the store of the conversation it was sent to, so the
    /// result lands there even if the user has switched conversations meanwhile.
    /// A message deleted while in flight is deleted on the server once accepted.
    pub async fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<Value, ApiError>,
    ) -> Result<i64, ChatError> {
        let correlation_id = pending.outgoing.correlation_id.clone();
        if self.deleted_in_flight.remove(&correlation_id) {
            return self.discard_deleted_send(pending, result).await;
        }
        let Some(store) = self.stores.get_mut(&pending.conversation_id) else {
            return Err(ChatError::UnknownMessage(pending.local_id));
        };

        match result {
            Ok(record) => {
                let mut normalized = normalizer::normalize_messages(std::slice::from_ref(&record));
                match normalized.items.pop() {
                    Some(confirmed) => {
                        let id = confirmed.id;
                        store.confirm(&correlation_id, confirmed);
                        info!("Message {} confirmed as {}", pending.local_id, id);
                        Ok(id)
                    }
                    None => {
                        warn!("Server accepted message {} but returned no usable record", pending.local_id);
                        store.update_status(pending.local_id, DeliveryStatus::Sent);
                        Ok(pending.local_id)
                    }
                }
            }
            Err(e) => {
                store.fail(&correlation_id);
                self.push_notice(NoticeLevel::Error, format!("Message could not be sent: {}", e));
                Err(e.into())
            }
        }
    }

    async fn discard_deleted_send(
        &mut self,
        pending: PendingSend,
        result: Result<Value, ApiError>,
    ) -> Result<i64, ChatError> {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Deleted message {} was never accepted: {}", pending.local_id, e);
                return Err(e.into());
            }
        };
        let Some(server_id) = record.get("id").and_then(normalizer::coerce_id) else {
            warn!("Server accepted deleted message {} without an id", pending.local_id);
            return Ok(pending.local_id);
        };

        // A refetch may have brought the server copy in meanwhile
        if let Some(store) = self.stores.get_mut(&pending.conversation_id) {
            store.remove(server_id);
        }
        info!("Message {} was deleted while sending, deleting {} remotely", pending.local_id, server_id);
        if let Err(e) = self.source.delete_message(server_id).await {
            warn!("Failed to delete message {} remotely: {}", server_id, e);
            self.push_notice(
                NoticeLevel::Warning,
                format!("Message removed locally but the server delete failed: {}", e),
            );
            return Err(e.into());
        }
        Ok(server_id)
    }

    pub async fn send_message(&mut self, draft: MessageDraft) -> Result<i64, ChatError> {
        let pending = self.prepare_send(draft)?;
        let result = self
            .source
            .send_message(pending.conversation_id, &pending.outgoing)
            .await;
        self.complete_send(pending, result).await
    }

    /// Send a failed message again under its correlation id
    pub async fn retry_send(&mut self, message_id: i64) -> Result<i64, ChatError> {
        let conversation_id = self
            .active_conversation()
            .ok_or(ChatError::NoActiveConversation)?;
        let store = self.active_store_mut()?;
        let message = store
            .retry(message_id)
            .cloned()
            .ok_or(ChatError::UnknownMessage(message_id))?;
        // `retry` always leaves a correlation id on the message
        let Some(correlation_id) = message.correlation_id.clone() else {
            store.update_status(message_id, DeliveryStatus::Failed);
            return Err(ChatError::UnknownMessage(message_id));
        };

        let pending = PendingSend {
            conversation_id,
            local_id: message.id,
            outgoing: OutgoingMessage {
                correlation_id,
                content: message.content,
                reply_to_id: message.reply_to.map(|r| r.id),
                forwarded: message.forwarded,
                kind: message.kind,
            },
        };
        let result = self
            .source
            .send_message(pending.conversation_id, &pending.outgoing)
            .await;
        self.complete_send(pending, result).await
    }

    /// Forward a message from the active conversation into another conversation
    pub async fn forward_message(&mut self, message_id: i64, to_conversation: i64) -> Result<i64, ChatError> {
        let message = self
            .messages()
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or(ChatError::UnknownMessage(message_id))?;
        self.select_conversation(to_conversation).await;
        self.send_message(MessageDraft {
            content: message.content,
            kind: message.kind,
            forwarded: true,
        })
        .await
    }

    // ------------------- Message updates -------------------

    /// Apply a delivery acknowledgement for a message in any visited conversation
    pub fn apply_status_update(&mut self, conversation_id: i64, message_id: i64, status: DeliveryStatus) -> bool {
        self.stores
            .get_mut(&conversation_id)
            .map_or(false, |store| store.update_status(message_id, status))
    }

    /// Mark incoming messages of the active conversation as read
    pub async fn mark_conversation_read(&mut self) -> Result<usize, ChatError> {
        let my_id = self.me.id;
        let unread: Vec<i64> = self
            .messages()
            .iter()
            .filter(|m| m.sender_id != my_id && m.status != Some(DeliveryStatus::Read))
            .map(|m| m.id)
            .collect();

        let mut marked = 0;
        for id in unread {
            match self.source.update_message_status(id, DeliveryStatus::Read).await {
                Ok(()) => {
                    if let Ok(store) = self.active_store_mut() {
                        store.update_status(id, DeliveryStatus::Read);
                    }
                    marked += 1;
                }
                Err(e) => {
                    warn!("Failed to mark message {} as read: {}", id, e);
                    self.push_notice(NoticeLevel::Warning, format!("Could not mark messages as read: {}", e));
                    return Err(e.into());
                }
            }
        }
        Ok(marked)
    }

    /// Delete a message. The local copy goes first; deleting an unknown id is a no-op.
    pub async fn delete_message(&mut self, message_id: i64) -> Result<(), ChatError> {
        let store = self.active_store_mut()?;
        let Some(removed) = store.remove(message_id) else {
            return Ok(());
        };
        self.conversation.deselect(message_id);

        // Messages the server never acknowledged only exist locally. An in-flight
        // send is remembered so its server copy is deleted once it is confirmed.
        if removed.is_pending() {
            if removed.status == Some(DeliveryStatus::Sending) {
                if let Some(correlation_id) = removed.correlation_id {
                    self.deleted_in_flight.insert(correlation_id);
                }
            }
            return Ok(());
        }
        if let Err(e) = self.source.delete_message(message_id).await {
            warn!("Failed to delete message {} remotely: {}", message_id, e);
            self.push_notice(
                NoticeLevel::Warning,
                format!("Message removed locally but the server delete failed: {}", e),
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete every selected message and leave selection mode. Returns the number of failures.
    pub async fn delete_selected(&mut self) -> usize {
        let selected: Vec<i64> = self.conversation.selected_messages().iter().copied().collect();
        let mut failures = 0;
        for id in selected {
            if self.delete_message(id).await.is_err() {
                failures += 1;
            }
        }
        self.conversation.exit_selection_mode();
        failures
    }

    /// Copy the selected messages' text to the clipboard, oldest first
    pub fn copy_selected(&mut self, clipboard: &dyn Clipboard) -> Result<usize, ChatError> {
        let selected = self.conversation.selected_messages();
        let texts: Vec<&str> = self
            .messages()
            .iter()
            .filter(|m| selected.contains(&m.id))
            .map(|m| m.content.as_str())
            .collect();
        let count = texts.len();
        let joined = texts.join("\n");

        if let Err(e) = clipboard.write_text(&joined) {
            warn!("Clipboard write failed: {}", e);
            self.push_notice(NoticeLevel::Warning, "Could not copy messages".to_string());
            return Err(ChatError::Clipboard(e.to_string()));
        }
        self.conversation.exit_selection_mode();
        Ok(count)
    }

    // ------------------- Typing & recording -------------------

    /// Record a typing notification. Events for other conversations are ignored.
    pub fn on_typing_event(&mut self, event: TypingEvent) -> bool {
        if self.active_conversation() != Some(event.contact_id) {
            debug!("Ignoring typing event for inactive conversation {}", event.contact_id);
            return false;
        }
        self.typing.update(event.contact_id, event.status, chrono::Utc::now());
        true
    }

    /// Show the contact as typing after `delay`; cancelled if the conversation changes
    pub fn schedule_typing(&mut self, tx: mpsc::Sender<TypingEvent>, status: TypingStatus, delay: Duration) -> Result<(), ChatError> {
        let contact_id = self
            .active_conversation()
            .ok_or(ChatError::NoActiveConversation)?;
        self.typing_timers.retain(|t| t.is_pending());
        self.typing_timers
            .push(TypingTimer::schedule(tx, TypingEvent { contact_id, status }, delay));
        Ok(())
    }

    pub fn pending_typing_timers(&self) -> usize {
        self.typing_timers.iter().filter(|t| t.is_pending()).count()
    }

    pub fn is_contact_typing(&self, contact_id: i64) -> bool {
        self.typing.is_typing(contact_id, chrono::Utc::now())
    }

    pub fn recorder(&self) -> &VoiceRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut VoiceRecorder {
        &mut self.recorder
    }

    /// Start a voice recording; a denied microphone becomes a notice
    pub async fn start_recording(&mut self, devices: &dyn MediaDevices) -> Result<(), ChatError> {
        if self.active_conversation().is_none() {
            return Err(ChatError::NoActiveConversation);
        }
        if let Err(e) = self.recorder.start(devices).await {
            self.push_notice(
                NoticeLevel::Warning,
                "Microphone access was denied, recording cancelled".to_string(),
            );
            return Err(e);
        }
        Ok(())
    }

    /// Stop recording and send the clip uploaded at `url`
    pub async fn finish_recording(&mut self, url: &str) -> Result<Option<i64>, ChatError> {
        match self.recorder.stop(url) {
            Some(draft) => self.send_message(draft).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticSource;

    #[async_trait]
    impl ChatDataSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
            Ok(vec![
                json!({"id": 1, "name": "Bob", "status": "offline"}),
                json!({"id": 2, "name": "Amy", "status": "online", "unreadCount": 3}),
                json!({"id": "x", "name": "Broken"}),
            ])
        }

        async fn fetch_messages(&self, conversation_id: i64) -> Result<Vec<Value>, ApiError> {
            Ok(vec![json!({"id": conversation_id * 100, "senderId": conversation_id, "content": "hello"})])
        }

        async fn send_message(&self, _conversation_id: i64, message: &OutgoingMessage) -> Result<Value, ApiError> {
            Ok(json!({"id": 900, "senderId": 1, "content": message.content, "clientId": message.correlation_id}))
        }

        async fn update_message_status(&self, _id: i64, _status: DeliveryStatus) -> Result<(), ApiError> {
            Ok(())
        }

        async fn delete_message(&self, _id: i64) -> Result<(), ApiError> {
            Ok(())
        }

        async fn set_contact_flag(&self, _id: i64, _flag: ContactFlag) -> Result<(), ApiError> {
            Err(ApiError::Unsupported("static"))
        }
    }

    fn context() -> ChatContext {
        ChatContext::new(
            Arc::new(StaticSource),
            CurrentUser {
                id: 1,
                name: "Me".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_refresh_counts_dropped_records() {
        let mut ctx = context();
        assert!(ctx.refresh_contacts().await);
        assert_eq!(ctx.contacts().len(), 2);
        assert_eq!(ctx.dropped_contacts(), 1);

        let page = ctx.visible_contacts().page;
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Bob"]);
    }

    #[tokio::test]
    async fn test_send_requires_conversation() {
        let mut ctx = context();
        let result = ctx.send_message(MessageDraft::text("hi")).await;
        assert!(matches!(result, Err(ChatError::NoActiveConversation)));
    }

    #[tokio::test]
    async fn test_late_load_for_old_conversation_is_ignored() {
        let mut ctx = context();
        let first = ctx.switch_to(1);
        let second = ctx.switch_to(2);

        assert!(ctx.apply_loaded(second, Ok(vec![json!({"id": 20, "content": "for two"})])));
        assert!(!ctx.apply_loaded(first, Ok(vec![json!({"id": 10, "content": "for one"})])));

        let ids: Vec<i64> = ctx.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![20]);
    }

    #[tokio::test]
    async fn test_flag_failure_surfaces_notice() {
        let mut ctx = context();
        let result = ctx.toggle_favorite(1).await;
        assert!(result.is_err());
        assert_eq!(ctx.notices().len(), 1);
        let id = ctx.notices()[0].id;
        ctx.dismiss_notice(id);
        assert!(ctx.notices().is_empty());
    }
}
