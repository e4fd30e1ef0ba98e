// Typing indicators for the chat view
//
// Incoming typing notifications are kept per contact with the time they arrived and
// expire on their own. Delayed notifications (e.g. the simulated "is typing" shown
// after sending) run on a TypingTimer, which is aborted when dropped so it can never
// fire into a conversation that is no longer open.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingStatus {
    Active,    // User is looking at the conversation
    Composing, // User is composing a message
    Paused,    // User started composing but paused
    Inactive,  // User has not been active recently
    Gone,      // User left the conversation
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypingEvent {
    pub contact_id: i64,
    pub status: TypingStatus,
}

#[derive(Debug, Clone)]
pub struct TypingTracker {
    states: HashMap<i64, (TypingStatus, DateTime<Utc>)>,
    timeout: chrono::Duration,
}

impl Default for TypingTracker {
    fn default() -> Self {
        TypingTracker::new(chrono::Duration::seconds(6))
    }
}

impl TypingTracker {
    pub fn new(timeout: chrono::Duration) -> Self {
        TypingTracker {
            states: HashMap::new(),
            timeout,
        }
    }

    pub fn update(&mut self, contact_id: i64, status: TypingStatus, at: DateTime<Utc>) {
        match status {
            TypingStatus::Gone => {
                self.states.remove(&contact_id);
            }
            _ => {
                self.states.insert(contact_id, (status, at));
            }
        }
    }

    pub fn status(&self, contact_id: i64) -> Option<TypingStatus> {
        self.states.get(&contact_id).map(|(status, _)| *status)
    }

    /// Whether the contact is composing and the notification has not expired
    pub fn is_typing(&self, contact_id: i64, now: DateTime<Utc>) -> bool {
        matches!(
            self.states.get(&contact_id),
            Some((TypingStatus::Composing, at)) if now - *at < self.timeout
        )
    }

    pub fn typing_contacts(&self, now: DateTime<Utc>) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .states
            .keys()
            .copied()
            .filter(|id| self.is_typing(*id, now))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop notifications older than the timeout
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let timeout = self.timeout;
        self.states.retain(|_, (_, at)| now - *at < timeout);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// A delayed typing notification that can be cancelled
#[derive(Debug)]
pub struct TypingTimer {
    handle: Option<JoinHandle<()>>,
}

impl TypingTimer {
    /// Deliver `event` on `tx` after `delay`. Must be called inside a tokio runtime.
    pub fn schedule(tx: mpsc::Sender<TypingEvent>, event: TypingEvent, delay: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(event).await {
                debug!("Typing event for {} dropped: {}", event.contact_id, e);
            }
        });
        TypingTimer {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for TypingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_expires() {
        let mut tracker = TypingTracker::new(chrono::Duration::seconds(5));
        let t0 = Utc::now();
        tracker.update(3, TypingStatus::Composing, t0);

        assert!(tracker.is_typing(3, t0 + chrono::Duration::seconds(4)));
        assert!(!tracker.is_typing(3, t0 + chrono::Duration::seconds(5)));
        assert_eq!(tracker.typing_contacts(t0), vec![3]);

        tracker.prune(t0 + chrono::Duration::seconds(10));
        assert_eq!(tracker.status(3), None);
    }

    #[test]
    fn test_paused_and_gone() {
        let mut tracker = TypingTracker::default();
        let now = Utc::now();
        tracker.update(1, TypingStatus::Paused, now);
        assert!(!tracker.is_typing(1, now));
        assert_eq!(tracker.status(1), Some(TypingStatus::Paused));

        tracker.update(1, TypingStatus::Gone, now);
        assert_eq!(tracker.status(1), None);
    }

    #[tokio::test]
    async fn test_timer_fires() {
        let (tx, mut rx) = mpsc::channel(4);
        let event = TypingEvent {
            contact_id: 9,
            status: TypingStatus::Composing,
        };
        let _timer = TypingTimer::schedule(tx, event, Duration::from_millis(10));

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(received, Some(event));
    }

    #[tokio::test]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::channel(4);
        let event = TypingEvent {
            contact_id: 9,
            status: TypingStatus::Composing,
        };
        let timer = TypingTimer::schedule(tx, event, Duration::from_millis(200));
        assert!(timer.is_pending());
        drop(timer);

        // The aborted task drops the only sender, closing the channel without an event
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(received, None);
    }
}
