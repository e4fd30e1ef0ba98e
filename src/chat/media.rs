// Capability boundary towards the host platform: microphone access for voice
// messages and clipboard writes. A denied permission aborts the action and is
// reported as a recoverable error.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};

use super::ChatError;
use crate::models::{MessageDraft, MessageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn request_microphone(&self) -> PermissionOutcome;
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording {
        elapsed_secs: u32,
    },
}

/// Voice message recorder driven by a one-second tick
#[derive(Debug, Default)]
pub struct VoiceRecorder {
    state: RecorderState,
}

impl VoiceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    /// Ask for the microphone and start recording.
    ///
    /// A denied permission leaves the recorder idle; there is no retry.
    pub async fn start(&mut self, devices: &dyn MediaDevices) -> Result<(), ChatError> {
        if self.is_recording() {
            return Ok(());
        }
        match devices.request_microphone().await {
            PermissionOutcome::Granted => {
                info!("Voice recording started");
                self.state = RecorderState::Recording { elapsed_secs: 0 };
                Ok(())
            }
            PermissionOutcome::Denied => {
                warn!("Microphone permission denied");
                Err(ChatError::PermissionDenied("microphone".to_string()))
            }
        }
    }

    /// Advance the recording clock by one second
    pub fn tick(&mut self) -> Option<u32> {
        match &mut self.state {
            RecorderState::Recording { elapsed_secs } => {
                *elapsed_secs += 1;
                Some(*elapsed_secs)
            }
            RecorderState::Idle => None,
        }
    }

    /// Stop recording and turn the uploaded clip into a draft
    pub fn stop(&mut self, url: &str) -> Option<MessageDraft> {
        let RecorderState::Recording { elapsed_secs } = std::mem::take(&mut self.state) else {
            return None;
        };
        debug!("Voice recording stopped after {}s", elapsed_secs);
        Some(MessageDraft {
            content: String::new(),
            kind: MessageKind::Audio {
                url: url.to_string(),
                duration_secs: elapsed_secs,
            },
            forwarded: false,
        })
    }

    pub fn cancel(&mut self) {
        if self.is_recording() {
            debug!("Voice recording cancelled");
        }
        self.state = RecorderState::Idle;
    }
}
