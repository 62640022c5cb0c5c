use crate::ChannelId;
use serde::{Deserialize, Serialize};

/// ChannelEvent represents the signaling events a call session reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelEvent {
    /// An inbound channel entered the application
    #[serde(rename = "stasis_start")]
    StasisStart { channel: ChannelId },

    /// A DTMF digit was pressed on a channel
    #[serde(rename = "dtmf")]
    Dtmf { channel: ChannelId, digit: String },

    /// A playback finished on the platform
    #[serde(rename = "playback_finished")]
    PlaybackFinished { playback_id: String },

    /// A channel left the application or was destroyed
    #[serde(rename = "stasis_end")]
    StasisEnd { channel: ChannelId },
}

impl ChannelEvent {
    pub fn channel(&self) -> Option<&str> {
        match self {
            ChannelEvent::StasisStart { channel } => Some(channel),
            ChannelEvent::Dtmf { channel, .. } => Some(channel),
            ChannelEvent::PlaybackFinished { .. } => None,
            ChannelEvent::StasisEnd { channel } => Some(channel),
        }
    }
}

/// Type alias for the event sender
pub type EventSender = tokio::sync::broadcast::Sender<ChannelEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::broadcast::Receiver<ChannelEvent>;
