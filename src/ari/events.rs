use crate::event::ChannelEvent;
use serde::Deserialize;

/// Wire model of an ARI WebSocket event, tagged by its `type` field.
///
/// Only the events the IVR core reacts to are modelled; everything else
/// deserializes to [`AriEvent::Other`] and is dropped by the event pump.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AriEvent {
    StasisStart { channel: AriChannel },
    StasisEnd { channel: AriChannel },
    ChannelDtmfReceived { channel: AriChannel, digit: String },
    PlaybackFinished { playback: AriPlayback },
    ChannelDestroyed { channel: AriChannel },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AriChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub caller: Option<AriCallerId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AriCallerId {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AriPlayback {
    pub id: String,
    #[serde(default)]
    pub target_uri: Option<String>,
}

impl AriEvent {
    /// Map the wire event into the in-process [`ChannelEvent`].
    ///
    /// `ChannelDestroyed` folds into `StasisEnd`: for the session both mean
    /// the channel is gone and no further primitive may act on it.
    pub fn into_channel_event(self) -> Option<ChannelEvent> {
        match self {
            AriEvent::StasisStart { channel } => {
                Some(ChannelEvent::StasisStart { channel: channel.id })
            }
            AriEvent::StasisEnd { channel } | AriEvent::ChannelDestroyed { channel } => {
                Some(ChannelEvent::StasisEnd { channel: channel.id })
            }
            AriEvent::ChannelDtmfReceived { channel, digit } => Some(ChannelEvent::Dtmf {
                channel: channel.id,
                digit,
            }),
            AriEvent::PlaybackFinished { playback } => Some(ChannelEvent::PlaybackFinished {
                playback_id: playback.id,
            }),
            AriEvent::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stasis_start() {
        let json = r#"{
            "type": "StasisStart",
            "application": "handyline",
            "args": [],
            "channel": {
                "id": "1718900000.42",
                "name": "PJSIP/provider-00000001",
                "caller": { "name": "", "number": "0521234567" }
            }
        }"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        match event.into_channel_event() {
            Some(ChannelEvent::StasisStart { channel }) => assert_eq!(channel, "1718900000.42"),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_parse_dtmf() {
        let json = r#"{
            "type": "ChannelDtmfReceived",
            "digit": "2",
            "duration_ms": 120,
            "channel": { "id": "1718900000.42" }
        }"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        match event.into_channel_event() {
            Some(ChannelEvent::Dtmf { channel, digit }) => {
                assert_eq!(channel, "1718900000.42");
                assert_eq!(digit, "2");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_parse_playback_finished() {
        let json = r#"{
            "type": "PlaybackFinished",
            "playback": {
                "id": "5c4c1bfb-90cf-4b16-8e9a-88e25f6e1c31",
                "target_uri": "channel:1718900000.42",
                "media_uri": "sound:custom/he/district",
                "state": "done"
            }
        }"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        match event.into_channel_event() {
            Some(ChannelEvent::PlaybackFinished { playback_id }) => {
                assert_eq!(playback_id, "5c4c1bfb-90cf-4b16-8e9a-88e25f6e1c31");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_channel_destroyed_folds_into_stasis_end() {
        let json = r#"{ "type": "ChannelDestroyed", "cause": 16, "channel": { "id": "x.1" } }"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event.into_channel_event(),
            Some(ChannelEvent::StasisEnd { .. })
        ));
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let json = r#"{ "type": "ChannelVarset", "variable": "X", "value": "1" }"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        assert!(event.into_channel_event().is_none());
    }
}
