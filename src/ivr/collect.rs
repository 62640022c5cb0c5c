use crate::event::{ChannelEvent, EventReceiver};
use crate::ChannelId;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, Instant};
use tracing::warn;

/// Error returned by [`collect_digit`].
///
/// Timeout is an expected outcome of a collection and stays distinguishable
/// from a platform-level failure, even though the orchestrator aborts the
/// session on both.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no digit received within {0:?}")]
    Timeout(Duration),
    #[error("channel left the application while waiting for a digit")]
    ChannelGone,
    #[error("event stream closed while waiting for a digit")]
    EventStreamClosed,
}

/// Wait for the next DTMF digit on `channel`, bounded by `window`.
///
/// Races the deadline against the session's event subscription; awaiting a
/// single future guarantees exactly one of digit/timeout resolves, and
/// cleanup on either path is dropping the timer future. Events belonging to
/// other channels are skipped without resetting the window, so the total
/// wait never exceeds `window`.
pub async fn collect_digit(
    events: &mut EventReceiver,
    channel: &ChannelId,
    window: Duration,
) -> Result<String, CollectError> {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CollectError::Timeout(window));
        }
        match timeout(remaining, events.recv()).await {
            Ok(Ok(ChannelEvent::Dtmf { channel: from, digit })) if from == *channel => {
                return Ok(digit);
            }
            Ok(Ok(ChannelEvent::StasisEnd { channel: from })) if from == *channel => {
                return Err(CollectError::ChannelGone);
            }
            Ok(Ok(_)) => {}
            Ok(Err(RecvError::Lagged(missed))) => {
                warn!(channel = %channel, missed, "event receiver lagged during digit collection");
            }
            Ok(Err(RecvError::Closed)) => return Err(CollectError::EventStreamClosed),
            Err(_) => return Err(CollectError::Timeout(window)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    fn chan() -> (crate::event::EventSender, EventReceiver) {
        broadcast::channel(16)
    }

    #[tokio::test]
    async fn test_digit_resolves() {
        let (tx, mut rx) = chan();
        tx.send(ChannelEvent::Dtmf {
            channel: "c1".into(),
            digit: "7".into(),
        })
        .unwrap();
        let digit = collect_digit(&mut rx, &"c1".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(digit, "7");
    }

    #[tokio::test]
    async fn test_other_channel_skipped() {
        let (tx, mut rx) = chan();
        tx.send(ChannelEvent::Dtmf {
            channel: "c2".into(),
            digit: "9".into(),
        })
        .unwrap();
        tx.send(ChannelEvent::PlaybackFinished {
            playback_id: "p1".into(),
        })
        .unwrap();
        tx.send(ChannelEvent::Dtmf {
            channel: "c1".into(),
            digit: "3".into(),
        })
        .unwrap();
        let digit = collect_digit(&mut rx, &"c1".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(digit, "3");
    }

    #[tokio::test]
    async fn test_timeout() {
        let (_tx, mut rx) = chan();
        let err = collect_digit(&mut rx, &"c1".to_string(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_channel_gone() {
        let (tx, mut rx) = chan();
        tx.send(ChannelEvent::StasisEnd {
            channel: "c1".into(),
        })
        .unwrap();
        let err = collect_digit(&mut rx, &"c1".to_string(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::ChannelGone));
    }

    #[tokio::test]
    async fn test_stream_closed() {
        let (tx, mut rx) = chan();
        drop(tx);
        let err = collect_digit(&mut rx, &"c1".to_string(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::EventStreamClosed));
    }

    #[tokio::test]
    async fn test_buffered_digit_is_picked_up() {
        // A digit pressed before collection starts (e.g. during prompt
        // playback) sits in the subscription and resolves immediately.
        let (tx, mut rx) = chan();
        tx.send(ChannelEvent::Dtmf {
            channel: "c1".into(),
            digit: "5".into(),
        })
        .unwrap();
        let started = Instant::now();
        let digit = collect_digit(&mut rx, &"c1".to_string(), Duration::from_secs(8))
            .await
            .unwrap();
        assert_eq!(digit, "5");
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
