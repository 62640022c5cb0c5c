use super::events::AriEvent;
use crate::config::AriConfig;
use crate::event::{ChannelEvent, EventReceiver, EventSender};
use crate::ChannelId;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// High-level API for controlling calls on the telephony platform.
///
/// The two asynchronous primitives the orchestrator composes live here:
/// [`play`](Telephony::play) resolves once the platform reports the playback
/// finished, and [`subscribe`](Telephony::subscribe) feeds the digit
/// collection in [`crate::ivr::collect`]. The connection object is passed
/// into the entry point explicitly; nothing in the crate holds it as a
/// process-wide global.
#[async_trait]
pub trait Telephony: Send + Sync {
    /// Answer an inbound channel.
    async fn answer(&self, channel: &ChannelId) -> Result<()>;

    /// Play a named sound resource and wait until playback finishes.
    ///
    /// Fails immediately if initiating the playback errors, and fails while
    /// pending if the channel leaves the application mid-playback.
    async fn play(&self, channel: &ChannelId, sound: &str) -> Result<()>;

    /// Tear the channel down. Callers treat this as best-effort.
    async fn hangup(&self, channel: &ChannelId) -> Result<()>;

    /// Subscribe to the platform's signaling events.
    fn subscribe(&self) -> EventReceiver;
}

/// Telephony implementation over the Asterisk REST Interface.
pub struct AriClient {
    config: AriConfig,
    http: reqwest::Client,
    events: EventSender,
}

impl AriClient {
    /// Connect the event WebSocket and start the event pump.
    ///
    /// Connecting with the `app` query parameter is what registers the
    /// Stasis application on the platform; inbound-call events are only
    /// delivered after this. A connection failure here is fatal to startup,
    /// there is no retry or reconnect.
    pub async fn connect(config: AriConfig, token: CancellationToken) -> Result<Self> {
        let ws_url = events_url(&config)?;
        let (stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| anyhow!("ari: failed to connect event socket: {}", e))?;
        info!("ari: registered stasis application {}", config.app);

        let (events, _) = broadcast::channel(64);
        let sender = events.clone();
        tokio::spawn(async move {
            Self::pump_events(stream, sender, token).await;
        });

        Ok(Self {
            config,
            http: reqwest::Client::new(),
            events,
        })
    }

    async fn pump_events(mut stream: WsStream, sender: EventSender, token: CancellationToken) {
        loop {
            select! {
                _ = token.cancelled() => {
                    debug!("ari: event pump cancelled");
                    break;
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<AriEvent>(&text) {
                            Ok(event) => {
                                if let Some(mapped) = event.into_channel_event() {
                                    debug!(channel = ?mapped.channel(), "ari: event {:?}", mapped);
                                    let _ = sender.send(mapped);
                                }
                            }
                            Err(e) => debug!("ari: unrecognized event: {}", e),
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("ari: event socket error: {}", e);
                        break;
                    }
                    None => {
                        warn!("ari: event socket closed");
                        break;
                    }
                }
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/ari/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str) -> Result<()> {
        let url = self.endpoint(path);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| anyhow!("ari: request failed: {} {}", path, e))?;
        if !resp.status().is_success() {
            return Err(anyhow!("ari: {} returned {}", path, resp.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Telephony for AriClient {
    async fn answer(&self, channel: &ChannelId) -> Result<()> {
        self.post(&format!("channels/{}/answer", channel)).await
    }

    async fn play(&self, channel: &ChannelId, sound: &str) -> Result<()> {
        let playback_id = Uuid::new_v4().to_string();
        // Subscribe before posting so the finished event cannot be missed.
        let mut events = self.events.subscribe();
        self.post(&format!(
            "channels/{}/play?media=sound:{}&playbackId={}",
            channel,
            urlencoding::encode(sound),
            playback_id
        ))
        .await?;

        loop {
            match events.recv().await {
                Ok(ChannelEvent::PlaybackFinished { playback_id: id }) if id == playback_id => {
                    return Ok(());
                }
                Ok(ChannelEvent::StasisEnd { channel: gone }) if gone == *channel => {
                    return Err(anyhow!(
                        "ari: channel {} gone during playback of {}",
                        channel,
                        sound
                    ));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "ari: receiver lagged while awaiting playback");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow!("ari: event stream closed during playback"));
                }
            }
        }
    }

    async fn hangup(&self, channel: &ChannelId) -> Result<()> {
        let url = self.endpoint(&format!("channels/{}", channel));
        let resp = self
            .http
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| anyhow!("ari: hangup request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(anyhow!("ari: hangup returned {}", resp.status()));
        }
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

fn events_url(config: &AriConfig) -> Result<Url> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| anyhow!("ari: invalid url {}: {}", config.url, e))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("ari: cannot derive websocket scheme from {}", config.url))?;
    url.set_path("/ari/events");
    url.set_query(Some(&format!(
        "app={}&api_key={}:{}",
        urlencoding::encode(&config.app),
        urlencoding::encode(&config.username),
        urlencoding::encode(&config.password)
    )));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_url() {
        let config = AriConfig {
            url: "http://pbx.example.com:8088".to_string(),
            username: "ari user".to_string(),
            password: "s3cret".to_string(),
            app: "handyline".to_string(),
        };
        let url = events_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://pbx.example.com:8088/ari/events?app=handyline&api_key=ari%20user:s3cret"
        );
    }

    #[test]
    fn test_events_url_tls() {
        let config = AriConfig {
            url: "https://pbx.example.com".to_string(),
            ..AriConfig::default()
        };
        let url = events_url(&config).unwrap();
        assert!(url.as_str().starts_with("wss://"));
    }
}
