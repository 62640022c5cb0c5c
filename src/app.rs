use crate::ari::{AriClient, Telephony};
use crate::config::Config;
use crate::event::{ChannelEvent, EventReceiver};
use crate::ivr::session::IvrSession;
use crate::lookup::{HttpWorkerLookup, WorkerLookup};
use crate::ChannelId;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub telephony: Arc<dyn Telephony>,
    pub lookup: Arc<dyn WorkerLookup>,
    pub token: CancellationToken,
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateBuilder {
    pub config: Option<Config>,
    pub telephony: Option<Arc<dyn Telephony>>,
    pub lookup: Option<Arc<dyn WorkerLookup>>,
    pub token: Option<CancellationToken>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            telephony: None,
            lookup: None,
            token: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn telephony(mut self, telephony: Arc<dyn Telephony>) -> Self {
        self.telephony = Some(telephony);
        self
    }

    pub fn lookup(mut self, lookup: Arc<dyn WorkerLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the state, connecting the real ARI client and lookup backend
    /// for any collaborator not injected.
    pub async fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        let token = self.token.unwrap_or_default();

        let telephony: Arc<dyn Telephony> = match self.telephony {
            Some(telephony) => telephony,
            None => Arc::new(AriClient::connect(config.ari.clone(), token.child_token()).await?),
        };
        let lookup: Arc<dyn WorkerLookup> = match self.lookup {
            Some(lookup) => lookup,
            None => Arc::new(HttpWorkerLookup::new(config.lookup.url.clone())),
        };

        Ok(Arc::new(AppStateInner {
            config,
            telephony,
            lookup,
            token,
        }))
    }
}

impl AppStateInner {
    /// Dispatch inbound calls until cancelled or the event stream closes.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        let events = self.telephony.subscribe();
        self.dispatch(events).await
    }

    /// Like [`run`](Self::run), with the entry subscription supplied by the
    /// caller so tests can subscribe before injecting events.
    pub async fn dispatch(self: &Arc<Self>, mut events: EventReceiver) -> Result<()> {
        loop {
            select! {
                _ = self.token.cancelled() => {
                    info!("entry point cancelled");
                    return Ok(());
                }
                event = events.recv() => match event {
                    Ok(ChannelEvent::StasisStart { channel }) => {
                        info!(channel = %channel, "inbound call");
                        // Subscribe for the session before it answers, so a
                        // digit pressed during a prompt is buffered for the
                        // next collection rather than lost.
                        let session_events = self.telephony.subscribe();
                        let state = self.clone();
                        tokio::spawn(async move {
                            state.serve_call(channel, session_events).await;
                        });
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "entry point lagged on event stream");
                    }
                    Err(RecvError::Closed) => {
                        warn!("event stream closed, stopping dispatch");
                        return Err(anyhow!("event stream closed"));
                    }
                }
            }
        }
    }

    /// Top-level session handler — the single place in-session failures are
    /// recovered. Logs the error, then force-terminates the channel through
    /// the session's idempotent best-effort hangup. Never re-raises, never
    /// retries; one call's failure cannot touch another session.
    async fn serve_call(&self, channel: ChannelId, mut events: EventReceiver) {
        let mut session = IvrSession::new(channel);
        let outcome = session
            .run_dialogue(
                self.telephony.as_ref(),
                self.lookup.as_ref(),
                &mut events,
                &self.config.ivr,
            )
            .await;
        match &outcome {
            Ok(()) => info!(channel = %session.channel(), "ivr session completed"),
            Err(e) => warn!(channel = %session.channel(), "ivr session aborted: {:#}", e),
        }
        session.hangup(self.telephony.as_ref()).await;
    }
}
