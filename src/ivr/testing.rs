//! Test harness for the IVR flow.
//!
//! Provides [`IvrStack`]: a fully assembled in-memory stack that runs the
//! real entry point and orchestrator against a [`FakeTelephony`] and a
//! canned [`StaticLookup`] — no PBX, no backend.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let mut stack = IvrStack::start(StaticLookup::with_matches(vec![])).await;
//! stack.call("chan-1");
//! stack.expect_answer("chan-1").await;
//! stack.expect_play("chan-1", "custom/language").await;
//! stack.dtmf("chan-1", "2");
//! stack.expect_play("chan-1", "custom/en/district").await;
//! ```

use crate::app::AppStateBuilder;
use crate::ari::Telephony;
use crate::config::Config;
use crate::event::{ChannelEvent, EventReceiver, EventSender};
use crate::lookup::{WorkerFilter, WorkerLookup, WorkerMatch};
use crate::ChannelId;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// One observed primitive invocation, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(ChannelId),
    Play(ChannelId, String),
    Hangup(ChannelId),
}

impl Command {
    pub fn channel(&self) -> &str {
        match self {
            Command::Answer(c) | Command::Play(c, _) | Command::Hangup(c) => c,
        }
    }
}

/// In-memory [`Telephony`]: records every invocation on an observable
/// command channel, completes playbacks immediately, and lets the test
/// inject signaling events through the shared broadcast sender.
pub struct FakeTelephony {
    events: EventSender,
    cmd_tx: mpsc::UnboundedSender<Command>,
    fail_answer: AtomicBool,
    fail_play: AtomicBool,
    fail_hangup: AtomicBool,
}

impl FakeTelephony {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Command>) {
        let (events, _) = broadcast::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events,
                cmd_tx,
                fail_answer: AtomicBool::new(false),
                fail_play: AtomicBool::new(false),
                fail_hangup: AtomicBool::new(false),
            }),
            cmd_rx,
        )
    }

    /// Make every subsequent answer fail at initiation.
    pub fn refuse_answer(&self) {
        self.fail_answer.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent playback fail at initiation.
    pub fn refuse_play(&self) {
        self.fail_play.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent hangup fail.
    pub fn refuse_hangup(&self) {
        self.fail_hangup.store(true, Ordering::SeqCst);
    }

    // ── Event injection ──────────────────────────────────────────────

    pub fn stasis_start(&self, channel: &str) {
        let _ = self.events.send(ChannelEvent::StasisStart {
            channel: channel.to_string(),
        });
    }

    pub fn dtmf(&self, channel: &str, digit: &str) {
        let _ = self.events.send(ChannelEvent::Dtmf {
            channel: channel.to_string(),
            digit: digit.to_string(),
        });
    }

    pub fn stasis_end(&self, channel: &str) {
        let _ = self.events.send(ChannelEvent::StasisEnd {
            channel: channel.to_string(),
        });
    }
}

#[async_trait]
impl Telephony for FakeTelephony {
    async fn answer(&self, channel: &ChannelId) -> Result<()> {
        let _ = self.cmd_tx.send(Command::Answer(channel.clone()));
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(anyhow!("fake: answer rejected"));
        }
        Ok(())
    }

    async fn play(&self, channel: &ChannelId, sound: &str) -> Result<()> {
        let _ = self
            .cmd_tx
            .send(Command::Play(channel.clone(), sound.to_string()));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(anyhow!("fake: playback rejected"));
        }
        // Playback completes immediately; digits pressed "during" a prompt
        // are injected by the test before the next collection starts and
        // sit buffered in the session's subscription.
        Ok(())
    }

    async fn hangup(&self, channel: &ChannelId) -> Result<()> {
        let _ = self.cmd_tx.send(Command::Hangup(channel.clone()));
        if self.fail_hangup.load(Ordering::SeqCst) {
            return Err(anyhow!("fake: hangup rejected"));
        }
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

/// Canned [`WorkerLookup`] that records every filter it was asked for.
pub struct StaticLookup {
    matches: Vec<WorkerMatch>,
    fail: bool,
    seen: Mutex<Vec<WorkerFilter>>,
}

impl StaticLookup {
    pub fn with_matches(matches: Vec<WorkerMatch>) -> Arc<Self> {
        Arc::new(Self {
            matches,
            fail: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// A collaborator that violates its never-fails contract.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            matches: Vec::new(),
            fail: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen_filters(&self) -> Vec<WorkerFilter> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerLookup for StaticLookup {
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<WorkerMatch>> {
        self.seen.lock().unwrap().push(filter.clone());
        if self.fail {
            return Err(anyhow!("fake: lookup backend unreachable"));
        }
        Ok(self.matches.clone())
    }
}

pub fn worker(name: &str, phone: &str) -> WorkerMatch {
    WorkerMatch {
        name: name.to_string(),
        phone: phone.to_string(),
    }
}

/// Config with a digit window short enough for tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.ivr.digit_timeout_ms = 200;
    config
}

/// Fully assembled in-memory IVR stack running the real entry point.
pub struct IvrStack {
    pub telephony: Arc<FakeTelephony>,
    pub lookup: Arc<StaticLookup>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    run_handle: tokio::task::JoinHandle<Result<()>>,
}

impl IvrStack {
    pub async fn start(lookup: Arc<StaticLookup>) -> Self {
        Self::start_with_config(test_config(), lookup).await
    }

    pub async fn start_with_config(config: Config, lookup: Arc<StaticLookup>) -> Self {
        let (telephony, cmd_rx) = FakeTelephony::new();
        let cancel = CancellationToken::new();
        let state = AppStateBuilder::new()
            .config(config)
            .telephony(telephony.clone())
            .lookup(lookup.clone())
            .token(cancel.child_token())
            .build()
            .await
            .expect("build in-memory app state");

        // Subscribe before spawning so no injected event can be missed.
        let entry_events = state.telephony.subscribe();
        let dispatch_state = state.clone();
        let run_handle = tokio::spawn(async move { dispatch_state.dispatch(entry_events).await });

        Self {
            telephony,
            lookup,
            cmd_rx,
            cancel,
            run_handle,
        }
    }

    // ── Event injection ──────────────────────────────────────────────

    /// Inject an inbound call.
    pub fn call(&self, channel: &str) {
        self.telephony.stasis_start(channel);
    }

    pub fn dtmf(&self, channel: &str, digit: &str) {
        self.telephony.dtmf(channel, digit);
    }

    pub fn stasis_end(&self, channel: &str) {
        self.telephony.stasis_end(channel);
    }

    // ── Command observation ──────────────────────────────────────────

    /// Wait up to `timeout_ms` for the next recorded primitive invocation.
    pub async fn next_cmd(&mut self, timeout_ms: u64) -> Option<Command> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.cmd_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Assert the next command equals `expected`.
    ///
    /// # Panics
    /// If nothing arrives within a second or the command differs.
    pub async fn expect_cmd(&mut self, expected: Command) {
        let cmd = self
            .next_cmd(1000)
            .await
            .unwrap_or_else(|| panic!("timed out waiting for {:?}", expected));
        assert_eq!(cmd, expected);
    }

    pub async fn expect_answer(&mut self, channel: &str) {
        self.expect_cmd(Command::Answer(channel.to_string())).await;
    }

    pub async fn expect_play(&mut self, channel: &str, sound: &str) {
        self.expect_cmd(Command::Play(channel.to_string(), sound.to_string()))
            .await;
    }

    pub async fn expect_hangup(&mut self, channel: &str) {
        self.expect_cmd(Command::Hangup(channel.to_string())).await;
    }

    /// Assert no command is recorded within `timeout_ms`.
    pub async fn expect_quiet(&mut self, timeout_ms: u64) {
        if let Some(cmd) = self.next_cmd(timeout_ms).await {
            panic!("expected no further commands, got {:?}", cmd);
        }
    }

    /// Drain commands until the stack stays quiet for `quiet_ms`.
    pub async fn drain_cmds(&mut self, quiet_ms: u64) -> Vec<Command> {
        let mut out = Vec::new();
        while let Some(cmd) = self.next_cmd(quiet_ms).await {
            out.push(cmd);
        }
        out
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Cancel the entry point (simulate shutdown).
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the dispatch task to finish.
    pub async fn join(self) -> Result<()> {
        self.cancel.cancel();
        self.run_handle.await.expect("dispatch task panicked")
    }
}
