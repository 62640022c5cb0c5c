use super::collect::collect_digit;
use super::prompts::{Language, Prompt};
use crate::ari::Telephony;
use crate::config::IvrConfig;
use crate::event::EventReceiver;
use crate::lookup::{WorkerFilter, WorkerLookup};
use crate::ChannelId;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Dialogue position of a session. Exactly one step is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AnsweringCall,
    CollectingLanguage,
    CollectingDistrict,
    CollectingCategory,
    CollectingGender,
    CollectingOrdering,
    LookingUpWorkers,
    AnnouncingResults,
    AnnouncingWorker1,
    AnnouncingWorker2,
    HangingUp,
}

/// Answers collected over the dialogue.
///
/// Append-only: each field is written once when its step resolves and never
/// revised afterwards.
#[derive(Debug, Clone, Default)]
pub struct Answers {
    pub language: Option<Language>,
    pub district: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub ordering: Option<String>,
}

/// One inbound call's session, from answer to hangup.
pub struct IvrSession {
    channel: ChannelId,
    step: Step,
    answers: Answers,
    hung_up: bool,
}

impl IvrSession {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            step: Step::AnsweringCall,
            answers: Answers::default(),
            hung_up: false,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    fn language(&self) -> Language {
        self.answers.language.unwrap_or_default()
    }

    /// Run the dialogue from answer through the result announcements.
    ///
    /// Does not hang up: every path, success or failure, converges on the
    /// caller invoking [`hangup`](Self::hangup) exactly once afterwards.
    pub async fn run_dialogue(
        &mut self,
        telephony: &dyn Telephony,
        lookup: &dyn WorkerLookup,
        events: &mut EventReceiver,
        ivr: &IvrConfig,
    ) -> Result<()> {
        let window = Duration::from_millis(ivr.digit_timeout_ms);

        self.ensure_active()?;
        telephony
            .answer(&self.channel)
            .await
            .context("failed to answer channel")?;

        self.step = Step::CollectingLanguage;
        let digit = self
            .collect_step(telephony, events, Prompt::Language, window, ivr)
            .await?;
        self.answers.language = Some(Language::from_digit(&digit));

        self.step = Step::CollectingDistrict;
        let digit = self
            .collect_step(telephony, events, Prompt::District, window, ivr)
            .await?;
        self.answers.district = Some(digit);

        self.step = Step::CollectingCategory;
        let digit = self
            .collect_step(telephony, events, Prompt::Category, window, ivr)
            .await?;
        self.answers.category = Some(digit);

        self.step = Step::CollectingGender;
        let digit = self
            .collect_step(telephony, events, Prompt::Gender, window, ivr)
            .await?;
        self.answers.gender = Some(digit);

        self.step = Step::CollectingOrdering;
        let digit = self
            .collect_step(telephony, events, Prompt::Ordering, window, ivr)
            .await?;
        self.answers.ordering = Some(digit);

        self.step = Step::LookingUpWorkers;
        let filter = self.filter();
        info!(channel = %self.channel, ?filter, "looking up workers");
        let matches = lookup
            .find_workers(&filter)
            .await
            .context("worker lookup failed")?;
        debug!(channel = %self.channel, count = matches.len(), "lookup finished");

        // The results prompt plays regardless of how many matches came back.
        self.step = Step::AnnouncingResults;
        self.play(telephony, Prompt::Results, ivr).await?;

        // Static announcements only; the matched name and phone number are
        // not spoken (documented limitation, no synthesis available).
        if !matches.is_empty() {
            self.step = Step::AnnouncingWorker1;
            self.play(telephony, Prompt::Worker1, ivr).await?;
        }
        if matches.len() >= 2 {
            self.step = Step::AnnouncingWorker2;
            self.play(telephony, Prompt::Worker2, ivr).await?;
        }

        Ok(())
    }

    /// Best-effort teardown, idempotent.
    ///
    /// The first call transitions to `HangingUp` and invokes the platform
    /// hangup; a failure is swallowed since the channel is often already
    /// gone. Later calls are no-ops, and no primitive may run afterwards.
    pub async fn hangup(&mut self, telephony: &dyn Telephony) {
        if self.hung_up {
            return;
        }
        self.step = Step::HangingUp;
        self.hung_up = true;
        if let Err(e) = telephony.hangup(&self.channel).await {
            debug!(channel = %self.channel, "hangup failed: {:#}", e);
        }
    }

    pub fn is_hung_up(&self) -> bool {
        self.hung_up
    }

    fn ensure_active(&self) -> Result<()> {
        if self.hung_up {
            bail!("session on channel {} already hung up", self.channel);
        }
        Ok(())
    }

    fn filter(&self) -> WorkerFilter {
        WorkerFilter {
            district: self.answers.district.clone().unwrap_or_default(),
            category: self.answers.category.clone().unwrap_or_default(),
            gender: self.answers.gender.clone().unwrap_or_default(),
            ordering: self.answers.ordering.clone().unwrap_or_default(),
            language: self.language().segment().to_string(),
        }
    }

    async fn collect_step(
        &mut self,
        telephony: &dyn Telephony,
        events: &mut EventReceiver,
        prompt: Prompt,
        window: Duration,
        ivr: &IvrConfig,
    ) -> Result<String> {
        self.play(telephony, prompt, ivr).await?;
        let digit = collect_digit(events, &self.channel, window)
            .await
            .with_context(|| format!("digit collection failed at {:?}", self.step))?;
        debug!(channel = %self.channel, step = ?self.step, digit = %digit, "digit collected");
        Ok(digit)
    }

    async fn play(&self, telephony: &dyn Telephony, prompt: Prompt, ivr: &IvrConfig) -> Result<()> {
        self.ensure_active()?;
        let sound = prompt.sound_name(&ivr.sounds_prefix, self.language());
        debug!(channel = %self.channel, %sound, "playing prompt");
        telephony.play(&self.channel, &sound).await
    }
}
