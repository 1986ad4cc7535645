//! Recognition loop
//!
//! Pulls frames from an [`AudioSource`], feeds a [`StreamingRecognizer`],
//! polls once per frame and dispatches the response of the first
//! hypothesis that normalizes into the command table.
//!
//! Partial hypotheses are acted on as soon as they match. Nothing waits for
//! the decoder to settle, so a command can fire before the speaker has
//! finished; `min_confidence` only filters hypotheses that carry a score.
//!
//! With `mute_while_speaking`, frames read while a response is still playing
//! are discarded instead of fed, so the loop does not hear its own replies.

use crate::asr::StreamingRecognizer;
use crate::audio::AudioSource;
use crate::commands::{CommandMatcher, CommandTable, MatchPolicy};
use crate::config::Config;
use crate::core::text_normalizer::{normalize, normalize_into};
use crate::error::{Error, RecognizerError, Result};
use crate::tts::DispatchHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// Capacity of the command event channel
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No utterance open
    Idle,
    /// Utterance open, consuming frames
    Listening,
    /// Command detected, response being dispatched
    Matched,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    NoMatch,
    Match,
    ExitMatched,
    Restarted,
    Fatal,
    Interrupt,
}

impl LoopState {
    /// Transition table. `None` marks a transition that must not happen.
    pub fn on(self, trigger: Trigger) -> Option<LoopState> {
        use LoopState::*;
        use Trigger::*;

        match (self, trigger) {
            (Terminated, _) => None,
            (_, Fatal) | (_, Interrupt) => Some(Terminated),
            (Idle, Start) => Some(Listening),
            (Listening, NoMatch) => Some(Listening),
            (Listening, Match) => Some(Matched),
            (Matched, ExitMatched) => Some(Terminated),
            (Matched, Restarted) => Some(Listening),
            _ => None,
        }
    }
}

/// Published once per detected command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub command: String,
    pub response: String,
    /// Raw decoder text that matched
    pub transcript: String,
    pub utterance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ExitCommand,
    Interrupted,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_read: u64,
    pub frames_fed: u64,
    /// Frames discarded while a response was playing
    pub frames_muted: u64,
    /// Frames the recognizer reported for every closed utterance
    pub frames_consumed: u64,
    pub read_errors: u64,
    pub utterances: u64,
    pub commands: u64,
    pub dispatched: u64,
    pub dispatch_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub reason: StopReason,
    pub stats: LoopStats,
}

/// Matching policy for the loop
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub exit_command: String,
    pub min_confidence: Option<f32>,
    pub match_policy: MatchPolicy,
    pub mute_while_speaking: bool,
}

impl LoopOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exit_command: config.exit_command.clone(),
            min_confidence: config.min_confidence,
            match_policy: config.match_policy,
            mute_while_speaking: config.mute_while_speaking,
        }
    }
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct RecognitionLoop<S, R> {
    source: S,
    recognizer: R,
    table: Arc<CommandTable>,
    matcher: CommandMatcher,
    exit_command: String,
    min_confidence: Option<f32>,
    mute_while_speaking: bool,
    muted: bool,
    responder: DispatchHandle,
    events: broadcast::Sender<CommandEvent>,
    shutdown: Arc<AtomicBool>,
    state: LoopState,
    stats: LoopStats,
    /// Reused for every poll
    scratch: String,
}

impl<S: AudioSource, R: StreamingRecognizer> RecognitionLoop<S, R> {
    /// The recognizer must already have a grammar selected.
    pub fn new(
        source: S,
        recognizer: R,
        table: Arc<CommandTable>,
        responder: DispatchHandle,
        options: LoopOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source,
            recognizer,
            table,
            matcher: CommandMatcher::new(options.match_policy),
            exit_command: normalize(&options.exit_command).into_string(),
            min_confidence: options.min_confidence,
            mute_while_speaking: options.mute_while_speaking,
            muted: false,
            responder,
            events,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
            stats: LoopStats::default(),
            scratch: String::with_capacity(64),
        }
    }

    /// Use an externally owned shutdown flag.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Publish command events on an existing channel.
    pub fn with_events(mut self, events: broadcast::Sender<CommandEvent>) -> Self {
        self.events = events;
        self
    }

    /// Receive a [`CommandEvent`] for every detected command.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Run until the exit command, an interrupt, or a fatal error.
    ///
    /// On error the loop is left in [`LoopState::Terminated`] with the
    /// utterance closed on a best-effort basis.
    pub fn run(&mut self) -> Result<LoopOutcome> {
        if self.state != LoopState::Idle {
            return Err(RecognizerError::InvalidState("loop already ran").into());
        }

        if let Err(e) = self.open_utterance() {
            return Err(self.fail(e));
        }
        self.advance(Trigger::Start)?;
        info!("👂 Listening");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(self.interrupt());
            }
            match self.step() {
                Ok(Some(reason)) => return Ok(self.outcome(reason)),
                Ok(None) => {}
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// One read → feed → poll → match cycle.
    fn step(&mut self) -> Result<Option<StopReason>> {
        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                self.stats.read_errors += 1;
                warn!("⚠️ Error reading audio stream: {}", e);
                return Ok(None);
            }
        };
        self.stats.frames_read += 1;

        if self.mute_while_speaking && self.responder.is_busy() {
            if !self.muted {
                debug!("🔇 Muting microphone while responding");
                self.muted = true;
            }
            self.stats.frames_muted += 1;
            return Ok(None);
        }
        if self.muted {
            debug!("🔊 Microphone unmuted");
            self.muted = false;
        }

        self.recognizer.feed(frame, false, false)?;
        self.stats.frames_fed += 1;

        let Some(hypothesis) = self.recognizer.current_hypothesis() else {
            self.advance(Trigger::NoMatch)?;
            return Ok(None);
        };

        if !hypothesis.meets(self.min_confidence) {
            trace!(
                "Ignoring low-confidence hypothesis '{}' ({:?})",
                hypothesis.text,
                hypothesis.confidence
            );
            self.advance(Trigger::NoMatch)?;
            return Ok(None);
        }

        normalize_into(&hypothesis.text, &mut self.scratch);
        let matched = self
            .matcher
            .find_str(&self.scratch, &self.table)
            .map(|cmd| (cmd.phrase.to_string(), cmd.response.to_string()));

        match matched {
            Some((command, response)) => {
                self.advance(Trigger::Match)?;
                self.on_match(command, response, hypothesis.text)
            }
            None => {
                self.advance(Trigger::NoMatch)?;
                Ok(None)
            }
        }
    }

    fn on_match(
        &mut self,
        command: String,
        response: String,
        transcript: String,
    ) -> Result<Option<StopReason>> {
        info!("Recognized: {}", transcript);
        info!("--- Command Detected: {} ---", command);

        // Closing here discards whatever else the decoder makes of this phrase
        self.close_utterance()?;
        self.stats.commands += 1;

        let _ = self.events.send(CommandEvent {
            command: command.clone(),
            response: response.clone(),
            transcript,
            utterance: self.stats.utterances,
        });

        match self.responder.speak(&response) {
            Ok(()) => self.stats.dispatched += 1,
            Err(e) => {
                self.stats.dispatch_errors += 1;
                error!("❌ Could not dispatch response for '{}': {}", command, e);
            }
        }

        if command == self.exit_command {
            self.advance(Trigger::ExitMatched)?;
            info!("Exiting program.");
            return Ok(Some(StopReason::ExitCommand));
        }

        self.open_utterance()?;
        self.advance(Trigger::Restarted)?;
        info!("Ready! Say one of the commands.");
        Ok(None)
    }

    fn open_utterance(&mut self) -> Result<()> {
        self.recognizer.start_utterance()?;
        self.stats.utterances += 1;
        Ok(())
    }

    fn close_utterance(&mut self) -> Result<()> {
        self.recognizer.end_utterance()?;
        let consumed = self.recognizer.frames_consumed();
        self.stats.frames_consumed += consumed;
        debug!("Utterance {} closed after {} frames", self.stats.utterances, consumed);
        Ok(())
    }

    fn advance(&mut self, trigger: Trigger) -> Result<()> {
        match self.state.on(trigger) {
            Some(next) => {
                if next != self.state {
                    debug!("{:?} --{:?}--> {:?}", self.state, trigger, next);
                }
                self.state = next;
                Ok(())
            }
            None => {
                error!("❌ No transition from {:?} on {:?}", self.state, trigger);
                Err(RecognizerError::InvalidState("invalid loop transition").into())
            }
        }
    }

    fn close_best_effort(&mut self) {
        if self.recognizer.is_utterance_open() {
            if let Err(e) = self.close_utterance() {
                warn!("⚠️ Could not end utterance cleanly: {}", e);
            }
        }
    }

    fn interrupt(&mut self) -> LoopOutcome {
        info!("Stopping recognition.");
        self.close_best_effort();
        self.state = self.state.on(Trigger::Interrupt).unwrap_or(LoopState::Terminated);
        self.outcome(StopReason::Interrupted)
    }

    fn fail(&mut self, err: Error) -> Error {
        error!("❌ Recognition stopped: {}", err);
        self.close_best_effort();
        self.state = self.state.on(Trigger::Fatal).unwrap_or(LoopState::Terminated);
        err
    }

    fn outcome(&self, reason: StopReason) -> LoopOutcome {
        LoopOutcome {
            reason,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LoopState::*;
    use super::Trigger::*;
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(Idle.on(Start), Some(Listening));
        assert_eq!(Listening.on(NoMatch), Some(Listening));
        assert_eq!(Listening.on(Match), Some(Matched));
        assert_eq!(Matched.on(Restarted), Some(Listening));
        assert_eq!(Matched.on(ExitMatched), Some(Terminated));
    }

    #[test]
    fn test_fatal_and_interrupt_from_any_live_state() {
        for state in [Idle, Listening, Matched] {
            assert_eq!(state.on(Fatal), Some(Terminated));
            assert_eq!(state.on(Interrupt), Some(Terminated));
        }
    }

    #[test]
    fn test_terminated_is_final() {
        for trigger in [Start, NoMatch, Match, ExitMatched, Restarted, Fatal, Interrupt] {
            assert_eq!(Terminated.on(trigger), None);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(Idle.on(Match), None);
        assert_eq!(Idle.on(NoMatch), None);
        assert_eq!(Listening.on(Start), None);
        assert_eq!(Listening.on(Restarted), None);
        assert_eq!(Matched.on(Match), None);
        assert_eq!(Matched.on(NoMatch), None);
    }
}
