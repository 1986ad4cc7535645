//! ASR (Automatic Speech Recognition) Module
//!
//! A streaming recognizer is fed one frame at a time inside an explicit
//! utterance and can be peeked for its current best guess at any point.

pub mod grammar;
pub mod vosk;

use crate::audio::AudioFrame;
use crate::error::RecognizerError;
use std::path::Path;

pub use grammar::{Dictionary, Grammar};
pub use vosk::VoskRecognizer;

/// Best-guess transcript, possibly partial
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub text: String,
    /// Absent for partial results
    pub confidence: Option<f32>,
}

impl Hypothesis {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: Some(confidence),
        }
    }

    /// Hypotheses without a confidence always pass.
    pub fn meets(&self, min_confidence: Option<f32>) -> bool {
        match (min_confidence, self.confidence) {
            (Some(min), Some(conf)) => conf >= min,
            _ => true,
        }
    }
}

/// Trait for grammar-constrained streaming decoders.
///
/// Not safe for concurrent use: one thread feeds and polls in sequence.
pub trait StreamingRecognizer {
    /// Load a grammar file and register it under `name`.
    fn activate_grammar(&mut self, name: &str, path: &Path) -> Result<(), RecognizerError>;

    /// Make a previously activated grammar the active search.
    fn select_grammar(&mut self, name: &str) -> Result<(), RecognizerError>;

    /// Open a new utterance.
    fn start_utterance(&mut self) -> Result<(), RecognizerError>;

    /// Push one frame into the open utterance.
    fn feed(
        &mut self,
        frame: AudioFrame,
        in_speech_hint: bool,
        force_decode: bool,
    ) -> Result<(), RecognizerError>;

    /// Current best guess, or `None` if nothing has been decoded yet.
    fn current_hypothesis(&mut self) -> Option<Hypothesis>;

    /// Close the open utterance.
    fn end_utterance(&mut self) -> Result<(), RecognizerError>;

    /// Frames fed into the current (or last) utterance
    fn frames_consumed(&self) -> u64;

    fn is_utterance_open(&self) -> bool;
}

impl<R: StreamingRecognizer + ?Sized> StreamingRecognizer for Box<R> {
    fn activate_grammar(&mut self, name: &str, path: &Path) -> Result<(), RecognizerError> {
        (**self).activate_grammar(name, path)
    }

    fn select_grammar(&mut self, name: &str) -> Result<(), RecognizerError> {
        (**self).select_grammar(name)
    }

    fn start_utterance(&mut self) -> Result<(), RecognizerError> {
        (**self).start_utterance()
    }

    fn feed(
        &mut self,
        frame: AudioFrame,
        in_speech_hint: bool,
        force_decode: bool,
    ) -> Result<(), RecognizerError> {
        (**self).feed(frame, in_speech_hint, force_decode)
    }

    fn current_hypothesis(&mut self) -> Option<Hypothesis> {
        (**self).current_hypothesis()
    }

    fn end_utterance(&mut self) -> Result<(), RecognizerError> {
        (**self).end_utterance()
    }

    fn frames_consumed(&self) -> u64 {
        (**self).frames_consumed()
    }

    fn is_utterance_open(&self) -> bool {
        (**self).is_utterance_open()
    }
}

/// Utterance bookkeeping shared by recognizer implementations.
#[derive(Debug, Default, Clone)]
pub struct UtteranceSession {
    open: bool,
    frames: u64,
    started: u64,
}

impl UtteranceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) -> Result<(), RecognizerError> {
        if self.open {
            return Err(RecognizerError::InvalidState("utterance already open"));
        }
        self.open = true;
        self.frames = 0;
        self.started += 1;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), RecognizerError> {
        if !self.open {
            return Err(RecognizerError::InvalidState("no utterance open"));
        }
        self.open = false;
        Ok(())
    }

    /// Count a frame. Frames outside an utterance or at the wrong rate are
    /// refused and not counted.
    pub fn accept(&mut self, frame: &AudioFrame, sample_rate: u32) -> Result<(), RecognizerError> {
        if !self.open {
            return Err(RecognizerError::InvalidState("frame fed outside an utterance"));
        }
        if frame.sample_rate() != sample_rate {
            return Err(RecognizerError::DecoderFault(format!(
                "frame at {} Hz fed to a {} Hz decoder",
                frame.sample_rate(),
                sample_rate
            )));
        }
        self.frames += 1;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Utterances opened so far
    pub fn started(&self) -> u64 {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rate: u32) -> AudioFrame {
        AudioFrame::new(vec![0; 160], rate)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = UtteranceSession::new();
        assert!(matches!(
            session.accept(&frame(16000), 16000),
            Err(RecognizerError::InvalidState(_))
        ));

        session.open().expect("open");
        session.accept(&frame(16000), 16000).expect("frame");
        session.accept(&frame(16000), 16000).expect("frame");
        assert_eq!(session.frames(), 2);
        session.close().expect("close");

        assert!(matches!(session.close(), Err(RecognizerError::InvalidState(_))));
        assert!(session.accept(&frame(16000), 16000).is_err());
        assert_eq!(session.frames(), 2);
    }

    #[test]
    fn test_wrong_rate_frame_is_not_counted() {
        let mut session = UtteranceSession::new();
        session.open().expect("open");
        session.accept(&frame(16000), 16000).expect("frame");

        assert!(matches!(
            session.accept(&frame(8000), 16000),
            Err(RecognizerError::DecoderFault(_))
        ));
        assert_eq!(session.frames(), 1);
    }

    #[test]
    fn test_session_rejects_double_open() {
        let mut session = UtteranceSession::new();
        session.open().expect("open");
        assert!(session.open().is_err());
        session.close().expect("close");
        session.open().expect("reopen");
        assert_eq!(session.frames(), 0);
        assert_eq!(session.started(), 2);
    }

    #[test]
    fn test_confidence_policy() {
        assert!(Hypothesis::partial("kitchen").meets(Some(0.9)));
        assert!(Hypothesis::with_confidence("kitchen", 0.4).meets(None));
        assert!(!Hypothesis::with_confidence("kitchen", 0.4).meets(Some(0.5)));
        assert!(Hypothesis::with_confidence("kitchen", 0.5).meets(Some(0.5)));
    }
}
