//! Mock Streaming Recognizer for Testing
//!
//! Each utterance replays its own list of hypotheses, one per fed frame.
//! Past the end of the list the last hypothesis sticks, the way a real
//! decoder keeps its best guess while nothing new is heard.

use hearken::asr::{Hypothesis, StreamingRecognizer, UtteranceSession};
use hearken::audio::AudioFrame;
use hearken::error::RecognizerError;
use std::path::Path;

use super::mock_audio::SAMPLE_RATE;

#[derive(Default)]
pub struct ScriptedRecognizer {
    utterances: Vec<Vec<Option<Hypothesis>>>,
    session: UtteranceSession,
    /// Frames accepted across all utterances
    pub total_frames: u64,
    /// Frames refused because no utterance was open
    pub rejected_frames: u64,
    pub polls: u64,
    pub ended: u64,
    /// Fail `feed` with a decoder fault on this total frame number
    pub fault_on_frame: Option<u64>,
}

impl ScriptedRecognizer {
    /// Build from plain text; `None` means nothing decoded yet.
    pub fn from_text(utterances: Vec<Vec<Option<&str>>>) -> Self {
        Self::new(
            utterances
                .into_iter()
                .map(|u| u.into_iter().map(|h| h.map(Hypothesis::partial)).collect())
                .collect(),
        )
    }

    pub fn new(utterances: Vec<Vec<Option<Hypothesis>>>) -> Self {
        Self {
            utterances,
            ..Self::default()
        }
    }

    pub fn started(&self) -> u64 {
        self.session.started()
    }
}

impl StreamingRecognizer for ScriptedRecognizer {
    fn activate_grammar(&mut self, _name: &str, _path: &Path) -> Result<(), RecognizerError> {
        Ok(())
    }

    fn select_grammar(&mut self, _name: &str) -> Result<(), RecognizerError> {
        Ok(())
    }

    fn start_utterance(&mut self) -> Result<(), RecognizerError> {
        self.session.open()
    }

    fn feed(
        &mut self,
        frame: AudioFrame,
        _in_speech_hint: bool,
        _force_decode: bool,
    ) -> Result<(), RecognizerError> {
        if let Err(e) = self.session.accept(&frame, SAMPLE_RATE) {
            self.rejected_frames += 1;
            return Err(e);
        }
        self.total_frames += 1;
        if self.fault_on_frame == Some(self.total_frames) {
            return Err(RecognizerError::DecoderFault("scripted fault".into()));
        }
        Ok(())
    }

    fn current_hypothesis(&mut self) -> Option<Hypothesis> {
        self.polls += 1;
        if !self.session.is_open() || self.session.frames() == 0 {
            return None;
        }
        let script = self.utterances.get(self.session.started() as usize - 1)?;
        let idx = (self.session.frames() as usize - 1).min(script.len().checked_sub(1)?);
        script[idx].clone()
    }

    fn end_utterance(&mut self) -> Result<(), RecognizerError> {
        self.session.close()?;
        self.ended += 1;
        Ok(())
    }

    fn frames_consumed(&self) -> u64 {
        self.session.frames()
    }

    fn is_utterance_open(&self) -> bool {
        self.session.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_hypothesis_sticks() {
        let mut asr = ScriptedRecognizer::from_text(vec![vec![None, Some("kitchen")]]);
        asr.start_utterance().unwrap();
        for _ in 0..4 {
            asr.feed(AudioFrame::new(vec![0; 4], 16000), false, false)
                .unwrap();
        }
        assert_eq!(asr.current_hypothesis().unwrap().text, "kitchen");
    }
}
