//! Grammar-constrained streaming recognition using Vosk

use super::grammar::{Dictionary, Grammar};
use super::{Hypothesis, StreamingRecognizer, UtteranceSession};
use crate::audio::AudioFrame;
use crate::config::Config;
use crate::error::{ConfigError, RecognizerError};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use vosk::{CompleteResult, DecodingState, Model, Recognizer};

/// Token Vosk emits for speech outside the grammar
const UNKNOWN_TOKEN: &str = "[unk]";

/// Vosk-based streaming recognizer
pub struct VoskRecognizer {
    model: Model,
    sample_rate: u32,
    allow_unknown: bool,
    dictionary: Option<Dictionary>,
    grammars: HashMap<String, Grammar>,
    active: Option<String>,
    recognizer: Option<Recognizer>,
    session: UtteranceSession,
    /// Last finalized segment of the open utterance
    finalized: Option<Hypothesis>,
}

impl VoskRecognizer {
    /// Load the model and dictionary. No grammar is active yet.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let dictionary = Dictionary::load(&config.dictionary_path)?;
        info!(
            "📖 Dictionary: {} ({} words)",
            dictionary.path().display(),
            dictionary.len()
        );

        let model_path = &config.model_path;
        if !model_path.exists() {
            return Err(ConfigError::MissingModel(model_path.clone()));
        }

        info!("Loading Vosk model from: {}", model_path.display());

        let model_str = model_path.to_str().ok_or_else(|| ConfigError::InvalidModel {
            path: model_path.clone(),
            reason: "path is not valid UTF-8".into(),
        })?;

        let model = Model::new(model_str).ok_or_else(|| ConfigError::InvalidModel {
            path: model_path.clone(),
            reason: "Vosk could not load the model".into(),
        })?;

        Ok(Self {
            model,
            sample_rate: config.sample_rate,
            allow_unknown: config.allow_unknown,
            dictionary: Some(dictionary),
            grammars: HashMap::new(),
            active: None,
            recognizer: None,
            session: UtteranceSession::new(),
            finalized: None,
        })
    }

    /// Load the model, then activate and select the configured grammar.
    pub fn from_config(config: &Config) -> Result<Self, RecognizerError> {
        let mut asr = Self::new(config)?;
        asr.activate_grammar(&config.grammar_name, &config.grammar_path)?;
        asr.select_grammar(&config.grammar_name)?;
        Ok(asr)
    }

    fn recognizer(&mut self) -> Result<&mut Recognizer, RecognizerError> {
        self.recognizer
            .as_mut()
            .ok_or_else(|| RecognizerError::DecoderFault("no grammar selected".into()))
    }

    fn take_final(&mut self) -> Result<Option<Hypothesis>, RecognizerError> {
        let result = self.recognizer()?.final_result();
        Ok(final_hypothesis(result))
    }
}

impl StreamingRecognizer for VoskRecognizer {
    fn activate_grammar(&mut self, name: &str, path: &Path) -> Result<(), RecognizerError> {
        let grammar = Grammar::load(path)?;
        if grammar.name != name {
            return Err(ConfigError::GrammarNameMismatch {
                path: path.to_path_buf(),
                declared: grammar.name,
                requested: name.to_string(),
            }
            .into());
        }
        if let Some(dictionary) = &self.dictionary {
            dictionary.check(&grammar)?;
        }
        for word in grammar.words() {
            if self.model.find_word(word).is_none() {
                warn!("⚠️ Word '{}' is not in the acoustic model vocabulary", word);
            }
        }

        info!(
            "Grammar file '{}' loaded as search '{}' ({} phrases)",
            path.display(),
            name,
            grammar.phrases.len()
        );
        self.grammars.insert(name.to_string(), grammar);
        Ok(())
    }

    fn select_grammar(&mut self, name: &str) -> Result<(), RecognizerError> {
        if self.session.is_open() {
            return Err(RecognizerError::InvalidState(
                "cannot switch grammar inside an utterance",
            ));
        }
        let grammar = self
            .grammars
            .get(name)
            .ok_or_else(|| ConfigError::UnknownGrammar(name.to_string()))?;

        let mut phrases: Vec<&str> = grammar.phrases.iter().map(String::as_str).collect();
        if self.allow_unknown {
            phrases.push(UNKNOWN_TOKEN);
        }

        let mut recognizer =
            Recognizer::new_with_grammar(&self.model, self.sample_rate as f32, &phrases)
                .ok_or_else(|| {
                    RecognizerError::DecoderFault(format!(
                        "failed to create recognizer for grammar '{name}'"
                    ))
                })?;
        recognizer.set_words(true);

        self.recognizer = Some(recognizer);
        self.active = Some(name.to_string());
        info!("Grammar search '{}' activated", name);
        Ok(())
    }

    fn start_utterance(&mut self) -> Result<(), RecognizerError> {
        if self.session.is_open() {
            return Err(RecognizerError::InvalidState("utterance already open"));
        }
        self.recognizer()?.reset();
        self.session.open()?;
        self.finalized = None;
        debug!(
            "Utterance {} started on '{}'",
            self.session.started(),
            self.active.as_deref().unwrap_or("?")
        );
        Ok(())
    }

    fn feed(
        &mut self,
        frame: AudioFrame,
        // Vosk runs its own endpointer
        _in_speech_hint: bool,
        force_decode: bool,
    ) -> Result<(), RecognizerError> {
        self.session.accept(&frame, self.sample_rate)?;

        match self.recognizer()?.accept_waveform(frame.samples()) {
            DecodingState::Running => {}
            DecodingState::Finalized => {
                if let Some(hyp) = self.take_final()? {
                    debug!("Segment finalized: '{}'", hyp.text);
                    self.finalized = Some(hyp);
                }
            }
            DecodingState::Failed => {
                return Err(RecognizerError::DecoderFault(
                    "Vosk failed to decode the frame".into(),
                ));
            }
        }

        if force_decode {
            if let Some(hyp) = self.take_final()? {
                self.finalized = Some(hyp);
            }
        }
        Ok(())
    }

    fn current_hypothesis(&mut self) -> Option<Hypothesis> {
        let recognizer = self.recognizer.as_mut()?;
        let partial = recognizer.partial_result().partial.trim();
        if !partial.is_empty() {
            let hyp = Hypothesis::partial(partial);
            self.finalized = None;
            return Some(hyp);
        }
        self.finalized.clone()
    }

    fn end_utterance(&mut self) -> Result<(), RecognizerError> {
        self.session.close()?;
        if let Some(hyp) = self.take_final()? {
            debug!("Utterance ended with: '{}'", hyp.text);
        }
        self.finalized = None;
        Ok(())
    }

    fn frames_consumed(&self) -> u64 {
        self.session.frames()
    }

    fn is_utterance_open(&self) -> bool {
        self.session.is_open()
    }
}

/// Extract text and mean word confidence from a final result.
fn final_hypothesis(result: CompleteResult<'_>) -> Option<Hypothesis> {
    let single = result.single()?;
    let text = extract_text(single.text)?;
    if single.result.is_empty() {
        return Some(Hypothesis::partial(text));
    }
    let sum: f32 = single.result.iter().map(|w| w.conf).sum();
    Some(Hypothesis::with_confidence(
        text,
        sum / single.result.len() as f32,
    ))
}

/// Extract text from Vosk result, filtering empty results
fn extract_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
