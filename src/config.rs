use crate::commands::MatchPolicy;
use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Recognizer
    pub model_path: PathBuf,
    pub dictionary_path: PathBuf,
    pub grammar_path: PathBuf,
    pub grammar_name: String,
    /// Lets the decoder emit `[unk]` for speech outside the grammar
    pub allow_unknown: bool,

    // Audio
    pub device_index: Option<usize>,
    pub device_name: Option<String>,
    pub sample_rate: u32,
    pub frame_size: usize,
    pub read_timeout_ms: u64,
    pub capture_queue_frames: usize,

    // Commands
    pub commands: BTreeMap<String, String>,
    pub exit_command: String,
    /// Hypotheses below this confidence are ignored; off by default
    pub min_confidence: Option<f32>,
    pub match_policy: MatchPolicy,

    // Speech
    pub tts_engine: String,
    pub flite_voice: String,
    pub speak_timeout_ms: u64,
    pub dispatch_queue: usize,
    pub ready_prompt: Option<String>,
    /// Discard microphone frames while a response is playing
    pub mute_while_speaking: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("/usr/share/pocketsphinx/model/en-us/en-us"),
            dictionary_path: PathBuf::from("room_vocabulary.dic"),
            grammar_path: PathBuf::from("room_commands.jsgf"),
            grammar_name: "room_commands".to_string(),
            allow_unknown: true,
            device_index: None,
            device_name: None,
            sample_rate: 16000,
            frame_size: 1024,
            read_timeout_ms: 500,
            capture_queue_frames: 32,
            commands: BTreeMap::from([
                (
                    "living room".to_string(),
                    "Acknowledged, Living Room.".to_string(),
                ),
                ("kitchen".to_string(), "Affirmative, Kitchen.".to_string()),
                ("bedroom".to_string(), "Understood, Bedroom.".to_string()),
                ("exit".to_string(), "Exiting program.".to_string()),
            ]),
            exit_command: "exit".to_string(),
            min_confidence: None,
            match_policy: MatchPolicy::Exact,
            tts_engine: "flite".to_string(),
            flite_voice: "slt".to_string(),
            speak_timeout_ms: 10_000,
            dispatch_queue: 4,
            ready_prompt: None,
            mute_while_speaking: true,
        }
    }
}

impl Config {
    /// Load config from `path`, or from the default location.
    ///
    /// A missing default file yields defaults. An explicit path that does not
    /// exist, or any file that fails to parse, is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !config_path.exists() && !explicit {
            tracing::debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::info!("📄 Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("💾 Saved config to {}", path.display());
        Ok(())
    }

    /// Check numeric ranges and command table consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.frame_size == 0 {
            return Err(ConfigError::Invalid("frame_size must be positive".into()));
        }
        if self.capture_queue_frames == 0 || self.dispatch_queue == 0 {
            return Err(ConfigError::Invalid("queue sizes must be positive".into()));
        }
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(ConfigError::Invalid(format!(
                    "min_confidence {min} is outside 0.0..=1.0"
                )));
            }
        }
        if let MatchPolicy::Fuzzy { threshold } = self.match_policy {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Invalid(format!(
                    "fuzzy threshold {threshold} is outside 0.0..=1.0"
                )));
            }
        }
        if self.commands.is_empty() {
            return Err(ConfigError::CommandTable("no commands configured".into()));
        }
        let exit = crate::core::text_normalizer::normalize(&self.exit_command);
        let has_exit = self
            .commands
            .keys()
            .any(|k| crate::core::text_normalizer::normalize(k) == exit);
        if !has_exit {
            return Err(ConfigError::CommandTable(format!(
                "exit command '{}' has no entry in the command table",
                self.exit_command
            )));
        }
        Ok(())
    }

    /// Prompt spoken once the loop is ready.
    pub fn ready_prompt(&self) -> String {
        if let Some(prompt) = &self.ready_prompt {
            return prompt.clone();
        }
        let phrases: Vec<String> = self.commands.keys().map(|k| title_case(k)).collect();
        format!("Ready! Say one of the commands: {}.", phrases.join(", "))
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hearken")
        .join("config.json")
}

fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
