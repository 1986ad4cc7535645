//! Hearken Error Types
//!
//! One enum per failure class, aggregated into [`Error`] for the binary.

use std::path::PathBuf;
use thiserror::Error;

/// Missing or invalid startup configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("acoustic model not found at {0}")]
    MissingModel(PathBuf),

    #[error("failed to load acoustic model from {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    #[error("dictionary file not found at {0}")]
    MissingDictionary(PathBuf),

    #[error("malformed dictionary {path} (line {line}): {reason}")]
    MalformedDictionary {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("grammar file not found at {0}")]
    MissingGrammar(PathBuf),

    #[error("malformed grammar {path}: {reason}")]
    MalformedGrammar { path: PathBuf, reason: String },

    #[error("grammar {path} declares '{declared}' but was activated as '{requested}'")]
    GrammarNameMismatch {
        path: PathBuf,
        declared: String,
        requested: String,
    },

    #[error("grammar '{0}' has not been activated")]
    UnknownGrammar(String),

    #[error("grammar word '{word}' is missing from the dictionary")]
    WordNotInDictionary { word: String },

    #[error("invalid command table: {0}")]
    CommandTable(String),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Audio device failures. Only device loss is fatal.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no input device available: {0}")]
    NotFound(String),

    #[error("failed to open input device: {0}")]
    Open(String),

    #[error("input overflow, {dropped} samples dropped")]
    Overflow { dropped: usize },

    #[error("no audio received for {0} ms")]
    Stalled(u64),

    #[error("input device lost: {0}")]
    Disconnected(String),
}

impl DeviceError {
    /// Whether the loop must stop instead of reading again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::Disconnected(_) | DeviceError::NotFound(_) | DeviceError::Open(_)
        )
    }
}

/// Failures raised by a streaming recognizer.
#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("decoder fault: {0}")]
    DecoderFault(String),

    #[error("invalid recognizer state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Speech synthesis failures. Always recoverable.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("synthesis command '{0}' not found")]
    NotFound(String),

    #[error("synthesis command '{command}' failed with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("synthesis timed out after {0} ms")]
    Timeout(u64),

    #[error("response queue is full, dropped '{0}'")]
    QueueFull(String),

    #[error("response worker has stopped")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Central error type for Hearken
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Recognizer(#[from] RecognizerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for Hearken operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(e) | Error::Recognizer(RecognizerError::Config(e)) => match e {
                ConfigError::MissingModel(_) | ConfigError::InvalidModel { .. } => 2,
                ConfigError::MissingDictionary(_)
                | ConfigError::MalformedDictionary { .. }
                | ConfigError::WordNotInDictionary { .. } => 3,
                ConfigError::MissingGrammar(_)
                | ConfigError::MalformedGrammar { .. }
                | ConfigError::GrammarNameMismatch { .. }
                | ConfigError::UnknownGrammar(_) => 4,
                _ => 1,
            },
            Error::Device(e) if e.is_fatal() && !matches!(e, DeviceError::Disconnected(_)) => 5,
            Error::Device(_) => 7,
            Error::Recognizer(_) => 6,
            Error::Dispatch(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let model = Error::from(ConfigError::MissingModel("m".into()));
        let grammar = Error::from(ConfigError::MissingGrammar("g".into()));
        let dict = Error::from(ConfigError::MissingDictionary("d".into()));
        let device = Error::from(DeviceError::Open("busy".into()));
        let lost = Error::from(DeviceError::Disconnected("unplugged".into()));
        let fault = Error::from(RecognizerError::DecoderFault("reset".into()));

        let codes = [
            model.exit_code(),
            dict.exit_code(),
            grammar.exit_code(),
            device.exit_code(),
            fault.exit_code(),
            lost.exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_grammar_error_through_recognizer_keeps_config_code() {
        let err = Error::from(RecognizerError::from(ConfigError::UnknownGrammar(
            "rooms".into(),
        )));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_only_device_loss_is_fatal_while_reading() {
        assert!(DeviceError::Disconnected("gone".into()).is_fatal());
        assert!(!DeviceError::Overflow { dropped: 10 }.is_fatal());
        assert!(!DeviceError::Stalled(500).is_fatal());
    }
}
