//! TTS (Text-to-Speech) Module
//!
//! Speech engines plus the dispatcher that keeps synthesis off the
//! recognition thread.

use crate::config::Config;
use crate::error::DispatchError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub mod dispatcher;
pub mod flite;
pub mod system;

pub use dispatcher::{DispatchHandle, ResponseDispatcher};

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync + std::fmt::Debug {
    /// Speak the given text, returning once playback has finished
    async fn speak(&self, text: &str) -> Result<(), DispatchError>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Factory to create the configured TTS engine
pub fn create_engine(config: &Config) -> Arc<dyn TtsEngine> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn TtsEngine> = match config.tts_engine.as_str() {
        "flite" => {
            info!("  - Using Flite (Voice: {})", config.flite_voice);
            Arc::new(flite::FliteEngine::new(&config.flite_voice))
        }
        "system" => {
            info!("  - Using System TTS Fallback");
            Arc::new(system::SystemEngine::new())
        }
        other => {
            warn!("  - Unknown engine '{}', falling back to Flite", other);
            Arc::new(flite::FliteEngine::new(&config.flite_voice))
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    engine
}

/// Run a synthesis command to completion, mapping failures to [`DispatchError`].
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
) -> Result<(), DispatchError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DispatchError::NotFound(program.to_string()),
            _ => DispatchError::Io(e),
        })?;

    if !output.status.success() {
        return Err(DispatchError::Failed {
            command: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_falls_back_to_flite() {
        let config = Config {
            tts_engine: "festival".to_string(),
            ..Config::default()
        };
        assert_eq!(create_engine(&config).name(), "flite");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let result = run_command("hearken-no-such-synth", &["hello"]).await;
        assert!(matches!(result, Err(DispatchError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let result = run_command("sh", &["-c", "echo boom >&2; exit 3"]).await;
        match result {
            Err(DispatchError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
