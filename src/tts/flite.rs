//! Flite TTS backend calling the local binary

use super::TtsEngine;
use crate::error::DispatchError;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FliteEngine {
    voice: String,
}

impl FliteEngine {
    pub fn new(voice: &str) -> Self {
        Self {
            voice: voice.to_string(),
        }
    }
}

#[async_trait]
impl TtsEngine for FliteEngine {
    async fn speak(&self, text: &str) -> Result<(), DispatchError> {
        debug!("Flite speaking: {}", text);
        // Passed as a single argv entry, no shell quoting involved
        super::run_command("flite", &["-voice", &self.voice, "-t", text]).await
    }

    fn name(&self) -> &str {
        "flite"
    }
}
