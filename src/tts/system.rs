//! System fallback TTS engine

use super::TtsEngine;
use crate::error::DispatchError;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug)]
pub struct SystemEngine;

impl Default for SystemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TtsEngine for SystemEngine {
    async fn speak(&self, text: &str) -> Result<(), DispatchError> {
        debug!("System speaking: {}", text);

        // spd-say returns immediately unless told to wait
        match super::run_command("spd-say", &["--wait", text]).await {
            Err(DispatchError::NotFound(_)) => {}
            other => return other,
        }

        match super::run_command("espeak-ng", &[text]).await {
            Err(DispatchError::NotFound(_)) => Err(DispatchError::NotFound(
                "spd-say or espeak-ng".to_string(),
            )),
            other => other,
        }
    }

    fn name(&self) -> &str {
        "system"
    }
}
