//! Mock TTS Engine for Testing
//!
//! Records all spoken text for verification.

use async_trait::async_trait;
use hearken::error::DispatchError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock TTS engine that records spoken text
#[derive(Debug, Clone)]
pub struct MockTts {
    /// All text that was "spoken"
    pub spoken: Arc<Mutex<Vec<String>>>,
    /// Simulate failure on every speak
    pub should_fail: Arc<Mutex<bool>>,
    /// Simulated playback time
    pub delay: Duration,
}

impl MockTts {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        let mock = Self::new();
        *mock.should_fail.lock().unwrap() = true;
        mock
    }

    /// Get all spoken phrases
    pub fn get_spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Count how often a phrase was spoken
    pub fn times_spoken(&self, text: &str) -> usize {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == text)
            .count()
    }
}

impl Default for MockTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl hearken::tts::TtsEngine for MockTts {
    async fn speak(&self, text: &str) -> Result<(), DispatchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.should_fail.lock().unwrap() {
            return Err(DispatchError::NotFound("mock".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
