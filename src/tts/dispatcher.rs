//! Response dispatcher
//!
//! The recognition thread hands phrases to a dedicated tokio task over a
//! bounded channel, so synthesis latency never stalls audio capture.

use super::TtsEngine;
use crate::error::DispatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counts reported when the dispatcher shuts down
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub spoken: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    spoken: AtomicUsize,
    failed: AtomicUsize,
    /// Phrases queued or being spoken
    pending: AtomicUsize,
}

/// Cheap, cloneable sender side used by the recognition loop.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<String>,
    counters: Arc<Counters>,
}

impl DispatchHandle {
    /// Queue a phrase without blocking.
    pub fn speak(&self, phrase: &str) -> Result<(), DispatchError> {
        // Counted before sending so the responder can never decrement first
        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.try_send(phrase.to_string()).map_err(|e| {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            match e {
                TrySendError::Full(phrase) => DispatchError::QueueFull(phrase),
                TrySendError::Closed(_) => DispatchError::Closed,
            }
        })
    }

    /// True while any accepted phrase has not finished playing.
    pub fn is_busy(&self) -> bool {
        self.counters.pending.load(Ordering::SeqCst) > 0
    }
}

/// Owner of the responder task
pub struct ResponseDispatcher {
    handle: DispatchHandle,
    worker: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for ResponseDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDispatcher").finish()
    }
}

impl ResponseDispatcher {
    /// Spawn the responder task on the current tokio runtime.
    ///
    /// Each phrase gets at most `speak_timeout` before the synthesis process
    /// is killed and the next phrase is taken.
    pub fn spawn(engine: Arc<dyn TtsEngine>, queue: usize, speak_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<String>(queue.max(1));
        let counters = Arc::new(Counters::default());
        let worker = tokio::spawn(Self::responder(
            engine,
            rx,
            speak_timeout,
            Arc::clone(&counters),
        ));

        Self {
            handle: DispatchHandle {
                tx,
                counters: Arc::clone(&counters),
            },
            worker,
            counters,
        }
    }

    async fn responder(
        engine: Arc<dyn TtsEngine>,
        mut rx: mpsc::Receiver<String>,
        speak_timeout: Duration,
        counters: Arc<Counters>,
    ) {
        debug!("🔊 Responder started ({})", engine.name());

        while let Some(phrase) = rx.recv().await {
            info!("🔊 Speaking: '{}'", phrase);
            let outcome = match tokio::time::timeout(speak_timeout, engine.speak(&phrase)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(speak_timeout.as_millis() as u64)),
            };
            match outcome {
                Ok(()) => {
                    counters.spoken.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!("❌ Could not speak '{}': {}", phrase, e);
                }
            }
            counters.pending.fetch_sub(1, Ordering::SeqCst);
        }

        debug!("🔇 Responder stopped");
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Queue a phrase without blocking.
    pub fn speak(&self, phrase: &str) -> Result<(), DispatchError> {
        self.handle.speak(phrase)
    }

    /// Close the queue and wait up to `grace` for queued phrases to finish.
    ///
    /// Handles still held elsewhere keep the queue open, so drop them first.
    pub async fn shutdown(self, grace: Duration) -> DispatchStats {
        let Self {
            handle,
            mut worker,
            counters,
        } = self;
        drop(handle);

        if tokio::time::timeout(grace, &mut worker).await.is_err() {
            warn!("⚠️ Responder did not drain within {:?}, aborting", grace);
            worker.abort();
        }

        DispatchStats {
            spoken: counters.spoken.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }
}
