//! Scripted Audio Source for Testing
//!
//! Replays a fixed sequence of frames and read errors.

use hearken::audio::{AudioFrame, AudioSource};
use hearken::error::DeviceError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const FRAME_SIZE: usize = 160;
pub const SAMPLE_RATE: u32 = 16000;

pub struct ScriptedSource {
    script: VecDeque<Result<AudioFrame, DeviceError>>,
    /// Number of read_frame calls, including failed ones
    pub reads: usize,
    /// Raise this flag once `reads` reaches the given count
    interrupt_after: Option<(usize, Arc<AtomicBool>)>,
    /// Sleep before every read, like a live device
    interval: Option<Duration>,
}

impl ScriptedSource {
    /// `count` frames of silence
    pub fn frames(count: usize) -> Self {
        let mut source = Self {
            script: VecDeque::new(),
            reads: 0,
            interrupt_after: None,
            interval: None,
        };
        source.then_frames(count);
        source
    }

    pub fn then_frames(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.script
                .push_back(Ok(AudioFrame::new(vec![0i16; FRAME_SIZE], SAMPLE_RATE)));
        }
        self
    }

    pub fn then_error(&mut self, err: DeviceError) -> &mut Self {
        self.script.push_back(Err(err));
        self
    }

    pub fn with_interval(&mut self, interval: Duration) -> &mut Self {
        self.interval = Some(interval);
        self
    }

    pub fn interrupt_after(&mut self, reads: usize, flag: Arc<AtomicBool>) -> &mut Self {
        self.interrupt_after = Some((reads, flag));
        self
    }
}

impl AudioSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        self.reads += 1;
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        if let Some((after, flag)) = &self.interrupt_after {
            if self.reads >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(DeviceError::Disconnected("script exhausted".into())))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn frame_size(&self) -> usize {
        FRAME_SIZE
    }
}
