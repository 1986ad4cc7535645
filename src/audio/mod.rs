//! Audio input
//!
//! Fixed-size 16-bit mono frames pulled one at a time by the recognition loop.

pub mod capture;

use crate::error::DeviceError;
use std::time::Duration;

pub use capture::CpalSource;

/// One fixed-length block of 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Blocking producer of audio frames.
///
/// `read_frame` blocks until a full frame is available. Errors for which
/// [`DeviceError::is_fatal`] is false may be retried.
pub trait AudioSource {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError>;

    fn sample_rate(&self) -> u32;

    fn frame_size(&self) -> usize;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        (**self).read_frame()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn frame_size(&self) -> usize {
        (**self).frame_size()
    }
}
