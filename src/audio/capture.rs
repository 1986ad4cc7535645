//! Microphone capture using cpal

use super::{AudioFrame, AudioSource};
use crate::config::Config;
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Live input stream chopped into fixed-size frames.
///
/// The cpal callback hands chunks over a bounded channel. When the reader
/// falls behind, chunks are dropped in the callback and the next read
/// reports [`DeviceError::Overflow`].
pub struct CpalSource {
    _stream: Stream,
    frames: FrameAssembler,
}

/// Reassembles callback chunks of any size into frames of `frame_size`.
pub(crate) struct FrameAssembler {
    rx: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    frame_size: usize,
    sample_rate: u32,
    read_timeout: Duration,
    dropped: Arc<AtomicUsize>,
    lost: Arc<Mutex<Option<String>>>,
}

impl FrameAssembler {
    pub(crate) fn new(
        rx: Receiver<Vec<i16>>,
        frame_size: usize,
        sample_rate: u32,
        read_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            pending: Vec::with_capacity(frame_size * 2),
            frame_size,
            sample_rate,
            read_timeout,
            dropped: Arc::new(AtomicUsize::new(0)),
            lost: Arc::new(Mutex::new(None)),
        }
    }

    /// Counter the producer bumps for every sample it could not queue
    pub(crate) fn dropped_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.dropped)
    }

    /// Slot the producer fills when the device goes away
    pub(crate) fn lost_slot(&self) -> Arc<Mutex<Option<String>>> {
        Arc::clone(&self.lost)
    }

    /// Block until a full frame is available.
    ///
    /// Device loss and overflow are reported before any pending frame.
    pub(crate) fn next_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        loop {
            if let Some(reason) = self.lost.lock().ok().and_then(|l| l.clone()) {
                return Err(DeviceError::Disconnected(reason));
            }

            let dropped = self.dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                return Err(DeviceError::Overflow { dropped });
            }

            if self.pending.len() >= self.frame_size {
                return Ok(self.take_frame());
            }

            match self.rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DeviceError::Stalled(self.read_timeout.as_millis() as u64));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeviceError::Disconnected("capture stream closed".into()));
                }
            }
        }
    }

    fn take_frame(&mut self) -> AudioFrame {
        let rest = self.pending.split_off(self.frame_size);
        let samples = std::mem::replace(&mut self.pending, rest);
        AudioFrame::new(samples, self.sample_rate)
    }
}

impl CpalSource {
    /// Open the configured input device and start capturing.
    pub fn open(config: &Config) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = select_device(&host, config)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("🎙️ Using audio device: {}", device_name);

        let sample_format = device
            .default_input_config()
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::I16);

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.frame_size as u32),
        };

        let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(config.capture_queue_frames);
        let frames = FrameAssembler::new(
            rx,
            config.frame_size,
            config.sample_rate,
            Duration::from_millis(config.read_timeout_ms),
        );
        let dropped = frames.dropped_counter();
        let lost = frames.lost_slot();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tx, &dropped, &lost, |s| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            }),
            _ => build_stream::<i16>(&device, &stream_config, tx, &dropped, &lost, |s| s),
        }?;

        stream
            .play()
            .map_err(|e| DeviceError::Open(format!("{device_name}: {e}")))?;

        debug!(
            "Capture started: {} Hz, {} samples/frame, {:?} input",
            config.sample_rate, config.frame_size, sample_format
        );

        Ok(Self {
            _stream: stream,
            frames,
        })
    }
}

impl AudioSource for CpalSource {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        self.frames.next_frame()
    }

    fn sample_rate(&self) -> u32 {
        self.frames.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frames.frame_size
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        debug!("🎙️ Releasing audio device");
    }
}

fn select_device(host: &cpal::Host, config: &Config) -> Result<Device, DeviceError> {
    if let Some(idx) = config.device_index {
        return host
            .input_devices()
            .map_err(|e| DeviceError::NotFound(e.to_string()))?
            .nth(idx)
            .ok_or_else(|| DeviceError::NotFound(format!("device index {idx} out of range")));
    }

    if let Some(wanted) = &config.device_name {
        let devices = host
            .input_devices()
            .map_err(|e| DeviceError::NotFound(e.to_string()))?;
        for device in devices {
            if device.name().map(|n| &n == wanted).unwrap_or(false) {
                return Ok(device);
            }
        }
        return Err(DeviceError::NotFound(format!("no input device named '{wanted}'")));
    }

    host.default_input_device()
        .ok_or_else(|| DeviceError::NotFound("no default input device".into()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    tx: SyncSender<Vec<i16>>,
    dropped: &Arc<AtomicUsize>,
    lost: &Arc<Mutex<Option<String>>>,
    convert: fn(T) -> i16,
) -> Result<Stream, DeviceError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let dropped = Arc::clone(dropped);
    let lost_flag = Arc::clone(lost);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk: Vec<i16> = data.iter().map(|&s| convert(s)).collect();
                match tx.try_send(chunk) {
                    Ok(()) => {}
                    Err(TrySendError::Full(chunk)) => {
                        dropped.fetch_add(chunk.len(), Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            },
            move |err| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    error!("❌ Audio device disconnected");
                    if let Ok(mut lost) = lost_flag.lock() {
                        *lost = Some(err.to_string());
                    }
                }
                other => warn!("Audio stream error: {}", other),
            },
            None,
        )
        .map_err(|e| DeviceError::Open(e.to_string()))
}
