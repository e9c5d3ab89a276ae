//! [`AudioDevice`] implementation on top of `cpal`.
//!
//! cpal is callback driven; [`CpalDevice`] turns it into the blocking
//! read/write interface the pipeline expects:
//!
//! ```text
//! mic (any channels, f32/i16/u16, device rate)
//!   └─▶ callback: downmix to mono f32 ─▶ mpsc ─▶ read_chunk
//!                                                 └─ resample to format rate ─▶ i16
//!
//! write_all: i16 ─▶ f32 ─▶ resample to device rate ─▶ queue
//!   └─▶ callback: copy each sample to every channel in the device's type
//! ```
//!
//! Both streams use the device's default config.  `read_chunk` gives up
//! when the stream reports an error or stays silent for [`READ_TIMEOUT`].
//! `is_idle` turns true when an output callback finds nothing left to play.
//!
//! Streams are built lazily on first open and paused (not dropped) on stop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use crate::audio::device::{AudioDevice, AudioFormat, DeviceError};
use crate::pitch::shifter::{resample, ShiftError};

/// How often `write_all` checks whether the output callback has consumed
/// the queue.
const WRITE_POLL: Duration = Duration::from_millis(10);

/// How long `read_chunk` waits on the channel before re-checking for a
/// stream fault.
const READ_POLL: Duration = Duration::from_millis(100);

/// `read_chunk` fails after this long without any input data.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared slot for the last error reported by a cpal error callback.
type StreamFault = Arc<Mutex<Option<String>>>;

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32_768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

/// Average each interleaved frame of `data` into one mono sample.  A
/// trailing partial frame is averaged over the channels it has.
fn append_downmixed<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, convert: F)
where
    T: Copy,
    F: Fn(T) -> f32,
{
    let channels = channels.max(1);
    if channels == 1 {
        buf.extend(data.iter().copied().map(convert));
        return;
    }
    buf.extend(data.chunks(channels).map(|frame| {
        frame.iter().copied().map(&convert).sum::<f32>() / frame.len() as f32
    }));
}

/// Resample `block` from `from` Hz to `to` Hz and pin it to exactly `len`
/// samples, repeating the last sample if it came up short.
fn convert_rate(block: Vec<f32>, from: u32, to: u32, len: usize) -> Result<Vec<f32>, ShiftError> {
    let mut out = if from == to {
        block
    } else {
        resample(&block, to as f64 / from as f64)?
    };
    let pad = out.last().copied().unwrap_or(0.0);
    out.resize(len, pad);
    Ok(out)
}

/// Device-rate samples needed to produce `frames` samples at `target` Hz.
fn device_frames(frames: usize, device: u32, target: u32) -> usize {
    if device == target {
        return frames;
    }
    ((frames as u64 * device as u64).div_ceil(target.max(1) as u64)) as usize
}

// ---------------------------------------------------------------------------
// Stream faults
// ---------------------------------------------------------------------------

fn take_fault(fault: &StreamFault) -> Option<String> {
    fault.lock().ok().and_then(|mut f| f.take())
}

fn error_callback(direction: &'static str, fault: StreamFault) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err: cpal::StreamError| {
        log::error!("cpal {direction} stream error: {err}");
        if let Ok(mut slot) = fault.lock() {
            *slot = Some(err.to_string());
        }
    }
}

/// Pull blocks from `rx` into `carry` until it holds `wanted` samples.
///
/// Fails with [`DeviceError::Read`] when a fault is reported, the stream
/// disconnects, or nothing arrives for `timeout`.
fn fill_carry(
    rx: &mpsc::Receiver<Vec<f32>>,
    carry: &mut Vec<f32>,
    wanted: usize,
    fault: &StreamFault,
    poll: Duration,
    timeout: Duration,
) -> Result<(), DeviceError> {
    let mut last_data = Instant::now();
    while carry.len() < wanted {
        if let Some(fault) = take_fault(fault) {
            return Err(DeviceError::Read(fault));
        }
        match rx.recv_timeout(poll) {
            Ok(block) => {
                carry.extend_from_slice(&block);
                last_data = Instant::now();
            }
            Err(RecvTimeoutError::Timeout) => {
                if last_data.elapsed() >= timeout {
                    return Err(DeviceError::Read(format!(
                        "no input data for {} ms",
                        timeout.as_millis()
                    )));
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DeviceError::Read("input stream disconnected".into()));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A device's default stream config and the sample type it delivers.
#[derive(Debug, Clone)]
struct StreamSetup {
    config: cpal::StreamConfig,
    sample_format: SampleFormat,
}

impl StreamSetup {
    fn new(supported: cpal::SupportedStreamConfig) -> Self {
        Self {
            sample_format: supported.sample_format(),
            config: supported.config(),
        }
    }

    fn rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

struct InputStream {
    stream: cpal::Stream,
    rx: mpsc::Receiver<Vec<f32>>,
    /// Mono device-rate samples received but not yet consumed.
    carry: Vec<f32>,
}

struct OutputStream {
    stream: cpal::Stream,
}

fn input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
    fault: StreamFault,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut mono = Vec::with_capacity(data.len() / channels.max(1) + 1);
            append_downmixed(&mut mono, data, channels, |s| f32::from_sample(s));
            // Receiver dropped means the device is closing.
            let _ = tx.send(mono);
        },
        error_callback("input", fault),
        None,
    )?;
    Ok(stream)
}

fn output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    pending: Arc<Mutex<VecDeque<f32>>>,
    drained: Arc<AtomicBool>,
    fault: StreamFault,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let Ok(mut queue) = pending.lock() else {
                data.fill(T::EQUILIBRIUM);
                return;
            };
            let was_empty = queue.is_empty();
            for frame in data.chunks_mut(channels) {
                frame.fill(T::from_sample(queue.pop_front().unwrap_or(0.0)));
            }
            if was_empty {
                drained.store(true, Ordering::Release);
            }
        },
        error_callback("output", fault),
        None,
    )?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// CpalDevice
// ---------------------------------------------------------------------------

/// Default-host microphone and speaker, exchanged as mono 16-bit at the
/// configured rate whatever the hardware runs at.
pub struct CpalDevice {
    input_device: cpal::Device,
    output_device: cpal::Device,
    input_setup: StreamSetup,
    output_setup: StreamSetup,
    format: AudioFormat,
    input: Option<InputStream>,
    output: Option<OutputStream>,
    /// Mono samples at the output device rate.
    pending: Arc<Mutex<VecDeque<f32>>>,
    drained: Arc<AtomicBool>,
    fault: StreamFault,
    closed: bool,
}

// `cpal::Stream` is not `Send` on every platform.  A `CpalDevice` is only
// ever used by one thread at a time (the controller keeps it behind a
// mutex), and the streams are never touched outside `&mut self` methods.
// SAFETY: no stream handle is accessed concurrently from two threads.
unsafe impl Send for CpalDevice {}

impl CpalDevice {
    /// Open the system default input and output devices.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NoInputDevice`] / [`DeviceError::NoOutputDevice`] when
    /// the default host has no such device, [`DeviceError::DefaultConfig`]
    /// when a device cannot report its default stream config.
    pub fn new(format: AudioFormat) -> Result<Self, DeviceError> {
        Self::with_devices(format, None, None)
    }

    /// Open devices by name, falling back to the host default when the name
    /// is `None` or not found.
    pub fn with_devices(
        format: AudioFormat,
        input_name: Option<&str>,
        output_name: Option<&str>,
    ) -> Result<Self, DeviceError> {
        let host = cpal::default_host();

        let input_device = input_name
            .and_then(|name| find_by_name(host.input_devices().ok(), name))
            .or_else(|| host.default_input_device())
            .ok_or(DeviceError::NoInputDevice)?;
        let output_device = output_name
            .and_then(|name| find_by_name(host.output_devices().ok(), name))
            .or_else(|| host.default_output_device())
            .ok_or(DeviceError::NoOutputDevice)?;

        let input_setup = StreamSetup::new(input_device.default_input_config()?);
        let output_setup = StreamSetup::new(output_device.default_output_config()?);

        log::info!(
            "audio devices: in={:?} ({} ch, {} Hz, {:?}) out={:?} ({} ch, {} Hz, {:?})",
            input_device.name().unwrap_or_default(),
            input_setup.config.channels,
            input_setup.rate(),
            input_setup.sample_format,
            output_device.name().unwrap_or_default(),
            output_setup.config.channels,
            output_setup.rate(),
            output_setup.sample_format,
        );
        for (direction, rate) in [("input", input_setup.rate()), ("output", output_setup.rate())] {
            if rate != format.sample_rate {
                log::info!(
                    "{direction} runs at {rate} Hz; resampling to/from {} Hz",
                    format.sample_rate
                );
            }
        }

        Ok(Self {
            input_device,
            output_device,
            input_setup,
            output_setup,
            format,
            input: None,
            output: None,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            drained: Arc::new(AtomicBool::new(true)),
            fault: Arc::new(Mutex::new(None)),
            closed: false,
        })
    }

    fn take_fault(&self) -> Option<String> {
        take_fault(&self.fault)
    }

    fn build_input(&self) -> Result<InputStream, DeviceError> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let fault = Arc::clone(&self.fault);
        let (device, config) = (&self.input_device, &self.input_setup.config);

        let stream = match self.input_setup.sample_format {
            SampleFormat::F32 => input_stream::<f32>(device, config, tx, fault)?,
            SampleFormat::I16 => input_stream::<i16>(device, config, tx, fault)?,
            SampleFormat::U16 => input_stream::<u16>(device, config, tx, fault)?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };

        Ok(InputStream {
            stream,
            rx,
            carry: Vec::new(),
        })
    }

    fn build_output(&self) -> Result<OutputStream, DeviceError> {
        let pending = Arc::clone(&self.pending);
        let drained = Arc::clone(&self.drained);
        let fault = Arc::clone(&self.fault);
        let (device, config) = (&self.output_device, &self.output_setup.config);

        let stream = match self.output_setup.sample_format {
            SampleFormat::F32 => output_stream::<f32>(device, config, pending, drained, fault)?,
            SampleFormat::I16 => output_stream::<i16>(device, config, pending, drained, fault)?,
            SampleFormat::U16 => output_stream::<u16>(device, config, pending, drained, fault)?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };

        Ok(OutputStream { stream })
    }
}

fn find_by_name<I>(devices: Option<I>, name: &str) -> Option<cpal::Device>
where
    I: Iterator<Item = cpal::Device>,
{
    let found = devices?.find(|d| d.name().map(|n| n == name).unwrap_or(false));
    if found.is_none() {
        log::warn!("audio device {name:?} not found; using default");
    }
    found
}

impl AudioDevice for CpalDevice {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn open_input(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        if self.input.is_none() {
            self.input = Some(self.build_input()?);
        }
        let _ = self.take_fault();
        if let Some(input) = self.input.as_mut() {
            // Discard anything captured while the stream was paused.
            while input.rx.try_recv().is_ok() {}
            input.carry.clear();
            input.stream.play()?;
        }
        Ok(())
    }

    fn stop_input(&mut self) {
        if let Some(input) = &self.input {
            if let Err(e) = input.stream.pause() {
                log::warn!("failed to pause input stream: {e}");
            }
        }
    }

    fn read_chunk(&mut self, frames: usize) -> Result<Vec<i16>, DeviceError> {
        let device_rate = self.input_setup.rate();
        let target_rate = self.format.sample_rate;
        let input = self.input.as_mut().ok_or(DeviceError::InputNotOpen)?;
        let wanted = device_frames(frames, device_rate, target_rate);

        fill_carry(
            &input.rx,
            &mut input.carry,
            wanted,
            &self.fault,
            READ_POLL,
            READ_TIMEOUT,
        )?;

        let rest = input.carry.split_off(wanted);
        let block = std::mem::replace(&mut input.carry, rest);
        let converted = convert_rate(block, device_rate, target_rate, frames)
            .map_err(|e| DeviceError::Read(e.to_string()))?;
        Ok(converted.into_iter().map(f32_to_i16).collect())
    }

    fn open_output(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        if self.output.is_none() {
            self.output = Some(self.build_output()?);
        }
        let _ = self.take_fault();
        if let Some(output) = &self.output {
            output.stream.play()?;
        }
        Ok(())
    }

    fn stop_output(&mut self) {
        if let Some(output) = &self.output {
            if let Err(e) = output.stream.pause() {
                log::warn!("failed to pause output stream: {e}");
            }
        }
    }

    fn write_all(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        if self.output.is_none() {
            return Err(DeviceError::OutputNotOpen);
        }

        let mono: Vec<f32> = samples.iter().copied().map(i16_to_f32).collect();
        let device_rate = self.output_setup.rate();
        let converted = if device_rate == self.format.sample_rate {
            mono
        } else {
            resample(&mono, device_rate as f64 / self.format.sample_rate as f64)
                .map_err(|e| DeviceError::Write(e.to_string()))?
        };

        {
            let mut queue = self
                .pending
                .lock()
                .map_err(|e| DeviceError::Write(format!("output queue poisoned: {e}")))?;
            queue.extend(converted);
            self.drained.store(false, Ordering::Release);
        }

        loop {
            if let Some(fault) = self.take_fault() {
                if let Ok(mut queue) = self.pending.lock() {
                    queue.clear();
                }
                return Err(DeviceError::Write(fault));
            }
            let remaining = self
                .pending
                .lock()
                .map(|q| q.len())
                .map_err(|e| DeviceError::Write(format!("output queue poisoned: {e}")))?;
            if remaining == 0 {
                return Ok(());
            }
            thread::sleep(WRITE_POLL);
        }
    }

    fn is_idle(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.stop_input();
        self.stop_output();
        self.input = None;
        self.output = None;
        if let Ok(mut queue) = self.pending.lock() {
            queue.clear();
        }
        self.drained.store(true, Ordering::Release);
        self.closed = true;
        log::info!("audio device closed");
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
