//! cpal driver adapter: binds a [`ShimState`] to a real device callback.
//!
//! # Design constraints
//!
//! The cpal data callback runs on an OS audio thread at elevated priority.
//! The closure built here only forwards to [`ShimState::process`], which
//! neither allocates, locks nor logs. Stream errors reported by cpal arrive
//! on a separate error callback and are logged there.
//!
//! cpal has no single duplex callback, so a stream bridges one direction: an
//! output stream needs a playback-only shim, an input stream a capture-only
//! one. The device runs in the shim's own sample type (no format
//! conversion): the default config is used when its format matches,
//! otherwise the first supported config with that format and channel count.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). Create and drop an [`AudioStream`] on the same thread.

pub mod device;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SizedSample, Stream, StreamConfig, StreamInstant,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

use crate::{
    buffering::Sample,
    error::{Result, ShimError},
    shim::ShimState,
};
#[cfg(feature = "audio-cpal")]
use crate::shim::{CallbackInfo, StreamTime};

/// Handle to an open device stream driving a shim.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread.
pub struct AudioStream {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    stream: Stream,
    /// Name of the opened device.
    pub device_name: String,
    /// Device sample rate (Hz).
    pub sample_rate: u32,
    /// Interleaved samples per frame.
    pub channels: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

#[cfg(feature = "audio-cpal")]
impl AudioStream {
    /// Open an output device (preferred by name, else default, else first)
    /// whose callback plays the shim's output ring.
    ///
    /// The stream is built but playback only starts with [`AudioStream::play`],
    /// so the consumer can queue frames first.
    ///
    /// # Errors
    /// `DirectionMismatch` unless `state` is playback-only; `NoDefaultDevice`,
    /// `AudioDevice`, `UnsupportedSampleFormat` (no config in `S`'s format
    /// with the shim's channel count) or `AudioStream` on device failures.
    pub fn open_output<S: Sample + SizedSample>(
        mut state: ShimState<S>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        if state.input_channels() != 0 || state.output_channels() == 0 {
            return Err(ShimError::DirectionMismatch(
                "output streams need a playback-only shim".into(),
            ));
        }
        let device = select_device(Direction::Output, preferred_device_name)?;
        let (config, device_name) =
            stream_config::<S>(&device, Direction::Output, state.output_channels())?;

        let channels = config.channels as usize;
        let mut first_callback: Option<StreamInstant> = None;
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [S], info: &cpal::OutputCallbackInfo| {
                    let ts = info.timestamp();
                    let origin = *first_callback.get_or_insert(ts.callback);
                    let period = CallbackInfo {
                        time: StreamTime {
                            input_adc: 0.0,
                            current: seconds_since(ts.callback, origin),
                            output_dac: seconds_since(ts.playback, origin),
                        },
                        ..CallbackInfo::default()
                    };
                    let frames = data.len() / channels;
                    state.process(&[], data, frames, &period);
                },
                |err| error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| ShimError::AudioStream(e.to_string()))?;

        Ok(Self {
            stream,
            device_name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }

    /// Open an input device whose callback fills the shim's input ring.
    ///
    /// # Errors
    /// As [`AudioStream::open_output`], with a capture-only shim required.
    pub fn open_input<S: Sample + SizedSample>(
        mut state: ShimState<S>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        if state.output_channels() != 0 || state.input_channels() == 0 {
            return Err(ShimError::DirectionMismatch(
                "input streams need a capture-only shim".into(),
            ));
        }
        let device = select_device(Direction::Input, preferred_device_name)?;
        let (config, device_name) =
            stream_config::<S>(&device, Direction::Input, state.input_channels())?;

        let channels = config.channels as usize;
        let mut first_callback: Option<StreamInstant> = None;
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[S], info: &cpal::InputCallbackInfo| {
                    let ts = info.timestamp();
                    let origin = *first_callback.get_or_insert(ts.callback);
                    let period = CallbackInfo {
                        time: StreamTime {
                            input_adc: seconds_since(ts.capture, origin),
                            current: seconds_since(ts.callback, origin),
                            output_dac: 0.0,
                        },
                        ..CallbackInfo::default()
                    };
                    let frames = data.len() / channels;
                    state.process(data, &mut [], frames, &period);
                },
                |err| error!("audio input stream error: {err}"),
                None,
            )
            .map_err(|e| ShimError::AudioStream(e.to_string()))?;

        Ok(Self {
            stream,
            device_name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }

    /// Start (or resume) the device callback.
    pub fn play(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| ShimError::AudioStream(e.to_string()))?;
        info!(device = self.device_name.as_str(), "stream playing");
        Ok(())
    }

    /// Pause the device callback. The shim keeps its contents.
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| ShimError::AudioStream(e.to_string()))
    }
}

/// Resolve a device by preferred name, otherwise fall back to the default
/// device and then the first available one.
#[cfg(feature = "audio-cpal")]
fn select_device(
    direction: Direction,
    preferred_device_name: Option<&str>,
) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let kind = direction.as_str();

    let devices = || -> std::result::Result<Vec<cpal::Device>, cpal::DevicesError> {
        Ok(match direction {
            Direction::Input => host.input_devices()?.collect(),
            Direction::Output => host.output_devices()?.collect(),
        })
    };

    if let Some(preferred_name) = preferred_device_name {
        match devices() {
            Ok(devices) => {
                let found = devices.into_iter().find(|device| {
                    device
                        .name()
                        .map(|name| name == preferred_name)
                        .unwrap_or(false)
                });
                if let Some(device) = found {
                    return Ok(device);
                }
                warn!("preferred {kind} device '{preferred_name}' not found, falling back");
            }
            Err(e) => {
                warn!("failed to list {kind} devices while resolving preference: {e}");
            }
        }
    }

    let default = match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    };
    if let Some(device) = default {
        return Ok(device);
    }

    let fallback = devices()
        .map_err(|e| ShimError::AudioDevice(e.to_string()))?
        .into_iter()
        .next()
        .ok_or(ShimError::NoDefaultDevice(kind))?;
    warn!("no default {kind} device, falling back to first available");
    Ok(fallback)
}

/// One supported device configuration, reduced to what config selection
/// looks at.
#[cfg(feature = "audio-cpal")]
#[derive(Debug, Clone, Copy, PartialEq)]
struct ConfigCandidate {
    format: SampleFormat,
    channels: u16,
    min_rate: u32,
    max_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl From<&cpal::SupportedStreamConfigRange> for ConfigCandidate {
    fn from(range: &cpal::SupportedStreamConfigRange) -> Self {
        Self {
            format: range.sample_format(),
            channels: range.channels(),
            min_rate: range.min_sample_rate().0,
            max_rate: range.max_sample_rate().0,
        }
    }
}

/// Pick the sample rate for a `format` stream of `channels` samples per
/// frame.
///
/// The device default wins when it already speaks `format`. Otherwise the
/// first candidate with matching format and channel count is used, at the
/// default rate clamped into its supported range.
#[cfg(feature = "audio-cpal")]
fn choose_sample_rate(
    format: SampleFormat,
    channels: u16,
    default_format: SampleFormat,
    default_rate: u32,
    candidates: &[ConfigCandidate],
) -> Option<u32> {
    if default_format == format {
        return Some(default_rate);
    }
    candidates
        .iter()
        .find(|c| c.format == format && c.channels == channels)
        .map(|c| default_rate.clamp(c.min_rate, c.max_rate))
}

/// Build the stream config for `channels`-wide frames of `S`.
#[cfg(feature = "audio-cpal")]
fn stream_config<S: SizedSample>(
    device: &cpal::Device,
    direction: Direction,
    channels: usize,
) -> Result<(StreamConfig, String)> {
    let device_name = device.name().unwrap_or_default();
    let channels = u16::try_from(channels)
        .map_err(|_| ShimError::AudioDevice(format!("{channels} channels is out of range")))?;

    let default = match direction {
        Direction::Input => device.default_input_config(),
        Direction::Output => device.default_output_config(),
    }
    .map_err(|e| ShimError::AudioDevice(e.to_string()))?;

    let candidates: Vec<ConfigCandidate> = if default.sample_format() == S::FORMAT {
        Vec::new()
    } else {
        let ranges = match direction {
            Direction::Input => device
                .supported_input_configs()
                .map(|ranges| ranges.map(|r| ConfigCandidate::from(&r)).collect()),
            Direction::Output => device
                .supported_output_configs()
                .map(|ranges| ranges.map(|r| ConfigCandidate::from(&r)).collect()),
        };
        ranges.map_err(|e| ShimError::AudioDevice(e.to_string()))?
    };

    let sample_rate = choose_sample_rate(
        S::FORMAT,
        channels,
        default.sample_format(),
        default.sample_rate().0,
        &candidates,
    )
    .ok_or_else(|| {
        ShimError::UnsupportedSampleFormat(format!(
            "{device_name} offers no {:?} config with {channels} channels (default is {:?})",
            S::FORMAT,
            default.sample_format()
        ))
    })?;

    if default.sample_format() != S::FORMAT {
        warn!(
            device = device_name.as_str(),
            default_format = ?default.sample_format(),
            "device default format differs, using a supported {:?} config",
            S::FORMAT
        );
    }
    info!(
        device = device_name.as_str(),
        sample_rate,
        channels,
        format = ?S::FORMAT,
        "audio config selected"
    );

    Ok((
        StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        },
        device_name,
    ))
}

#[cfg(feature = "audio-cpal")]
fn seconds_since(instant: StreamInstant, origin: StreamInstant) -> f64 {
    instant
        .duration_since(&origin)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioStream {
    pub fn open_output<S: Sample>(
        _state: ShimState<S>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(ShimError::AudioStream(format!(
            "compiled without audio-cpal feature ({} unavailable)",
            Direction::Output.as_str()
        )))
    }

    pub fn open_input<S: Sample>(
        _state: ShimState<S>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(ShimError::AudioStream(format!(
            "compiled without audio-cpal feature ({} unavailable)",
            Direction::Input.as_str()
        )))
    }

    pub fn play(&self) -> Result<()> {
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(all(test, feature = "audio-cpal"))]
mod tests {
    use super::*;

    fn candidate(
        format: SampleFormat,
        channels: u16,
        min_rate: u32,
        max_rate: u32,
    ) -> ConfigCandidate {
        ConfigCandidate {
            format,
            channels,
            min_rate,
            max_rate,
        }
    }

    #[test]
    fn matching_default_format_keeps_default_rate() {
        let rate = choose_sample_rate(SampleFormat::F32, 2, SampleFormat::F32, 48_000, &[]);
        assert_eq!(rate, Some(48_000));
    }

    #[test]
    fn i16_default_device_still_yields_an_f32_config() {
        let candidates = [
            candidate(SampleFormat::I16, 2, 8_000, 192_000),
            candidate(SampleFormat::F32, 1, 8_000, 192_000),
            candidate(SampleFormat::F32, 2, 44_100, 96_000),
        ];
        let rate =
            choose_sample_rate(SampleFormat::F32, 2, SampleFormat::I16, 48_000, &candidates);
        assert_eq!(rate, Some(48_000));
    }

    #[test]
    fn default_rate_is_clamped_into_the_candidate_range() {
        let candidates = [candidate(SampleFormat::F32, 2, 8_000, 32_000)];
        let rate =
            choose_sample_rate(SampleFormat::F32, 2, SampleFormat::U16, 48_000, &candidates);
        assert_eq!(rate, Some(32_000));
    }

    #[test]
    fn shim_sample_type_selects_its_own_format() {
        // an i16 shim bridges an i16 device without conversion
        let rate = choose_sample_rate(
            <i16 as SizedSample>::FORMAT,
            2,
            SampleFormat::I16,
            44_100,
            &[],
        );
        assert_eq!(rate, Some(44_100));
    }

    #[test]
    fn no_matching_format_is_rejected() {
        let candidates = [
            candidate(SampleFormat::I16, 2, 8_000, 48_000),
            candidate(SampleFormat::F32, 6, 8_000, 48_000),
        ];
        let rate =
            choose_sample_rate(SampleFormat::F32, 2, SampleFormat::I16, 48_000, &candidates);
        assert_eq!(rate, None);
    }
}
