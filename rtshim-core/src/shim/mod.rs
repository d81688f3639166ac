//! Shim state: the bundle the real-time callback works on.
//!
//! ## Setup
//!
//! ```text
//! ShimConfig ──► create_shim::<S>(&config, notifier)
//!                   ├─► ShimState<S>  → moved into / borrowed by the driver callback
//!                   └─► ShimHost<S>   → kept by the consumer thread
//! ```
//!
//! `create_shim` validates the config (including the version contract) and
//! performs every allocation the shim will ever make. After that, the
//! callback only moves frames between pre-sized rings.
//!
//! ## Directions
//!
//! A direction with zero channels is disabled: it has no ring, it never
//! reports a shortfall, and its channel is never signalled. Synchronized
//! transfer only applies when both directions are enabled.

pub mod callback;
pub mod diagnostics;
pub mod error_channel;
pub mod version;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    buffering::{RingBuffer, RingConsumer, RingProducer, Sample},
    error::{Result, ShimError},
    notify::{Channel, Notifier},
};

pub use callback::{process_callback, CallbackInfo, CallbackResult, StatusFlags, StreamTime};
pub use diagnostics::{DiagnosticsSnapshot, ShimDiagnostics};
pub use error_channel::{error_channel, ErrorChannel, ErrorKind, ErrorReceiver, Severity};
pub use version::{ensure_compatible, version, SHIM_VERSION};

/// Setup-time configuration of a shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ShimConfig {
    /// Interleaved samples per input frame. `0` disables capture.
    pub input_channels: u16,
    /// Interleaved samples per output frame. `0` disables playback.
    pub output_channels: u16,
    /// Input ring capacity in frames. Power of two recommended.
    pub input_capacity: usize,
    /// Output ring capacity in frames. Power of two recommended.
    pub output_capacity: usize,
    /// Error channel capacity in records (at least 2).
    pub error_capacity: usize,
    /// Keep input and output frame-aligned by capping both transfers to the
    /// smaller of the two each period.
    pub sync: bool,
    /// Shim version the consumer was built against.
    pub protocol_version: u32,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            input_channels: 2,
            output_channels: 2,
            input_capacity: 4096,
            output_capacity: 4096,
            error_capacity: 16,
            sync: false,
            protocol_version: SHIM_VERSION,
        }
    }
}

impl ShimConfig {
    /// Output-only shim with `channels` interleaved samples per frame.
    pub fn playback(channels: u16) -> Self {
        Self {
            input_channels: 0,
            output_channels: channels,
            ..Self::default()
        }
    }

    /// Input-only shim with `channels` interleaved samples per frame.
    pub fn capture(channels: u16) -> Self {
        Self {
            input_channels: channels,
            output_channels: 0,
            ..Self::default()
        }
    }

    /// Check the config without allocating anything.
    ///
    /// # Errors
    /// `VersionMismatch`, `NoDirections`, `ZeroCapacity` or
    /// `ErrorChannelTooSmall`.
    pub fn validate(&self) -> Result<()> {
        ensure_compatible(self.protocol_version)?;
        if self.input_channels == 0 && self.output_channels == 0 {
            return Err(ShimError::NoDirections);
        }
        if self.input_channels > 0 && self.input_capacity == 0 {
            return Err(ShimError::ZeroCapacity { buffer: "input" });
        }
        if self.output_channels > 0 && self.output_capacity == 0 {
            return Err(ShimError::ZeroCapacity { buffer: "output" });
        }
        if self.error_capacity < error_channel::MIN_ERROR_CAPACITY {
            return Err(ShimError::ErrorChannelTooSmall {
                capacity: self.error_capacity,
            });
        }
        Ok(())
    }

    fn is_duplex(&self) -> bool {
        self.input_channels > 0 && self.output_channels > 0
    }
}

/// Real-time side of a shim. Driven by [`ShimState::process`] once per period.
pub struct ShimState<S> {
    input: Option<RingProducer<S>>,
    output: Option<RingConsumer<S>>,
    errors: ErrorChannel,
    sync: bool,
    notifier: Option<Arc<dyn Notifier>>,
    version: u32,
    diagnostics: Arc<ShimDiagnostics>,
}

/// Consumer side of a shim: the opposite ends of every ring.
pub struct ShimHost<S> {
    /// Captured frames, if capture is enabled.
    pub input: Option<RingConsumer<S>>,
    /// Frames queued for playback, if playback is enabled.
    pub output: Option<RingProducer<S>>,
    pub errors: ErrorReceiver,
    pub diagnostics: Arc<ShimDiagnostics>,
}

/// Validate `config` and allocate a connected shim.
///
/// `notifier` is shared by the callback (input/output channels) and the error
/// channel. With `None` the consumer has to poll.
///
/// # Errors
/// Any [`ShimConfig::validate`] failure; nothing is allocated in that case.
pub fn create_shim<S: Sample>(
    config: &ShimConfig,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<(ShimState<S>, ShimHost<S>)> {
    config.validate()?;

    let (input_tx, input_rx) =
        direction::<S>("input", config.input_channels, config.input_capacity)?;
    let (output_tx, output_rx) =
        direction::<S>("output", config.output_channels, config.output_capacity)?;
    let (errors, error_rx) = error_channel(config.error_capacity, notifier.clone())?;

    if notifier.is_none() {
        warn!("no notifier configured, consumer must poll the shim");
    }
    let sync = config.sync && config.is_duplex();
    if config.sync && !sync {
        warn!("sync requested on a one-directional shim, ignoring");
    }

    let diagnostics = Arc::new(ShimDiagnostics::default());
    info!(
        version = config.protocol_version,
        input_channels = config.input_channels,
        output_channels = config.output_channels,
        input_capacity = config.input_capacity,
        output_capacity = config.output_capacity,
        error_capacity = config.error_capacity,
        sync,
        "shim created"
    );

    let state = ShimState {
        input: input_tx,
        output: output_rx,
        errors,
        sync,
        notifier,
        version: config.protocol_version,
        diagnostics: Arc::clone(&diagnostics),
    };
    let host = ShimHost {
        input: input_rx,
        output: output_tx,
        errors: error_rx,
        diagnostics,
    };
    Ok((state, host))
}

/// Allocate one direction's ring, or nothing when it is disabled.
fn direction<S: Sample>(
    buffer: &'static str,
    channels: u16,
    capacity: usize,
) -> Result<(Option<RingProducer<S>>, Option<RingConsumer<S>>)> {
    if channels == 0 {
        return Ok((None, None));
    }
    if !capacity.is_power_of_two() {
        warn!(buffer, capacity, "ring capacity is not a power of two");
    }
    let (tx, rx) = RingBuffer::named(buffer, capacity, channels as usize)?.split();
    Ok((Some(tx), Some(rx)))
}

impl<S: Sample> ShimState<S> {
    /// Samples per input frame, `0` when capture is disabled.
    pub fn input_channels(&self) -> usize {
        self.input.as_ref().map_or(0, RingProducer::frame_len)
    }

    /// Samples per output frame, `0` when playback is disabled.
    pub fn output_channels(&self) -> usize {
        self.output.as_ref().map_or(0, RingConsumer::frame_len)
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn diagnostics(&self) -> &Arc<ShimDiagnostics> {
        &self.diagnostics
    }

    #[inline]
    fn signal(&self, channel: Channel) {
        if let Some(notifier) = &self.notifier {
            notifier.signal(channel);
        }
    }
}

impl<S: Sample> ShimHost<S> {
    /// Pop up to `n` captured frames into `dest`. `0` when capture is disabled.
    pub fn read_input(&mut self, dest: &mut [S], n: usize) -> usize {
        self.input.as_mut().map_or(0, |ring| ring.read(dest, n))
    }

    /// Queue up to `n` frames from `source` for playback. `0` when playback
    /// is disabled.
    pub fn write_output(&mut self, source: &[S], n: usize) -> usize {
        self.output.as_mut().map_or(0, |ring| ring.write(source, n))
    }

    /// Captured frames waiting to be read.
    pub fn input_available(&self) -> usize {
        self.input.as_ref().map_or(0, RingConsumer::read_available)
    }

    /// Room for playback frames.
    pub fn output_writable(&self) -> usize {
        self.output.as_ref().map_or(0, RingProducer::write_available)
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;

    #[test]
    fn default_config_is_valid() {
        assert!(ShimConfig::default().validate().is_ok());
        assert!(ShimConfig::playback(2).validate().is_ok());
        assert!(ShimConfig::capture(1).validate().is_ok());
    }

    #[test]
    fn version_mismatch_prevents_setup() {
        let config = ShimConfig {
            protocol_version: SHIM_VERSION + 1,
            ..ShimConfig::default()
        };
        let result = create_shim::<f32>(&config, None);
        assert!(matches!(result, Err(ShimError::VersionMismatch { .. })));
    }

    #[test]
    fn rejects_shim_without_directions() {
        let config = ShimConfig {
            input_channels: 0,
            output_channels: 0,
            ..ShimConfig::default()
        };
        assert!(matches!(config.validate(), Err(ShimError::NoDirections)));
    }

    #[test]
    fn rejects_zero_capacity_on_enabled_direction() {
        let config = ShimConfig {
            output_capacity: 0,
            ..ShimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShimError::ZeroCapacity { buffer: "output" })
        ));

        // disabled direction: capacity is irrelevant
        let config = ShimConfig {
            output_capacity: 0,
            ..ShimConfig::capture(2)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_error_channel_without_headroom() {
        let config = ShimConfig {
            error_capacity: 1,
            ..ShimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShimError::ErrorChannelTooSmall { capacity: 1 })
        ));
    }

    #[test]
    fn halves_are_wired_to_each_other() {
        let config = ShimConfig {
            input_channels: 1,
            output_channels: 2,
            input_capacity: 8,
            output_capacity: 16,
            ..ShimConfig::default()
        };
        let (state, mut host) =
            create_shim::<i16>(&config, Some(Arc::new(NoopNotifier))).unwrap();

        assert_eq!(state.input_channels(), 1);
        assert_eq!(state.output_channels(), 2);
        assert_eq!(state.version(), SHIM_VERSION);
        assert_eq!(host.input_available(), 0);
        assert_eq!(host.output_writable(), 16);

        assert_eq!(host.write_output(&[1, 2, 3, 4], 2), 2);
        assert_eq!(state.output.as_ref().unwrap().read_available(), 2);
    }

    #[test]
    fn sync_is_dropped_for_one_directional_shims() {
        let config = ShimConfig {
            sync: true,
            ..ShimConfig::playback(2)
        };
        let (state, _host) = create_shim::<f32>(&config, None).unwrap();
        assert!(!state.is_synchronized());
    }

    #[test]
    fn disabled_directions_have_no_rings() {
        let (state, mut host) = create_shim::<f32>(&ShimConfig::playback(2), None).unwrap();
        assert_eq!(state.input_channels(), 0);
        assert!(host.input.is_none());
        let mut dest = [0.0f32; 4];
        assert_eq!(host.read_input(&mut dest, 2), 0);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ShimConfig =
            serde_json::from_str(r#"{ "outputChannels": 1, "sync": true }"#).unwrap();
        assert_eq!(config.output_channels, 1);
        assert!(config.sync);
        assert_eq!(config.input_channels, 2);
        assert_eq!(config.protocol_version, SHIM_VERSION);
    }
}
