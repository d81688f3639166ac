//! # rtshim-core
//!
//! Real-time safe bridge between an audio driver callback and a
//! non-real-time consumer.
//!
//! ## Architecture
//!
//! ```text
//! driver thread                                   consumer thread
//! ─────────────                                   ───────────────
//! ShimState::process ──► input ring  ──────────►  ShimHost::read_input
//!        ▲               output ring ◄──────────  ShimHost::write_output
//!        │               error channel ────────►  ErrorMonitor (drain, log, broadcast)
//!        │
//!        └─ Notifier::signal(Input | Output | Error) after each write
//! ```
//!
//! The driver side never allocates, locks, logs or blocks. Everything that
//! may block (waiting for wake-ups, logging errors, fanning out events)
//! happens on the consumer side.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod error;
pub mod events;
pub mod monitor;
pub mod notify;
pub mod shim;

// Convenience re-exports for downstream crates
pub use audio::AudioStream;
pub use buffering::{RingBuffer, RingConsumer, RingProducer, Sample};
pub use error::{Result, ShimError};
pub use events::{ErrorTally, StreamErrorEvent};
pub use monitor::{ErrorMonitor, MonitorConfig};
pub use notify::{channel_notifier, Channel, ChannelNotifier, Notifier, NoopNotifier, Wakeups};
pub use shim::{
    create_shim, ensure_compatible, process_callback, version, CallbackInfo, CallbackResult,
    DiagnosticsSnapshot, ErrorKind, ShimConfig, ShimHost, ShimState, StatusFlags, StreamTime,
    SHIM_VERSION,
};
