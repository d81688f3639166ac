use thiserror::Error;

/// All setup-time errors produced by rtshim-core.
///
/// The real-time callback never returns one of these: runtime shortfalls are
/// carried as [`ErrorKind`](crate::ErrorKind) records through the error channel.
#[derive(Debug, Error)]
pub enum ShimError {
    #[error("shim version mismatch: shim speaks v{expected}, consumer expects v{found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("{buffer} ring buffer capacity must be non-zero")]
    ZeroCapacity { buffer: &'static str },

    #[error("{buffer} ring buffer frame length must be non-zero")]
    ZeroFrameLength { buffer: &'static str },

    #[error("{buffer} ring buffer of {capacity} frames x {frame_len} samples overflows usize")]
    CapacityOverflow {
        buffer: &'static str,
        capacity: usize,
        frame_len: usize,
    },

    #[error("error channel needs at least 2 slots of headroom, got {capacity}")]
    ErrorChannelTooSmall { capacity: usize },

    #[error("shim has neither an input nor an output direction")]
    NoDirections,

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default {0} device found")]
    NoDefaultDevice(&'static str),

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("stream direction mismatch: {0}")]
    DirectionMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ShimError>;
