//! The real-time entry point, invoked once per driver period.
//!
//! # Design constraints
//!
//! The driver calls this at elevated priority, sometimes at interrupt level.
//! Nothing reachable from [`ShimState::process`] may:
//! - allocate or free heap memory
//! - block on a mutex, condvar or channel
//! - log, print or perform I/O
//! - panic (slices shorter than `frame_count` are clamped, never indexed past)
//!
//! ## Per-period algorithm
//!
//! ```text
//! 1. nwrite = min(frame_count, input.write_available(), input slice frames)
//! 2. nread  = min(frame_count, output.read_available(), output slot frames)
//! 3. sync  → nwrite = nread = min(nwrite, nread)
//! 4. input.write(input, nwrite)    → signal Input
//! 5. output.read(output, nread)    → signal Output
//! 6. nwrite < frame_count          → Overflow
//! 7. nread  < frame_count          → Underflow + silence the rest of the slot
//! ```
//!
//! Input and Output are signalled every period, even when nothing moved, so a
//! consumer can tell an idle-but-running stream from a stopped one.

use crate::buffering::Sample;
use crate::notify::Channel;

use super::{ErrorKind, ShimDiagnostics, ShimState};

/// Driver timestamps for one period, in seconds on the driver's clock.
///
/// Carried through untouched; the shim never interprets them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamTime {
    pub input_adc: f64,
    pub current: f64,
    pub output_dac: f64,
}

/// Driver status bits for one period. Passed through, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusFlags(pub u32);

impl StatusFlags {
    pub const INPUT_UNDERFLOW: StatusFlags = StatusFlags(0x01);
    pub const INPUT_OVERFLOW: StatusFlags = StatusFlags(0x02);
    pub const OUTPUT_UNDERFLOW: StatusFlags = StatusFlags(0x04);
    pub const OUTPUT_OVERFLOW: StatusFlags = StatusFlags(0x08);
    pub const PRIMING_OUTPUT: StatusFlags = StatusFlags(0x10);

    pub const fn empty() -> Self {
        StatusFlags(0)
    }

    pub const fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Timing and status metadata handed over by the driver with each period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallbackInfo {
    pub time: StreamTime,
    pub status: StatusFlags,
}

/// What the callback asks of the driver.
///
/// Mirrors the driver's callback result codes so `process_callback` can hand
/// the value straight back. The shim itself only ever returns `Continue`;
/// `Complete` and `Abort` exist for bindings that translate codes both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CallbackResult {
    Continue = 0,
    Complete = 1,
    Abort = 2,
}

impl<S: Sample> ShimState<S> {
    /// Move one period of audio between the driver and the rings.
    ///
    /// `input` holds the captured interleaved samples, `output` is the slot
    /// the driver will play. Both are expected to hold `frame_count` frames;
    /// shorter slices are treated as shortfalls. `info` is opaque.
    pub fn process(
        &mut self,
        input: &[S],
        output: &mut [S],
        frame_count: usize,
        _info: &CallbackInfo,
    ) -> CallbackResult {
        let mut nwrite = self.input.as_ref().map_or(frame_count, |ring| {
            ring.write_available()
                .min(input.len() / ring.frame_len())
                .min(frame_count)
        });
        let mut nread = self.output.as_ref().map_or(frame_count, |ring| {
            ring.read_available()
                .min(output.len() / ring.frame_len())
                .min(frame_count)
        });
        if self.sync {
            nread = nread.min(nwrite);
            nwrite = nread;
        }

        if let Some(ring) = self.input.as_mut() {
            nwrite = ring.write(input, nwrite);
            self.signal(Channel::Input);
        }

        let mut out_frame_len = 0;
        if let Some(ring) = self.output.as_mut() {
            out_frame_len = ring.frame_len();
            nread = ring.read(output, nread);
            self.signal(Channel::Output);
        }

        let diagnostics = &self.diagnostics;
        ShimDiagnostics::add(&diagnostics.periods, 1);
        if self.input.is_some() {
            ShimDiagnostics::add(&diagnostics.frames_captured, nwrite);
        }
        if self.output.is_some() {
            ShimDiagnostics::add(&diagnostics.frames_played, nread);
        }

        if nwrite < frame_count {
            ShimDiagnostics::add(&self.diagnostics.frames_dropped, frame_count - nwrite);
            ShimDiagnostics::add(&self.diagnostics.overflows, 1);
            self.report(ErrorKind::Overflow);
        }
        if nread < frame_count {
            ShimDiagnostics::add(&self.diagnostics.frames_silenced, frame_count - nread);
            ShimDiagnostics::add(&self.diagnostics.underflows, 1);
            self.report(ErrorKind::Underflow);
            let start = nread.saturating_mul(out_frame_len).min(output.len());
            let end = frame_count.saturating_mul(out_frame_len).min(output.len());
            output[start..end].fill(S::SILENCE);
        }

        CallbackResult::Continue
    }

    /// Enqueue a shortfall record. A record the error channel could not
    /// store as itself counts as lost.
    #[inline]
    fn report(&mut self, kind: ErrorKind) {
        if self.errors.send(kind) != Some(kind) {
            ShimDiagnostics::add(&self.diagnostics.reports_lost, 1);
        }
    }
}

/// Driver-shaped entry point: `state` is the callback's context parameter.
///
/// Equivalent to `state.process(input, output, frame_count, info)`; exists so
/// a driver binding can forward its argument list verbatim.
#[inline]
pub fn process_callback<S: Sample>(
    input: &[S],
    output: &mut [S],
    frame_count: usize,
    info: &CallbackInfo,
    state: &mut ShimState<S>,
) -> CallbackResult {
    state.process(input, output, frame_count, info)
}
