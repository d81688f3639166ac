//! Event types broadcast by the [`ErrorMonitor`](crate::monitor::ErrorMonitor).
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them over whatever IPC it uses.

use serde::{Deserialize, Serialize};

use crate::shim::{ErrorKind, Severity};

/// One error record drained from a shim's error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamErrorEvent {
    /// Monotonically increasing event sequence number, starting at 1.
    pub seq: u64,
    pub kind: ErrorKind,
    pub severity: Severity,
}

impl StreamErrorEvent {
    pub fn new(seq: u64, kind: ErrorKind) -> Self {
        Self {
            seq,
            kind,
            severity: kind.severity(),
        }
    }
}

/// Running totals of drained error records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTally {
    pub overflows: u64,
    pub underflows: u64,
    pub error_channel_overflows: u64,
}

impl ErrorTally {
    pub fn record(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Overflow => self.overflows += 1,
            ErrorKind::Underflow => self.underflows += 1,
            ErrorKind::ErrorChannelOverflow => self.error_channel_overflows += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.overflows + self.underflows + self.error_channel_overflows
    }
}
