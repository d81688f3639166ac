//! Lock-free counters written by the callback, read by anyone.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ShimDiagnostics {
    pub periods: AtomicU64,
    pub frames_captured: AtomicU64,
    pub frames_played: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_silenced: AtomicU64,
    pub overflows: AtomicU64,
    pub underflows: AtomicU64,
    /// Shortfall reports the error channel stored as an overflow marker or
    /// dropped outright.
    pub reports_lost: AtomicU64,
}

impl ShimDiagnostics {
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.periods.store(0, Ordering::Relaxed);
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_played.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.frames_silenced.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
        self.underflows.store(0, Ordering::Relaxed);
        self.reports_lost.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            periods: self.periods.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_silenced: self.frames_silenced.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            underflows: self.underflows.load(Ordering::Relaxed),
            reports_lost: self.reports_lost.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub periods: u64,
    pub frames_captured: u64,
    pub frames_played: u64,
    pub frames_dropped: u64,
    pub frames_silenced: u64,
    pub overflows: u64,
    pub underflows: u64,
    pub reports_lost: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_every_counter() {
        let diagnostics = ShimDiagnostics::default();
        ShimDiagnostics::add(&diagnostics.periods, 3);
        ShimDiagnostics::add(&diagnostics.frames_silenced, 256);
        assert_eq!(diagnostics.snapshot().frames_silenced, 256);

        diagnostics.reset();
        assert_eq!(diagnostics.snapshot(), DiagnosticsSnapshot::default());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = DiagnosticsSnapshot {
            underflows: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(snapshot).expect("serialize snapshot");
        assert_eq!(json["underflows"], 2);
        assert_eq!(json["reportsLost"], 0);
    }
}
