//! Error channel: shortfall reports from the audio thread, carried as data.
//!
//! ## Headroom policy
//!
//! When fewer than two slots are free, the record being sent is replaced by
//! [`ErrorKind::ErrorChannelOverflow`]. The last free slot is therefore always
//! taken by an overflow marker, and a consumer that drains the channel learns
//! it fell behind even though individual reports were lost.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffering::{RingBuffer, RingConsumer, RingProducer};
use crate::error::{Result, ShimError};
use crate::notify::{Channel, Notifier};

/// Minimum error channel capacity: one record plus the overflow marker slot.
pub const MIN_ERROR_CAPACITY: usize = 2;

/// Kind tag of an error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ErrorKind {
    /// Input was dropped: the consumer did not drain the input ring in time.
    Overflow,
    /// Output was not ready: silence was substituted.
    Underflow,
    /// The error channel itself was saturated; some reports were lost.
    ErrorChannelOverflow,
}

/// How urgently a consumer should react to an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected rate mismatch; the stream continues degraded.
    Transient,
    /// Diagnostic information itself is being lost.
    Urgent,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::Overflow | ErrorKind::Underflow => Severity::Transient,
            ErrorKind::ErrorChannelOverflow => Severity::Urgent,
        }
    }
}

/// Create a connected error channel pair with room for `capacity` records.
///
/// # Errors
/// `ErrorChannelTooSmall` when `capacity < 2`.
pub fn error_channel(
    capacity: usize,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<(ErrorChannel, ErrorReceiver)> {
    if capacity < MIN_ERROR_CAPACITY {
        return Err(ShimError::ErrorChannelTooSmall { capacity });
    }
    let (ring, rx) = RingBuffer::named("error", capacity, 1)?.split();
    Ok((ErrorChannel { ring, notifier }, ErrorReceiver { ring: rx }))
}

/// Sending half, owned by the real-time side.
pub struct ErrorChannel {
    ring: RingProducer<ErrorKind>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ErrorChannel {
    /// Enqueue one record and signal [`Channel::Error`].
    ///
    /// Returns the kind actually stored, which is `ErrorChannelOverflow` when
    /// headroom ran out, or `None` if the channel was completely full.
    /// Never blocks, never allocates.
    pub fn send(&mut self, kind: ErrorKind) -> Option<ErrorKind> {
        let kind = if self.ring.write_available() < MIN_ERROR_CAPACITY {
            ErrorKind::ErrorChannelOverflow
        } else {
            kind
        };
        let stored = (self.ring.write(&[kind], 1) == 1).then_some(kind);
        if let Some(notifier) = &self.notifier {
            notifier.signal(Channel::Error);
        }
        stored
    }

    /// Free record slots.
    pub fn write_available(&self) -> usize {
        self.ring.write_available()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Receiving half, owned by the consumer side.
pub struct ErrorReceiver {
    ring: RingConsumer<ErrorKind>,
}

impl ErrorReceiver {
    /// Pop the oldest pending record, if any.
    pub fn try_recv(&mut self) -> Option<ErrorKind> {
        let mut slot = [ErrorKind::Overflow];
        (self.ring.read(&mut slot, 1) == 1).then_some(slot[0])
    }

    /// Records waiting to be received.
    pub fn pending(&self) -> usize {
        self.ring.read_available()
    }

    /// Pop every record pending right now, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = ErrorKind> + '_ {
        let pending = self.pending();
        std::iter::from_fn(move || self.try_recv()).take(pending)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn rejects_capacity_without_headroom() {
        assert!(matches!(
            error_channel(1, None),
            Err(ShimError::ErrorChannelTooSmall { capacity: 1 })
        ));
    }

    #[test]
    fn records_arrive_in_order() {
        let (mut tx, mut rx) = error_channel(8, None).unwrap();
        tx.send(ErrorKind::Overflow);
        tx.send(ErrorKind::Underflow);

        assert_eq!(rx.pending(), 2);
        assert_eq!(rx.try_recv(), Some(ErrorKind::Overflow));
        assert_eq!(rx.try_recv(), Some(ErrorKind::Underflow));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn last_free_slot_holds_overflow_marker() {
        let capacity = 8;
        let (mut tx, mut rx) = error_channel(capacity, None).unwrap();
        for _ in 0..capacity - 1 {
            assert_eq!(tx.send(ErrorKind::Underflow), Some(ErrorKind::Underflow));
        }

        assert_eq!(
            tx.send(ErrorKind::Overflow),
            Some(ErrorKind::ErrorChannelOverflow)
        );

        let received: Vec<_> = rx.drain().collect();
        assert_eq!(received.len(), capacity);
        assert_eq!(received[capacity - 1], ErrorKind::ErrorChannelOverflow);
        assert!(received[..capacity - 1]
            .iter()
            .all(|k| *k == ErrorKind::Underflow));
    }

    #[test]
    fn send_on_full_channel_drops_without_blocking() {
        let (mut tx, mut rx) = error_channel(2, None).unwrap();
        assert_eq!(tx.send(ErrorKind::Overflow), Some(ErrorKind::Overflow));
        assert_eq!(
            tx.send(ErrorKind::Overflow),
            Some(ErrorKind::ErrorChannelOverflow)
        );
        assert_eq!(tx.send(ErrorKind::Underflow), None);
        assert_eq!(tx.write_available(), 0);

        assert_eq!(rx.try_recv(), Some(ErrorKind::Overflow));
        assert_eq!(rx.try_recv(), Some(ErrorKind::ErrorChannelOverflow));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn every_send_signals_the_error_channel() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let notifier: Arc<dyn Notifier> = Arc::new(move |channel: Channel| {
            assert_eq!(channel, Channel::Error);
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let (mut tx, _rx) = error_channel(2, Some(notifier)).unwrap();

        // including the dropped third record
        tx.send(ErrorKind::Overflow);
        tx.send(ErrorKind::Overflow);
        tx.send(ErrorKind::Overflow);
        assert_eq!(hits.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn severity_classes() {
        assert_eq!(ErrorKind::Overflow.severity(), Severity::Transient);
        assert_eq!(ErrorKind::Underflow.severity(), Severity::Transient);
        assert_eq!(ErrorKind::ErrorChannelOverflow.severity(), Severity::Urgent);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ErrorChannelOverflow).unwrap();
        assert_eq!(json, r#""error_channel_overflow""#);
    }
}
