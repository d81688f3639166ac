//! Notification bridge: how the real-time callback wakes its consumer.
//!
//! The `Notifier` trait is the injected capability. The callback only ever
//! calls `signal(channel)`; whatever primitive sits behind it (channel,
//! semaphore, pipe write, an async runtime's wake handle) belongs to the
//! consumer side.
//!
//! # Contract for implementors
//!
//! `signal` runs on the audio thread. It **must**:
//! - return without blocking, even when nobody is waiting
//! - not allocate heap memory
//! - not acquire a lock another thread may hold for long

pub mod channel;

pub use channel::{channel_notifier, ChannelNotifier, Wakeups};

use serde::{Deserialize, Serialize};

/// The three logical wake-up channels of a shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// New input frames were written (or a period passed with none).
    Input,
    /// Output frames were consumed; there is room for more.
    Output,
    /// An error record was enqueued.
    Error,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Input, Channel::Output, Channel::Error];

    /// Dense index in `0..3`, for per-channel tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Input => 0,
            Channel::Output => 1,
            Channel::Error => 2,
        }
    }
}

/// Wakes a (possibly absent) consumer waiting on one of the shim's channels.
pub trait Notifier: Send + Sync + 'static {
    fn signal(&self, channel: Channel);
}

impl<F> Notifier for F
where
    F: Fn(Channel) + Send + Sync + 'static,
{
    #[inline]
    fn signal(&self, channel: Channel) {
        self(channel)
    }
}

/// Notifier that does nothing. For consumers that poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    #[inline]
    fn signal(&self, _channel: Channel) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closures_are_notifiers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let notifier: Arc<dyn Notifier> = Arc::new(move |channel: Channel| {
            if channel == Channel::Error {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        notifier.signal(Channel::Input);
        notifier.signal(Channel::Error);
        notifier.signal(Channel::Error);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn channel_indices_are_dense() {
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn channel_serializes_lowercase() {
        let json = serde_json::to_string(&Channel::Output).expect("serialize channel");
        assert_eq!(json, r#""output""#);
    }
}
