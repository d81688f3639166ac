//! `ChannelNotifier`: wake-ups over `crossbeam-channel`.
//!
//! Each logical channel is a `bounded(1)` channel of `()`. `signal` is a
//! `try_send`: if a wake-up is already pending the new one coalesces into it,
//! and if the consumer has gone away the signal is silently dropped. The
//! consumer blocks in [`Wakeups::wait`] / [`Wakeups::wait_timeout`], or
//! multiplexes the raw receivers with `crossbeam_channel::select!`.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::{Channel, Notifier};

/// Real-time half: held by the shim.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    senders: [Sender<()>; 3],
}

/// Consumer half: one receiver per logical channel.
#[derive(Debug, Clone)]
pub struct Wakeups {
    receivers: [Receiver<()>; 3],
}

/// Create a connected notifier / wake-up pair.
pub fn channel_notifier() -> (ChannelNotifier, Wakeups) {
    let (input_tx, input_rx) = bounded(1);
    let (output_tx, output_rx) = bounded(1);
    let (error_tx, error_rx) = bounded(1);
    (
        ChannelNotifier {
            senders: [input_tx, output_tx, error_tx],
        },
        Wakeups {
            receivers: [input_rx, output_rx, error_rx],
        },
    )
}

impl Notifier for ChannelNotifier {
    #[inline]
    fn signal(&self, channel: Channel) {
        // Full: a wake-up is already pending. Disconnected: nobody listens.
        let _ = self.senders[channel.index()].try_send(());
    }
}

impl Wakeups {
    /// Block until `channel` is signalled.
    ///
    /// Returns `false` if the notifier was dropped and no wake-up is pending.
    pub fn wait(&self, channel: Channel) -> bool {
        self.receivers[channel.index()].recv().is_ok()
    }

    /// Block until `channel` is signalled or `timeout` elapses.
    ///
    /// Returns `true` only for a real wake-up.
    pub fn wait_timeout(&self, channel: Channel, timeout: Duration) -> bool {
        match self.receivers[channel.index()].recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Consume a pending wake-up without blocking.
    pub fn try_take(&self, channel: Channel) -> bool {
        match self.receivers[channel.index()].try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Raw receiver, for `select!` across several channels.
    pub fn receiver(&self, channel: Channel) -> &Receiver<()> {
        &self.receivers[channel.index()]
    }
}
