//! `ErrorMonitor`: consumer-side watcher of a shim's error channel.
//!
//! ## Lifecycle
//!
//! ```text
//! ErrorMonitor::spawn(receiver, wakeup, config)
//!     └─► thread "rtshim-errors": wait on wake-up (or poll) → drain → log → broadcast
//!         └─► stop()   → running=false + shutdown wake-up, final drain, join,
//!                        receiver and final tally handed back
//! ```
//!
//! Runs on an ordinary thread and may block freely. Transient errors are
//! logged at `warn`, error channel saturation at `error`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, ShimError},
    events::{ErrorTally, StreamErrorEvent},
    shim::{ErrorKind, ErrorReceiver},
};

/// Broadcast channel capacity: error events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Upper bound on how long a record can sit undrained when no wake-up
    /// arrives (or when running without a notifier). Default: 50 ms.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

pub struct ErrorMonitor {
    running: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    tally: Arc<Mutex<ErrorTally>>,
    events_tx: broadcast::Sender<StreamErrorEvent>,
    handle: Option<JoinHandle<ErrorReceiver>>,
}

impl ErrorMonitor {
    /// Start draining `errors` on a dedicated thread.
    ///
    /// `wakeup` is the error channel's receiver from
    /// [`Wakeups::receiver`](crate::notify::Wakeups::receiver); pass `None`
    /// to poll every `config.poll_interval`.
    ///
    /// # Errors
    /// `ShimError::Io` if the thread cannot be spawned.
    pub fn spawn(
        errors: ErrorReceiver,
        wakeup: Option<Receiver<()>>,
        config: MonitorConfig,
    ) -> Result<Self> {
        let (events_tx, _) = broadcast::channel(BROADCAST_CAP);
        let running = Arc::new(AtomicBool::new(true));
        let tally = Arc::new(Mutex::new(ErrorTally::default()));
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let worker = Worker {
            errors,
            wakeup,
            shutdown_rx,
            poll_interval: config.poll_interval,
            running: Arc::clone(&running),
            tally: Arc::clone(&tally),
            events_tx: events_tx.clone(),
            seq: 0,
        };
        let handle = thread::Builder::new()
            .name("rtshim-errors".into())
            .spawn(move || worker.run())
            .map_err(ShimError::Io)?;

        info!("error monitor started");
        Ok(Self {
            running,
            shutdown_tx,
            tally,
            events_tx,
            handle: Some(handle),
        })
    }

    /// Subscribe to live error events.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamErrorEvent> {
        self.events_tx.subscribe()
    }

    /// Totals of every record drained so far (snapshot).
    pub fn tally(&self) -> ErrorTally {
        *self.tally.lock()
    }

    /// Stop the monitor after one final drain. Hands the receiver back along
    /// with the final totals.
    pub fn stop(mut self) -> Result<(ErrorReceiver, ErrorTally)> {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.try_send(());
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ShimError::Other(anyhow::anyhow!("error monitor already stopped")))?;
        let errors = handle
            .join()
            .map_err(|_| ShimError::Other(anyhow::anyhow!("error monitor thread panicked")))?;
        let tally = self.tally();
        info!(total = tally.total(), "error monitor stopped");
        Ok((errors, tally))
    }
}

impl Drop for ErrorMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    errors: ErrorReceiver,
    wakeup: Option<Receiver<()>>,
    shutdown_rx: Receiver<()>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    tally: Arc<Mutex<ErrorTally>>,
    events_tx: broadcast::Sender<StreamErrorEvent>,
    seq: u64,
}

impl Worker {
    fn run(mut self) -> ErrorReceiver {
        debug!(poll_ms = self.poll_interval.as_millis() as u64, "error monitor loop");
        while self.running.load(Ordering::Relaxed) {
            self.wait();
            self.drain();
        }
        self.drain();
        self.errors
    }

    fn wait(&mut self) {
        let disconnected = match &self.wakeup {
            Some(wakeup) => select! {
                recv(wakeup) -> msg => msg.is_err(),
                recv(self.shutdown_rx) -> _ => false,
                default(self.poll_interval) => false,
            },
            None => {
                let _ = self.shutdown_rx.recv_timeout(self.poll_interval);
                false
            }
        };
        if disconnected {
            debug!("error wake-up source dropped, falling back to polling");
            self.wakeup = None;
        }
    }

    fn drain(&mut self) {
        while let Some(kind) = self.errors.try_recv() {
            self.seq += 1;
            self.tally.lock().record(kind);
            match kind {
                ErrorKind::Overflow => {
                    warn!(seq = self.seq, "input overflow: capture frames dropped")
                }
                ErrorKind::Underflow => {
                    warn!(seq = self.seq, "output underflow: silence substituted")
                }
                ErrorKind::ErrorChannelOverflow => {
                    error!(seq = self.seq, "error channel overflow: error reports lost")
                }
            }
            let _ = self.events_tx.send(StreamErrorEvent::new(self.seq, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{channel_notifier, Channel, Notifier};
    use crate::shim::{create_shim, CallbackInfo, ShimConfig};
    use std::time::Instant;

    fn wait_for_total(monitor: &ErrorMonitor, total: u64) {
        let start = Instant::now();
        while monitor.tally().total() < total {
            if start.elapsed() > Duration::from_secs(2) {
                panic!("timed out waiting for {total} drained errors");
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn drains_records_signalled_by_the_callback() {
        let (notifier, wakeups) = channel_notifier();
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let (mut state, host) =
            create_shim::<f32>(&ShimConfig::playback(1), Some(notifier)).unwrap();
        let monitor = ErrorMonitor::spawn(
            host.errors,
            Some(wakeups.receiver(Channel::Error).clone()),
            MonitorConfig {
                poll_interval: Duration::from_secs(5),
            },
        )
        .unwrap();
        let mut events = monitor.subscribe();

        let mut output = [0.0f32; 64];
        state.process(&[], &mut output, 64, &CallbackInfo::default());
        wait_for_total(&monitor, 1);

        let event = events.try_recv().expect("one event broadcast");
        assert_eq!(event.seq, 1);
        assert_eq!(event.kind, ErrorKind::Underflow);
        assert_eq!(monitor.tally().underflows, 1);

        let (mut errors, tally) = monitor.stop().unwrap();
        assert_eq!(errors.try_recv(), None);
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn polls_without_a_wakeup_source() {
        let (mut state, host) = create_shim::<f32>(&ShimConfig::capture(1), None).unwrap();
        let monitor = ErrorMonitor::spawn(
            host.errors,
            None,
            MonitorConfig {
                poll_interval: Duration::from_millis(5),
            },
        )
        .unwrap();

        // capture ring is 4096 frames: the third period overflows
        let input = [0.0f32; 2048];
        for _ in 0..3 {
            state.process(&input, &mut [], 2048, &CallbackInfo::default());
        }
        wait_for_total(&monitor, 1);

        let tally = monitor.tally();
        assert_eq!(tally.overflows, 1);
        assert_eq!(tally.underflows, 0);
        monitor.stop().unwrap();
    }

    #[test]
    fn stop_performs_a_final_drain() {
        let (mut state, host) = create_shim::<f32>(&ShimConfig::playback(1), None).unwrap();
        let monitor = ErrorMonitor::spawn(
            host.errors,
            None,
            MonitorConfig {
                poll_interval: Duration::from_secs(5),
            },
        )
        .unwrap();

        let mut output = [0.0f32; 8];
        state.process(&[], &mut output, 8, &CallbackInfo::default());
        let (errors, tally) = monitor.stop().unwrap();
        assert_eq!(errors.pending(), 0);
        assert_eq!(tally.underflows, 1);
    }
}
