//! Stereo sine demo: a consumer that keeps a playback-only shim fed.
//!
//! ```text
//! main thread                          device thread (cpal)
//! ───────────                          ────────────────────
//! prefill output ring ─► play()
//! loop until deadline:
//!   wait Output wake-up  ◄───────────  ShimState::process (signal Output)
//!   fill writable frames ─► output ring
//! pause(), stop ErrorMonitor, report
//! ```

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rtshim_core::{
    channel_notifier, create_shim, AudioStream, Channel, DiagnosticsSnapshot, ErrorMonitor,
    ErrorTally, MonitorConfig, Notifier, RingProducer, ShimHost,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::settings::AppSettings;

/// Longest the feeder sleeps without an Output wake-up.
const WAKEUP_TIMEOUT: Duration = Duration::from_millis(100);

struct Voice {
    phase: f32,
    step: f32,
}

impl Voice {
    fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / sample_rate,
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        self.phase += self.step;
        if self.phase > TAU {
            self.phase -= TAU;
        }
        self.phase.sin()
    }
}

/// Two independent phase accumulators, interleaved left/right.
pub struct SineOscillator {
    left: Voice,
    right: Voice,
    amplitude: f32,
}

impl SineOscillator {
    pub fn new(left_hz: f32, right_hz: f32, sample_rate: u32, amplitude: f32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        Self {
            left: Voice::new(left_hz, sample_rate),
            right: Voice::new(right_hz, sample_rate),
            amplitude,
        }
    }

    /// Fill `out` with interleaved stereo frames. A trailing odd sample is
    /// left untouched.
    pub fn fill(&mut self, out: &mut [f32]) {
        for frame in out.chunks_exact_mut(2) {
            frame[0] = self.left.next_sample() * self.amplitude;
            frame[1] = self.right.next_sample() * self.amplitude;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackReport {
    pub device: String,
    pub sample_rate: u32,
    pub seconds: f32,
    pub frames_written: u64,
    pub diagnostics: DiagnosticsSnapshot,
    pub errors: ErrorTally,
}

/// Synthesize as many frames as the output ring has room for and queue them.
fn feed(
    oscillator: &mut SineOscillator,
    output: &mut RingProducer<f32>,
    scratch: &mut [f32],
) -> usize {
    let channels = output.frame_len();
    let frames = output.write_available().min(scratch.len() / channels);
    if frames == 0 {
        return 0;
    }
    let samples = &mut scratch[..frames * channels];
    oscillator.fill(samples);
    output.write(samples, frames)
}

/// Play the configured tones for `settings.seconds` through the shim.
///
/// Must run on one thread from start to finish (`AudioStream` is `!Send`).
pub fn play(settings: &AppSettings) -> anyhow::Result<PlaybackReport> {
    let (notifier, wakeups) = channel_notifier();
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let (state, host) =
        create_shim::<f32>(&settings.shim, Some(notifier)).context("failed to create shim")?;
    let ShimHost {
        output,
        errors,
        diagnostics,
        ..
    } = host;
    let mut output = output.context("shim has no output direction")?;

    let stream = AudioStream::open_output(state, settings.preferred_output_device.as_deref())
        .context("failed to open output stream")?;
    let monitor = ErrorMonitor::spawn(
        errors,
        Some(wakeups.receiver(Channel::Error).clone()),
        MonitorConfig::default(),
    )
    .context("failed to start error monitor")?;

    let mut oscillator = SineOscillator::new(
        settings.left_hz,
        settings.right_hz,
        stream.sample_rate,
        settings.amplitude,
    );
    let mut scratch = vec![0.0f32; output.capacity() * output.frame_len()];

    let mut frames_written = feed(&mut oscillator, &mut output, &mut scratch) as u64;
    debug!(frames_written, "output ring prefilled");

    stream.play().context("failed to start playback")?;
    info!(
        device = stream.device_name.as_str(),
        left_hz = settings.left_hz,
        right_hz = settings.right_hz,
        seconds = settings.seconds,
        "sine demo playing"
    );

    let deadline = Instant::now() + Duration::from_secs_f32(settings.seconds);
    while Instant::now() < deadline {
        if !wakeups.wait_timeout(Channel::Output, WAKEUP_TIMEOUT) {
            warn!("no output wake-up within {WAKEUP_TIMEOUT:?}, device may be stalled");
        }
        frames_written += feed(&mut oscillator, &mut output, &mut scratch) as u64;
    }

    if let Err(e) = stream.pause() {
        warn!("failed to pause stream: {e}");
    }
    let device = stream.device_name.clone();
    let sample_rate = stream.sample_rate;
    drop(stream);

    let (_, errors) = monitor.stop().context("failed to stop error monitor")?;

    Ok(PlaybackReport {
        device,
        sample_rate,
        seconds: settings.seconds,
        frames_written,
        diagnostics: diagnostics.snapshot(),
        errors,
    })
}
