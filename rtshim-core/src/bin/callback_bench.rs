//! Measures the cost of one driver period through `ShimState::process`.
//!
//! The consumer side runs inline between periods (echoing captured frames
//! back to the output ring), so every period moves real data in both
//! directions. Usage:
//!
//! ```text
//! cargo run --release -p rtshim-core --bin callback_bench -- \
//!   [--periods <n>] [--frames 64,256,1024] [--channels <n>] [--output <file.json>]
//! ```

use rtshim_core::{create_shim, CallbackInfo, DiagnosticsSnapshot, ShimConfig, SHIM_VERSION};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug)]
struct Args {
    periods: usize,
    frame_counts: Vec<usize>,
    channels: u16,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct CaseSummary {
    frames_per_period: usize,
    periods: usize,
    p50_ns: f64,
    p95_ns: f64,
    p99_ns: f64,
    max_ns: f64,
    ns_per_frame: f64,
    diagnostics: DiagnosticsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    shim_version: u32,
    channels: u16,
    cases: Vec<CaseSummary>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("callback benchmark failed: {e}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args, String> {
    let mut periods: usize = 10_000;
    let mut frame_counts = vec![64, 256, 1024];
    let mut channels: u16 = 2;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--periods" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --periods".into());
                };
                periods = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --periods".to_string())?
                    .clamp(1, 1_000_000);
            }
            "--frames" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --frames".into());
                };
                frame_counts = v
                    .split(',')
                    .map(|s| s.trim().parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| "invalid value for --frames".to_string())?;
                if frame_counts.iter().any(|&n| n == 0) {
                    return Err("--frames entries must be non-zero".into());
                }
            }
            "--channels" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --channels".into());
                };
                channels = v
                    .parse::<u16>()
                    .map_err(|_| "invalid value for --channels".to_string())?
                    .clamp(1, 32);
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run --release -p rtshim-core --bin callback_bench -- \\
  [--periods <n>] [--frames <a,b,...>] [--channels <n>] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    Ok(Args {
        periods,
        frame_counts,
        channels,
        output,
    })
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn bench_case(args: &Args, frames: usize) -> Result<CaseSummary, String> {
    let channels = usize::from(args.channels);
    let config = ShimConfig {
        input_channels: args.channels,
        output_channels: args.channels,
        input_capacity: (frames * 4).next_power_of_two(),
        output_capacity: (frames * 4).next_power_of_two(),
        ..ShimConfig::default()
    };
    let (mut state, mut host) = create_shim::<f32>(&config, None).map_err(|e| e.to_string())?;

    let input = vec![0.25f32; frames * channels];
    let mut output = vec![0.0f32; frames * channels];
    let mut scratch = vec![0.0f32; frames * channels];
    let info = CallbackInfo::default();

    // one period of output queued so the first callback does not underflow
    host.write_output(&scratch, frames);

    let mut latencies = Vec::with_capacity(args.periods);
    for _ in 0..args.periods {
        let started = Instant::now();
        state.process(&input, &mut output, frames, &info);
        latencies.push(started.elapsed().as_nanos() as f64);

        let got = host.read_input(&mut scratch, frames);
        host.write_output(&scratch, got);
        while host.errors.try_recv().is_some() {}
    }

    let p50_ns = percentile(&latencies, 0.50);
    Ok(CaseSummary {
        frames_per_period: frames,
        periods: args.periods,
        p50_ns,
        p95_ns: percentile(&latencies, 0.95),
        p99_ns: percentile(&latencies, 0.99),
        max_ns: latencies.iter().copied().fold(0.0, f64::max),
        ns_per_frame: p50_ns / frames as f64,
        diagnostics: host.diagnostics(),
    })
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    println!(
        "Running callback benchmark: periods={} channels={} frames={:?}",
        args.periods, args.channels, args.frame_counts
    );

    let mut cases = Vec::new();
    for &frames in &args.frame_counts {
        let case = bench_case(&args, frames)?;
        println!(
            "{frames:>5} frames: p50={:.0}ns p95={:.0}ns p99={:.0}ns max={:.0}ns underflows={}",
            case.p50_ns, case.p95_ns, case.p99_ns, case.max_ns, case.diagnostics.underflows
        );
        cases.push(case);
    }

    let summary = Summary {
        shim_version: SHIM_VERSION,
        channels: args.channels,
        cases,
    };

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
