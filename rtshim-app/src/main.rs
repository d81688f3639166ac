//! `rtshim` command line entry point.
//!
//! ```text
//! rtshim version
//! rtshim devices
//! rtshim config [--config FILE] [--write]
//! rtshim sine [--seconds N] [--left HZ] [--right HZ] [--device NAME] [--config FILE]
//! ```

mod settings;
mod sine;

use std::path::PathBuf;

use anyhow::{bail, Context};
use rtshim_core::audio::device::{list_input_devices, list_output_devices, DeviceInfo};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tracing::{error, info};

const USAGE: &str = "Usage:
  rtshim version
  rtshim devices
  rtshim config [--config FILE] [--write]
  rtshim sine [--seconds N] [--left HZ] [--right HZ] [--device NAME] [--config FILE]";

#[derive(Debug, Default, PartialEq)]
struct SineArgs {
    seconds: Option<f32>,
    left_hz: Option<f32>,
    right_hz: Option<f32>,
    device: Option<String>,
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Version,
    Devices,
    Config { path: Option<PathBuf>, write: bool },
    Sine(SineArgs),
    Help,
}

fn parse_value<T: std::str::FromStr>(
    it: &mut impl Iterator<Item = String>,
    flag: &str,
) -> anyhow::Result<T> {
    let Some(raw) = it.next() else {
        bail!("missing value for {flag}");
    };
    raw.parse::<T>()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw}"))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Command> {
    let mut it = args.into_iter();
    let Some(command) = it.next() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "version" => Ok(Command::Version),
        "devices" => Ok(Command::Devices),
        "config" => {
            let mut path = None;
            let mut write = false;
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--config" => path = Some(parse_value::<PathBuf>(&mut it, "--config")?),
                    "--write" => write = true,
                    other => bail!("unknown argument: {other}"),
                }
            }
            Ok(Command::Config { path, write })
        }
        "sine" => {
            let mut sine = SineArgs::default();
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--seconds" => sine.seconds = Some(parse_value(&mut it, "--seconds")?),
                    "--left" => sine.left_hz = Some(parse_value(&mut it, "--left")?),
                    "--right" => sine.right_hz = Some(parse_value(&mut it, "--right")?),
                    "--device" => sine.device = Some(parse_value(&mut it, "--device")?),
                    "--config" => sine.config = Some(parse_value(&mut it, "--config")?),
                    other => bail!("unknown argument: {other}"),
                }
            }
            Ok(Command::Sine(sine))
        }
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => bail!("unknown command: {other}"),
    }
}

/// Command line flags win over the settings file.
fn apply_overrides(settings: &mut AppSettings, args: &SineArgs) {
    if let Some(seconds) = args.seconds {
        settings.seconds = seconds;
    }
    if let Some(left_hz) = args.left_hz {
        settings.left_hz = left_hz;
    }
    if let Some(right_hz) = args.right_hz {
        settings.right_hz = right_hz;
    }
    if let Some(device) = &args.device {
        settings.preferred_output_device = Some(device.clone());
    }
    settings.normalize();
}

fn print_devices(kind: &str, devices: &[DeviceInfo]) {
    println!("{kind} devices:");
    if devices.is_empty() {
        println!("  (none)");
    }
    for device in devices {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  {}{marker}", device.name);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Help => println!("{USAGE}"),
        Command::Version => println!(
            "rtshim {} (shim protocol v{})",
            env!("CARGO_PKG_VERSION"),
            rtshim_core::version()
        ),
        Command::Devices => {
            print_devices("output", &list_output_devices());
            print_devices("input", &list_input_devices());
        }
        Command::Config { path, write } => {
            let path = path.unwrap_or_else(default_settings_path);
            let settings = load_settings(&path);
            if write {
                save_settings(&path, &settings)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "settings written");
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Sine(args) => {
            let path = args.config.clone().unwrap_or_else(default_settings_path);
            let mut settings = load_settings(&path);
            apply_overrides(&mut settings, &args);

            let report = sine::play(&settings)?;
            info!(
                underflows = report.errors.underflows,
                frames_written = report.frames_written,
                "sine demo finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rtshim=info")),
        )
        .init();

    let result = parse_args(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("rtshim: {e:#}\n\n{USAGE}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_sine_flags() {
        let command = parse_args(args(&[
            "sine", "--seconds", "2.5", "--left", "220", "--device", "USB DAC",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Sine(SineArgs {
                seconds: Some(2.5),
                left_hz: Some(220.0),
                right_hz: None,
                device: Some("USB DAC".into()),
                config: None,
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(args(&["sine", "--seconds"])).is_err());
        assert!(parse_args(args(&["sine", "--left", "loud"])).is_err());
        assert!(parse_args(args(&["record"])).is_err());
        assert_eq!(parse_args(args(&[])).unwrap(), Command::Help);
    }

    #[test]
    fn parses_config_command() {
        let command = parse_args(args(&["config", "--write", "--config", "/tmp/x.json"])).unwrap();
        assert_eq!(
            command,
            Command::Config {
                path: Some(PathBuf::from("/tmp/x.json")),
                write: true,
            }
        );
    }

    #[test]
    fn overrides_are_normalized() {
        let mut settings = AppSettings::default();
        apply_overrides(
            &mut settings,
            &SineArgs {
                seconds: Some(-1.0),
                right_hz: Some(440.0),
                device: Some("  ".into()),
                ..SineArgs::default()
            },
        );
        assert_eq!(settings.seconds, 0.1);
        assert_eq!(settings.left_hz, 100.0);
        assert_eq!(settings.right_hz, 440.0);
        assert_eq!(settings.preferred_output_device, None);
    }
}
