//! Live dashboard: a line-oriented presentation layer over the coordinator.
//!
//! Renders every coordinator event as it arrives and reads one-word intents
//! from stdin. Intents run as their own tasks so a slow command never stalls
//! rendering.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use gardenlink_core::{
    CommandName, Coordinator, CoordinatorEvent, CoreError, SensorSnapshot, SessionEndReason,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::device::reading_rows;
use super::util;

const HELP: &str = "keys: r=refresh  a=toggle auto  on/off=pump  auto=auto mode  q=quit";

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Refresh,
    ToggleAuto,
    Command(CommandName),
    Help,
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "refresh" => Some(Key::Refresh),
        "a" | "toggle" => Some(Key::ToggleAuto),
        "on" | "pump on" => Some(Key::Command(CommandName::PumpOn)),
        "off" | "pump off" => Some(Key::Command(CommandName::PumpOff)),
        "auto" | "auto on" => Some(Key::Command(CommandName::AutoOn)),
        "h" | "?" | "help" => Some(Key::Help),
        "q" | "quit" | "exit" => Some(Key::Quit),
        _ => None,
    }
}

/// One-line summary of a telemetry snapshot.
fn sensor_line(snapshot: &SensorSnapshot) -> String {
    let readings = reading_rows(snapshot)
        .into_iter()
        .map(|r| format!("{}: {}", r.label, r.value))
        .collect::<Vec<_>>()
        .join("  |  ");
    match snapshot.captured_at {
        Some(at) => format!("{}  {readings}", at.format("%H:%M:%S")),
        None => readings,
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = util::sign_in(global, |cfg| {
        cfg.auto_start = !args.manual;
        if let Some(secs) = args.interval {
            cfg.refresh_interval = Duration::from_secs(secs.max(1));
        }
    })
    .await?;

    let result = run(&coordinator, global).await;
    util::sign_out(&coordinator).await;
    result
}

async fn run(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let json = matches!(global.output, OutputFormat::Json | OutputFormat::JsonCompact);
    let mut events = coordinator.events();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if !global.quiet {
        let identity = coordinator.identity();
        eprintln!(
            "Signed in as {} ({}) -- device {}",
            identity.username,
            identity.role,
            coordinator.config().device_id
        );
        eprintln!("{HELP}");
    }

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                return Ok(());
            }

            event = events.recv() => match event {
                Ok(CoordinatorEvent::Status(line)) => {
                    if !global.quiet {
                        eprintln!("{}", output::format_status(&line, color));
                    }
                }
                Ok(CoordinatorEvent::SensorsUpdated(snapshot)) => {
                    if json {
                        output::print_output(
                            &serde_json::to_string(snapshot.as_ref()).unwrap_or_default(),
                            false,
                        );
                    } else {
                        output::print_output(&sensor_line(&snapshot), false);
                    }
                }
                Ok(CoordinatorEvent::DeviceUpdated(device)) => {
                    if json {
                        output::print_output(
                            &serde_json::to_string(device.as_ref()).unwrap_or_default(),
                            false,
                        );
                    } else if !global.quiet {
                        eprintln!(
                            "{} [{}] {}",
                            device.display_name(),
                            device.mode_label(),
                            device.location.as_deref().unwrap_or("N/A")
                        );
                    }
                }
                Ok(CoordinatorEvent::SchedulerChanged(state)) => {
                    debug!(%state, "scheduler changed");
                }
                Ok(CoordinatorEvent::ControlsChanged { enabled }) => {
                    debug!(enabled, "controls changed");
                }
                Ok(CoordinatorEvent::SessionEnded { reason }) => {
                    return match reason {
                        SessionEndReason::Expired => Err(CliError::SessionExpired),
                        SessionEndReason::LoggedOut => Ok(()),
                    };
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind; some events were dropped");
                }
                Err(RecvError::Closed) => return Err(CliError::CoordinatorStopped),
            },

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_key(&line) {
                    Some(Key::Quit) => return Ok(()),
                    Some(Key::Help) => eprintln!("{HELP}"),
                    Some(key) => submit(coordinator, key),
                    None => eprintln!("unknown input '{}'. {HELP}", line.trim()),
                },
                // EOF: keep rendering until interrupted.
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }
}

/// Fire an intent without blocking the render loop.
///
/// Outcomes the coordinator reports as status lines are not repeated here;
/// only local rejections are, since those never reach the event log.
fn submit(coordinator: &Coordinator, key: Key) {
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        let result = match key {
            Key::Refresh => coordinator.manual_refresh().await,
            Key::ToggleAuto => coordinator.toggle_auto().await.map(|state| {
                debug!(%state, "auto refresh toggled");
            }),
            Key::Command(name) => coordinator.send_command(name).await,
            Key::Help | Key::Quit => Ok(()),
        };
        match result {
            Err(CoreError::Busy) => eprintln!("A command is still in progress; try again shortly."),
            Err(CoreError::NotAuthenticated) => eprintln!("Not signed in."),
            Err(e) => debug!(error = %e, "intent failed"),
            Ok(()) => {}
        }
    });
}
