//! Device, sensor, and actuator command handlers.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use gardenlink_core::{
    CommandName, Coordinator, DeviceDescriptor, DeviceEdit, Role, SensorSnapshot,
};

use crate::cli::{DeviceArgs, DeviceCommand, GlobalOpts, PumpArgs, PumpCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
pub struct ReadingRow {
    #[tabled(rename = "Sensor")]
    pub label: &'static str,
    #[tabled(rename = "Reading")]
    pub value: String,
    #[tabled(skip)]
    pub key: String,
}

pub fn reading_rows(snapshot: &SensorSnapshot) -> Vec<ReadingRow> {
    snapshot
        .rows()
        .into_iter()
        .map(|(sensor, value)| ReadingRow {
            label: sensor.label(),
            value,
            key: sensor.to_string(),
        })
        .collect()
}

/// Everything `status` prints, in one serializable shape.
#[derive(Debug, Serialize)]
struct StatusView<'a> {
    device: &'a DeviceDescriptor,
    mode: &'static str,
    readings: Vec<ReadingRow>,
    captured_at: Option<String>,
}

pub fn device_detail(device: &DeviceDescriptor) -> String {
    let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".into());
    let mut lines = vec![device.display_name().to_owned()];
    if let Some(ref id) = device.device_id {
        lines.push(format!("  Id:        {id}"));
    }
    lines.push(format!("  Type:      {}", or_na(&device.device_type)));
    lines.push(format!("  Location:  {}", or_na(&device.location)));
    lines.push(format!("  Mode:      {}", device.mode_label()));
    lines.join("\n")
}

fn status_detail(view: &StatusView<'_>) -> String {
    let mut out = device_detail(view.device);
    if let Some(ref at) = view.captured_at {
        let _ = write!(out, "\n  Updated:   {at}");
    }
    out.push('\n');
    out.push_str(&output::render_table(&view.readings));
    out
}

// ── Handlers ─────────────────────────────────────────────────────────

/// One fetch cycle, then print device + readings.
pub async fn status(global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = util::sign_in(global, |_| {}).await?;
    let result = status_inner(&coordinator, global).await;
    util::sign_out(&coordinator).await;
    result
}

async fn status_inner(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    coordinator.manual_refresh().await?;
    let device = coordinator.current_device();
    let sensors = coordinator.current_sensors();

    let view = StatusView {
        device: &device,
        mode: device.mode_label(),
        readings: reading_rows(&sensors),
        captured_at: sensors.captured_at.map(|t| t.to_rfc3339()),
    };
    let out = output::render_single(&global.output, &view, status_detail, |v| {
        v.readings
            .iter()
            .map(|r| format!("{}={}", r.key, r.value))
            .chain(std::iter::once(format!("mode={}", v.mode)))
            .collect::<Vec<_>>()
            .join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn pump(args: PumpArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let name = match args.command {
        PumpCommand::On => CommandName::PumpOn,
        PumpCommand::Off => CommandName::PumpOff,
    };
    send(name, global).await
}

pub async fn auto(global: &GlobalOpts) -> Result<(), CliError> {
    send(CommandName::AutoOn, global).await
}

async fn send(name: CommandName, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = util::sign_in(global, |_| {}).await?;
    let result = coordinator.send_command(name).await;
    util::sign_out(&coordinator).await;
    result?;

    if !global.quiet {
        eprintln!("✓ Successfully sent '{name}' command.");
    }
    Ok(())
}

pub async fn handle(args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = util::sign_in(global, |_| {}).await?;
    let result = match args.command {
        DeviceCommand::Show => show(&coordinator, global).await,
        DeviceCommand::Edit {
            name,
            device_type,
            location,
        } => edit(&coordinator, global, name, device_type, location).await,
    };
    util::sign_out(&coordinator).await;
    result
}

async fn show(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    coordinator.manual_refresh().await?;
    let device = coordinator.current_device();
    let out = output::render_single(&global.output, device.as_ref(), device_detail, |d| {
        d.device_id.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn edit(
    coordinator: &Coordinator,
    global: &GlobalOpts,
    name: Option<String>,
    device_type: Option<String>,
    location: Option<String>,
) -> Result<(), CliError> {
    if name.is_none() && device_type.is_none() && location.is_none() {
        return Err(CliError::validation(
            "device edit",
            "nothing to change (use --name, --type, or --location)",
        ));
    }
    if coordinator.identity().role != Role::Admin {
        return Err(CliError::PermissionDenied {
            operation: "edit device".into(),
        });
    }

    let edit = DeviceEdit::new(name.as_deref(), device_type.as_deref(), location.as_deref())?;

    let device = coordinator.save_device_info(edit).await?;
    if !global.quiet {
        eprintln!("✓ Device information saved.");
    }
    let out = output::render_single(&global.output, device.as_ref(), device_detail, |d| {
        d.device_id.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gardenlink_core::Sensor;
    use serde_json::json;

    #[test]
    fn device_detail_fills_missing_fields() {
        let device = DeviceDescriptor::from_value(json!({
            "device_id": 4,
            "device_name": "Greenhouse",
            "auto_mode": true
        }))
        .unwrap();
        let text = device_detail(&device);
        assert!(text.starts_with("Greenhouse"));
        assert!(text.contains("Id:        4"));
        assert!(text.contains("Location:  N/A"));
        assert!(text.contains("Mode:      AUTO"));
    }

    #[test]
    fn reading_rows_cover_every_sensor() {
        let snap = SensorSnapshot::default();
        let rows = reading_rows(&snap);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[2].key, Sensor::SoilMoisture.to_string());
        assert!(rows.iter().all(|r| r.value == "--"));
    }
}
