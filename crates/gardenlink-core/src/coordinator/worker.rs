// ── Background workers ──
//
// One spawned task per network call. A worker reads nothing shared: it
// gets a client clone, a token clone and its inputs, performs the request,
// classifies the outcome, and sends the result back to the owner task.

use chrono::Utc;
use gardenlink_api::GardenClient;
use secrecy::SecretString;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::classify::{classify, unwrap_device, unwrap_telemetry, unwrap_users};
use crate::error::CoreError;
use crate::model::{CommandName, DeviceDescriptor, DeviceEdit, SensorSnapshot, UserId, UserRecord};
use crate::store::Sequence;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, CoreError>>;

/// Results handed back to the owner task.
pub(crate) enum Completion {
    Sensors {
        cycle: Option<u64>,
        seq: Sequence,
        result: Result<SensorSnapshot, CoreError>,
    },
    Device {
        cycle: Option<u64>,
        seq: Sequence,
        result: Result<DeviceDescriptor, CoreError>,
    },
    DeviceSaved {
        seq: Sequence,
        edit: DeviceEdit,
        result: Result<(), CoreError>,
        reply: Reply<std::sync::Arc<DeviceDescriptor>>,
    },
    UsersListed {
        result: Result<Vec<UserRecord>, CoreError>,
        reply: Reply<Vec<UserRecord>>,
    },
    UserDeleted {
        id: UserId,
        result: Result<(), CoreError>,
        reply: Reply<()>,
    },
}

// ── Requests ─────────────────────────────────────────────────────

pub(crate) async fn fetch_sensors(
    client: &GardenClient,
    token: &SecretString,
    template: &str,
    device_id: &str,
) -> Result<SensorSnapshot, CoreError> {
    let body = classify(client.telemetry(token, template, device_id).await, &[]).into_result()?;
    SensorSnapshot::from_value(unwrap_telemetry(body), Utc::now())
}

pub(crate) async fn fetch_device(
    client: &GardenClient,
    token: &SecretString,
    device_id: &str,
) -> Result<DeviceDescriptor, CoreError> {
    let body = classify(client.device(token, device_id).await, &[]).into_result()?;
    DeviceDescriptor::from_value(unwrap_device(body))
}

pub(crate) async fn send_command(
    client: &GardenClient,
    token: &SecretString,
    device_id: &str,
    name: CommandName,
) -> Result<(), CoreError> {
    debug!(device_id, command = %name, "sending command");
    classify(client.device_command(token, device_id, name.as_wire()).await, &[])
        .into_result()
        .map(drop)
}

pub(crate) async fn save_device(
    client: &GardenClient,
    token: &SecretString,
    device_id: &str,
    edit: &DeviceEdit,
) -> Result<(), CoreError> {
    classify(client.update_device(token, device_id, &edit.to_fields()).await, &[])
        .into_result()
        .map(drop)
}

pub(crate) async fn list_users(
    client: &GardenClient,
    token: &SecretString,
) -> Result<Vec<UserRecord>, CoreError> {
    let body = classify(client.list_users(token).await, &[]).into_result()?;
    let users = unwrap_users(body)
        .iter()
        .filter_map(|raw| match UserRecord::from_value(raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "skipping user entry");
                None
            }
        })
        .collect();
    Ok(users)
}

pub(crate) async fn delete_user(
    client: &GardenClient,
    token: &SecretString,
    id: &UserId,
) -> Result<(), CoreError> {
    classify(client.delete_user(token, id.as_str()).await, &[])
        .into_result()
        .map(drop)
}
