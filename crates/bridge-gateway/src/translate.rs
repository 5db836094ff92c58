//! Broker translator: binary payloads to JSON messages and JSON commands to
//! binary command parameters.
//!
//! Outbound messages are flat objects with physical units: centi-scaled
//! integers become floats here and nowhere else. Inbound commands are
//! validated against the action table before anything reaches the queue.

use bridge_core::DecodedRecord;
use bridge_proto::{
    CommandType, DeviceId, EventPayload, ReadingsPayload, StatusPayload,
};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Per-device topic under the configured prefix.
#[must_use]
pub fn device_topic(prefix: &str, id: DeviceId, channel: &str) -> String {
    format!("{prefix}/{}/{channel}", id.hex())
}

/// Flat readings message for `<prefix>/<HEX>/readings`.
#[must_use]
pub fn readings_message(
    id: DeviceId,
    name: &str,
    location: &str,
    payload: &ReadingsPayload,
    record: &DecodedRecord,
) -> Value {
    json!({
        "device_id": id.hex(),
        "name": name,
        "location": location,
        "sequence": record.header.sequence,
        "temperature": payload.temperature_c(),
        "humidity": payload.humidity_pct(),
        "pressure": payload.pressure_hpa(),
        "altitude": payload.altitude_m,
        "battery_voltage": payload.battery_volts(),
        "battery_percent": payload.battery_percent,
        "pressure_change": payload.pressure_change_hpa(),
        "pressure_trend": payload.trend.as_str(),
        "timestamp": payload.timestamp,
        "rssi": record.rssi_dbm,
        "snr": record.snr_db,
        "received_at": record.received_unix(),
    })
}

/// Flat status message for `<prefix>/<HEX>/status`.
#[must_use]
pub fn status_message(
    id: DeviceId,
    name: &str,
    location: &str,
    payload: &StatusPayload,
    record: &DecodedRecord,
) -> Value {
    json!({
        "device_id": id.hex(),
        "name": name,
        "location": location,
        "sequence": record.header.sequence,
        "uptime_s": payload.uptime_s,
        "wake_count": payload.wake_count,
        "sensor_healthy": payload.sensor_healthy,
        "device_rssi": payload.rssi_dbm,
        "device_snr": payload.snr_db,
        "free_heap": payload.free_heap,
        "sensor_failures": payload.sensor_failures,
        "tx_failures": payload.tx_failures,
        "last_tx_success": payload.last_tx_success,
        "read_interval_s": payload.read_interval_s,
        "deep_sleep_s": payload.deep_sleep_s,
        "rssi": record.rssi_dbm,
        "snr": record.snr_db,
        "received_at": record.received_unix(),
    })
}

/// Event message for `<prefix>/<HEX>/events`, severity by symbolic name.
#[must_use]
pub fn event_message(
    id: DeviceId,
    name: &str,
    payload: &EventPayload,
    record: &DecodedRecord,
) -> Value {
    json!({
        "device_id": id.hex(),
        "name": name,
        "sequence": record.header.sequence,
        "event_type": payload.event_type,
        "severity": payload.severity.as_str(),
        "message": payload.message_str(),
        "rssi": record.rssi_dbm,
        "snr": record.snr_db,
        "received_at": record.received_unix(),
    })
}

/// Retained gateway status document (also the broker last will).
#[must_use]
pub fn gateway_status_message(gateway_id: &str, address: &str, online: bool) -> Value {
    json!({
        "gateway_id": gateway_id,
        "status": if online { "online" } else { "offline" },
        "address": address,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Command acknowledgement for the ack topic.
#[must_use]
pub fn ack_message(device_id: &str, action: &str, status: &str) -> Value {
    json!({
        "device_id": device_id,
        "action": action,
        "status": status,
    })
}

/// Recognized command actions on the command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    /// Set the sensor read interval (seconds)
    SetInterval,
    /// Set the deep-sleep duration (seconds, 0 disables deep sleep)
    SetSleep,
    /// Restart the device
    Restart,
    /// Request an immediate status report
    Status,
    /// Recalibrate the pressure sensor
    Calibrate,
    /// Set the sea-level pressure baseline (hPa)
    SetBaseline,
    /// Clear the pressure baseline
    ClearBaseline,
}

impl CommandAction {
    /// Token used on the command and ack topics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetInterval => "set_interval",
            Self::SetSleep => "set_sleep",
            Self::Restart => "restart",
            Self::Status => "status",
            Self::Calibrate => "calibrate",
            Self::SetBaseline => "set_baseline",
            Self::ClearBaseline => "clear_baseline",
        }
    }

    /// Wire command type for this action.
    #[must_use]
    pub fn command_type(self) -> CommandType {
        match self {
            Self::SetInterval => CommandType::SetInterval,
            Self::SetSleep => CommandType::SetSleep,
            Self::Restart => CommandType::Restart,
            Self::Status => CommandType::ReportStatus,
            Self::Calibrate => CommandType::Calibrate,
            Self::SetBaseline => CommandType::SetBaseline,
            Self::ClearBaseline => CommandType::ClearBaseline,
        }
    }
}

/// Inbound command object on the command topic.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Target device as a 16-hex-char token
    pub device_id: String,
    /// Requested action
    pub action: CommandAction,
    /// Numeric parameter for actions that take one
    #[serde(default)]
    pub value: Option<f64>,
}

/// Why a command request was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandRejection {
    /// The device id token is not 16 hex characters.
    #[error("invalid device id `{0}`")]
    BadDeviceId(String),

    /// The action needs a value and none was supplied.
    #[error("action `{0}` requires a value")]
    MissingValue(&'static str),

    /// The action takes an integer and the value has a fraction.
    #[error("action `{action}` takes an integer, got {value}")]
    NotAnInteger {
        /// Action token
        action: &'static str,
        /// Offending value
        value: f64,
    },

    /// The value falls outside the action's accepted range.
    #[error("value {value} out of range {min}..={max} for `{action}`")]
    OutOfRange {
        /// Action token
        action: &'static str,
        /// Offending value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },
}

/// Validate a command request against the action table and produce the
/// wire command type plus ASCII-decimal parameter bytes.
pub fn validate_command(
    request: &CommandRequest,
) -> Result<(DeviceId, CommandType, Vec<u8>), CommandRejection> {
    let device = DeviceId::from_hex(&request.device_id)
        .ok_or_else(|| CommandRejection::BadDeviceId(request.device_id.clone()))?;

    let action = request.action;
    let params = match action {
        CommandAction::SetInterval => integer_param(action, request.value, 5.0, 3600.0)?,
        // 0 disables deep sleep on the device side.
        CommandAction::SetSleep => integer_param(action, request.value, 0.0, 3600.0)?,
        CommandAction::SetBaseline => {
            let value = request.value.ok_or(CommandRejection::MissingValue(action.as_str()))?;
            if !(900.0..=1100.0).contains(&value) {
                return Err(CommandRejection::OutOfRange {
                    action: action.as_str(),
                    value,
                    min: 900.0,
                    max: 1100.0,
                });
            }
            format!("{value}").into_bytes()
        }
        CommandAction::Restart
        | CommandAction::Status
        | CommandAction::Calibrate
        | CommandAction::ClearBaseline => Vec::new(),
    };

    Ok((device, action.command_type(), params))
}

fn integer_param(
    action: CommandAction,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<Vec<u8>, CommandRejection> {
    let value = value.ok_or(CommandRejection::MissingValue(action.as_str()))?;
    if value.fract() != 0.0 {
        return Err(CommandRejection::NotAnInteger { action: action.as_str(), value });
    }
    if !(min..=max).contains(&value) {
        return Err(CommandRejection::OutOfRange { action: action.as_str(), value, min, max });
    }
    Ok(format!("{}", value as u32).into_bytes())
}
