//! READINGS and STATUS payloads.
//!
//! Both are fixed-size little-endian records. Physical quantities travel as
//! centi-scaled integers (temperature in centi-degrees, humidity in
//! centi-percent, pressure in centi-hPa) and are only converted to floating
//! point at the broker boundary.

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

use super::require_exact;

/// Barometric pressure trend reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PressureTrend {
    /// Pressure falling
    #[default]
    Falling = 0,
    /// Pressure steady
    Steady = 1,
    /// Pressure rising
    Rising = 2,
}

impl PressureTrend {
    /// Decode from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Falling),
            1 => Some(Self::Steady),
            2 => Some(Self::Rising),
            _ => None,
        }
    }

    /// Symbolic name used in broker messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Falling => "falling",
            Self::Steady => "steady",
            Self::Rising => "rising",
        }
    }
}

/// Periodic sensor readings (20 bytes on the wire).
///
/// ```text
/// offset  size  field
/// 0       2     temperature      i16, centi-degrees C
/// 2       2     humidity         u16, centi-percent
/// 4       4     pressure         u32, centi-hPa
/// 8       2     altitude         i16, metres
/// 10      2     battery          u16, millivolts
/// 12      1     battery percent  u8
/// 13      2     pressure change  i16, centi-hPa
/// 15      1     trend            0 falling / 1 steady / 2 rising
/// 16      4     timestamp        u32, device epoch seconds
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingsPayload {
    /// Temperature in centi-degrees Celsius
    pub temperature_centi: i16,
    /// Relative humidity in centi-percent
    pub humidity_centi: u16,
    /// Absolute pressure in centi-hPa
    pub pressure_centi: u32,
    /// Altitude in metres
    pub altitude_m: i16,
    /// Battery voltage in millivolts
    pub battery_mv: u16,
    /// Battery charge percentage
    pub battery_percent: u8,
    /// Pressure change since last report, centi-hPa
    pub pressure_change_centi: i16,
    /// Pressure trend
    pub trend: PressureTrend,
    /// Device-side timestamp of the measurement
    pub timestamp: u32,
}

impl ReadingsPayload {
    /// Fixed wire size.
    pub const SIZE: usize = 20;

    /// Temperature in degrees Celsius.
    #[must_use]
    pub fn temperature_c(&self) -> f64 {
        f64::from(self.temperature_centi) / 100.0
    }

    /// Relative humidity in percent.
    #[must_use]
    pub fn humidity_pct(&self) -> f64 {
        f64::from(self.humidity_centi) / 100.0
    }

    /// Pressure in hPa.
    #[must_use]
    pub fn pressure_hpa(&self) -> f64 {
        f64::from(self.pressure_centi) / 100.0
    }

    /// Pressure change in hPa.
    #[must_use]
    pub fn pressure_change_hpa(&self) -> f64 {
        f64::from(self.pressure_change_centi) / 100.0
    }

    /// Battery voltage in volts.
    #[must_use]
    pub fn battery_volts(&self) -> f64 {
        f64::from(self.battery_mv) / 1000.0
    }

    /// Serialize to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.temperature_centi.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.humidity_centi.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.pressure_centi.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.altitude_m.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.battery_mv.to_le_bytes());
        bytes[12] = self.battery_percent;
        bytes[13..15].copy_from_slice(&self.pressure_change_centi.to_le_bytes());
        bytes[15] = self.trend as u8;
        bytes[16..20].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Decode from the fixed wire layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        require_exact(MessageType::Readings, Self::SIZE, bytes.len())?;

        let trend = PressureTrend::from_u8(bytes[15])
            .ok_or(ProtocolError::InvalidFieldValue { field: "trend", value: bytes[15] })?;

        Ok(Self {
            temperature_centi: i16::from_le_bytes([bytes[0], bytes[1]]),
            humidity_centi: u16::from_le_bytes([bytes[2], bytes[3]]),
            pressure_centi: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            altitude_m: i16::from_le_bytes([bytes[8], bytes[9]]),
            battery_mv: u16::from_le_bytes([bytes[10], bytes[11]]),
            battery_percent: bytes[12],
            pressure_change_centi: i16::from_le_bytes([bytes[13], bytes[14]]),
            trend,
            timestamp: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        })
    }
}

/// Length of the padded name/location fields in STATUS.
const NAME_LEN: usize = 16;

/// Device status report (60 bytes on the wire).
///
/// Name and location are NUL-padded fixed fields; empty strings mean the
/// device has nothing configured and the bridge keeps its own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPayload {
    /// Device-reported name, NUL-padded
    pub name: [u8; NAME_LEN],
    /// Device-reported location, NUL-padded
    pub location: [u8; NAME_LEN],
    /// Uptime in seconds
    pub uptime_s: u32,
    /// Number of deep-sleep wakeups since boot
    pub wake_count: u32,
    /// Sensor self-check result
    pub sensor_healthy: bool,
    /// RSSI of the last downlink heard by the device, dBm
    pub rssi_dbm: i16,
    /// SNR of the last downlink heard by the device, dB
    pub snr_db: i8,
    /// Free heap in bytes
    pub free_heap: u32,
    /// Sensor read failures since boot
    pub sensor_failures: u16,
    /// Radio transmit failures since boot
    pub tx_failures: u16,
    /// Device timestamp of the last successful transmit
    pub last_tx_success: u32,
    /// Configured read interval, seconds
    pub read_interval_s: u16,
    /// Configured deep-sleep duration, seconds
    pub deep_sleep_s: u16,
}

impl Default for StatusPayload {
    fn default() -> Self {
        Self {
            name: [0; NAME_LEN],
            location: [0; NAME_LEN],
            uptime_s: 0,
            wake_count: 0,
            sensor_healthy: true,
            rssi_dbm: 0,
            snr_db: 0,
            free_heap: 0,
            sensor_failures: 0,
            tx_failures: 0,
            last_tx_success: 0,
            read_interval_s: 0,
            deep_sleep_s: 0,
        }
    }
}

impl StatusPayload {
    /// Fixed wire size.
    pub const SIZE: usize = 60;

    /// Device-reported name with padding stripped.
    #[must_use]
    pub fn name_str(&self) -> String {
        padded_str(&self.name)
    }

    /// Device-reported location with padding stripped.
    #[must_use]
    pub fn location_str(&self) -> String {
        padded_str(&self.location)
    }

    /// Build the NUL-padded fixed field from a string, truncating at 16
    /// bytes.
    #[must_use]
    pub fn pad_field(text: &str) -> [u8; NAME_LEN] {
        let mut field = [0u8; NAME_LEN];
        let take = text.len().min(NAME_LEN);
        field[..take].copy_from_slice(&text.as_bytes()[..take]);
        field
    }

    /// Serialize to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..16].copy_from_slice(&self.name);
        bytes[16..32].copy_from_slice(&self.location);
        bytes[32..36].copy_from_slice(&self.uptime_s.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.wake_count.to_le_bytes());
        bytes[40] = u8::from(self.sensor_healthy);
        bytes[41..43].copy_from_slice(&self.rssi_dbm.to_le_bytes());
        bytes[43] = self.snr_db as u8;
        bytes[44..48].copy_from_slice(&self.free_heap.to_le_bytes());
        bytes[48..50].copy_from_slice(&self.sensor_failures.to_le_bytes());
        bytes[50..52].copy_from_slice(&self.tx_failures.to_le_bytes());
        bytes[52..56].copy_from_slice(&self.last_tx_success.to_le_bytes());
        bytes[56..58].copy_from_slice(&self.read_interval_s.to_le_bytes());
        bytes[58..60].copy_from_slice(&self.deep_sleep_s.to_le_bytes());
        bytes
    }

    /// Decode from the fixed wire layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        require_exact(MessageType::Status, Self::SIZE, bytes.len())?;

        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[0..16]);
        let mut location = [0u8; NAME_LEN];
        location.copy_from_slice(&bytes[16..32]);

        Ok(Self {
            name,
            location,
            uptime_s: u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]),
            wake_count: u32::from_le_bytes([bytes[36], bytes[37], bytes[38], bytes[39]]),
            sensor_healthy: bytes[40] != 0,
            rssi_dbm: i16::from_le_bytes([bytes[41], bytes[42]]),
            snr_db: bytes[43] as i8,
            free_heap: u32::from_le_bytes([bytes[44], bytes[45], bytes[46], bytes[47]]),
            sensor_failures: u16::from_le_bytes([bytes[48], bytes[49]]),
            tx_failures: u16::from_le_bytes([bytes[50], bytes[51]]),
            last_tx_success: u32::from_le_bytes([bytes[52], bytes[53], bytes[54], bytes[55]]),
            read_interval_s: u16::from_le_bytes([bytes[56], bytes[57]]),
            deep_sleep_s: u16::from_le_bytes([bytes[58], bytes[59]]),
        })
    }
}

/// Strip trailing NUL padding and decode lossily.
fn padded_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
