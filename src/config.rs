//! Process configuration, read once at startup from the environment.

use std::str::FromStr;

use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

use crate::{Error, Result};

pub const DEVICE_NAME_VAR: &str = "BLE_DEVICE_NAME";
pub const DEVICE_MAC_VAR: &str = "BLE_DEVICE_MAC";
pub const SERVICE_UUID_VAR: &str = "BCS_UUID";
pub const ADAPTER_INDEX_VAR: &str = "BLE_ADAPTER_INDEX";
pub const CHARACTERISTIC_UUID_VAR: &str = "BLE_CHARACTERISTIC_UUID";

/// Body Composition Service, advertised by the Mi Scale.
pub const BODY_COMPOSITION_SERVICE: Uuid = uuid_from_u16(0x181B);

/// Battery Level characteristic, read by default by the one-shot reader.
pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Local name of the target device. Only used for device lookup.
    pub device_name: Option<String>,
    /// Hardware address used as the sniffer's address filter.
    pub device_mac: Option<String>,
    /// Service whose data the print handler reports.
    pub service_uuid: Option<Uuid>,
    /// Index of the Bluetooth adapter to use.
    pub adapter_index: usize,
    /// Characteristic read by the one-shot reader.
    pub characteristic_uuid: Uuid,
}

impl Config {
    /// Loads a `.env` file when present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Could not load .env file: {}", e),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let service_uuid = get(SERVICE_UUID_VAR)
            .map(|value| parse_uuid(SERVICE_UUID_VAR, &value))
            .transpose()?;

        let adapter_index = get(ADAPTER_INDEX_VAR)
            .map(|value| {
                usize::from_str(&value).map_err(|e| {
                    Error::configuration(format!("{} must be a non-negative integer: {}", ADAPTER_INDEX_VAR, e))
                })
            })
            .transpose()?
            .unwrap_or_default();

        let characteristic_uuid = get(CHARACTERISTIC_UUID_VAR)
            .map(|value| parse_uuid(CHARACTERISTIC_UUID_VAR, &value))
            .transpose()?
            .unwrap_or(BATTERY_LEVEL);

        Ok(Config {
            device_name: get(DEVICE_NAME_VAR),
            device_mac: get(DEVICE_MAC_VAR),
            service_uuid,
            adapter_index,
            characteristic_uuid,
        })
    }
}

fn parse_uuid(key: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::configuration(format!("{} is not a valid UUID: {}", key, e)))
}
