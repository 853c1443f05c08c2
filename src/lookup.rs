//! One-shot device lookup and GATT read.
//!
//! Unlike the [`Sniffer`](crate::Sniffer) this actively scans for a device by
//! its local name and then connects to it.

use std::fmt;
use std::time::Duration;

use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use uuid::Uuid;

use crate::{Error, Result};

/// What a found device last advertised about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub address: BDAddr,
    pub local_name: Option<String>,
    pub rssi: Option<i16>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        if let Some(name) = &self.local_name {
            write!(f, " name={:?}", name)?;
        }
        match self.rssi {
            Some(rssi) => write!(f, " rssi={}", rssi),
            None => write!(f, " rssi=n/a"),
        }
    }
}

#[derive(Debug)]
pub struct Device {
    _adapter: Adapter,
    peripheral: Peripheral,
}

impl Device {
    #[inline]
    pub fn address(&self) -> BDAddr {
        self.peripheral.address()
    }

    /// Snapshot of the advertised name and signal strength.
    pub async fn info(&self) -> DeviceInfo {
        let properties = self.peripheral.properties().await.ok().flatten();

        DeviceInfo {
            address: self.address(),
            local_name: properties.as_ref().and_then(|props| props.local_name.clone()),
            rssi: properties.and_then(|props| props.rssi),
        }
    }

    /// Connect if needed and read the value of the characteristic with the given UUID.
    pub async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>> {
        if !self.peripheral.is_connected().await? {
            log::debug!("Connecting to device {}", self.address());
            self.peripheral.connect().await?;
        }

        let mut characteristics = self.peripheral.characteristics();
        if characteristics.is_empty() {
            log::debug!("Discovering characteristics for {}", self.address());
            self.peripheral.discover_services().await?;
            characteristics = self.peripheral.characteristics();
        }

        let characteristic = characteristics
            .into_iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .ok_or(Error::CharacteristicNotFound(uuid))?;

        Ok(self.peripheral.read(&characteristic).await?)
    }

    /// Disconnect from the device
    #[inline]
    pub async fn disconnect(&self) -> Result<()> {
        Ok(self.peripheral.disconnect().await?)
    }
}

/// Scan until a device advertising `name` as its local name shows up.
///
/// Fails with [`Error::DeviceNotFound`] when nothing matches within `timeout`.
pub async fn find_by_name(adapter_index: usize, name: &str, timeout: Duration) -> Result<Device> {
    let manager = Manager::new().await?;
    let mut adapters = manager.adapters().await?;

    if adapter_index >= adapters.len() {
        return Err(btleplug::Error::DeviceNotFound.into());
    }

    let adapter = adapters.swap_remove(adapter_index);

    log::info!("Scanning for device {:?}", name);

    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    let search = async {
        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };

            if let Some(peripheral) = named_peripheral(&adapter, &id, name).await {
                return Some(peripheral);
            }
        }
        None
    };

    let found = tokio::time::timeout(timeout, search).await.ok().flatten();

    adapter.stop_scan().await?;

    match found {
        Some(peripheral) => {
            log::info!("Found device: {:?}", peripheral);
            Ok(Device {
                _adapter: adapter,
                peripheral,
            })
        }
        None => Err(Error::DeviceNotFound(name.to_string())),
    }
}

async fn named_peripheral(adapter: &Adapter, id: &PeripheralId, name: &str) -> Option<Peripheral> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let local_name = peripheral.properties().await.ok()??.local_name?;

    if local_name == name {
        Some(peripheral)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> BDAddr {
        BDAddr::from([0x88, 0x22, 0xB2, 0xF2, 0x74, 0x12])
    }

    #[test]
    fn displays_name_and_rssi() {
        let info = DeviceInfo {
            address: address(),
            local_name: Some("MIBFS".to_string()),
            rssi: Some(-58),
        };

        assert_eq!(info.to_string(), "88:22:B2:F2:74:12 name=\"MIBFS\" rssi=-58");
    }

    #[test]
    fn displays_missing_properties() {
        let info = DeviceInfo {
            address: address(),
            local_name: None,
            rssi: None,
        };

        assert_eq!(info.to_string(), "88:22:B2:F2:74:12 rssi=n/a");
    }
}
