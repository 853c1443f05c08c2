use std::collections::HashMap;
use std::pin::Pin;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use stream_cancel::{Trigger, Valved};
use uuid::Uuid;

use crate::advertisement::UNKNOWN_RSSI;
use crate::{AdvertisementEvent, Error, Result};

/// Stream of advertisements produced by an active scan.
pub type AdvertisementStream = Pin<Box<dyn Stream<Item = AdvertisementEvent> + Send>>;

/// Source of BLE advertisements.
///
/// Only one scan may be active per backend. `stop_scan` must be idempotent,
/// and once it returns the stream handed out by `start_scan` yields nothing more.
pub trait ScanBackend: Send {
    /// Start scanning and return the stream of received advertisements.
    ///
    /// On failure nothing is left acquired. Returns [`Error::ScanInProgress`]
    /// when a scan started earlier is still active.
    fn start_scan(&mut self) -> BoxFuture<'_, Result<AdvertisementStream>>;

    /// Stop the active scan, if any.
    fn stop_scan(&mut self) -> BoxFuture<'_, Result<()>>;
}

struct Session {
    _manager: Manager,
    adapter: Adapter,
    stopper: Trigger,
}

/// [`ScanBackend`] on top of the platform Bluetooth stack.
#[derive(Default)]
pub struct BtleplugBackend {
    /// Index of the Bluetooth adapter to use. The first found adapter is used by default.
    adapter_index: usize,
    session: Option<Session>,
}

impl BtleplugBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    async fn start(&mut self) -> Result<AdvertisementStream> {
        if self.session.is_some() {
            return Err(Error::ScanInProgress);
        }

        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if self.adapter_index >= adapters.len() {
            return Err(btleplug::Error::DeviceNotFound.into());
        }

        let adapter = adapters.swap_remove(self.adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        let central_events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;

        log::info!("Started passive scan");

        let lookup_adapter = adapter.clone();
        let advertisements = central_events
            .then(move |event| {
                let adapter = lookup_adapter.clone();
                async move {
                    match event {
                        CentralEvent::ServiceDataAdvertisement { id, service_data } => {
                            to_advertisement(&adapter, &id, service_data).await
                        }
                        _ => None,
                    }
                }
            })
            .filter_map(|event| async move { event });

        let (stopper, advertisements) = Valved::new(advertisements.boxed());

        self.session = Some(Session {
            _manager: manager,
            adapter,
            stopper,
        });

        Ok(Box::pin(advertisements))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            let Session { adapter, stopper, .. } = session;
            drop(stopper);
            adapter.stop_scan().await?;

            log::info!("Stopped passive scan");
        } else {
            log::info!("Scanner is already stopped");
        }

        Ok(())
    }
}

impl ScanBackend for BtleplugBackend {
    fn start_scan(&mut self) -> BoxFuture<'_, Result<AdvertisementStream>> {
        self.start().boxed()
    }

    fn stop_scan(&mut self) -> BoxFuture<'_, Result<()>> {
        self.stop().boxed()
    }
}

/// Resolves the advertising peripheral and builds an event from its service data.
async fn to_advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
    service_data: HashMap<Uuid, Vec<u8>>,
) -> Option<AdvertisementEvent> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok().flatten();

    let rssi = properties
        .as_ref()
        .and_then(|props| props.rssi)
        .unwrap_or(UNKNOWN_RSSI);

    Some(AdvertisementEvent {
        address: peripheral.address().to_string(),
        rssi,
        service_data,
    })
}
