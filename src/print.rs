use std::io::{self, Stdout, Write};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::advertisement::{DropObserver, DropReason, UNKNOWN_RSSI};
use crate::{AdvertisementEvent, AdvertisementHandler, HandlerError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prints one line per advertisement that carries data for the configured service.
///
/// Advertisements without a payload for the service are ignored. When no
/// service is configured every advertisement is ignored.
pub struct PrintHandler<W = Stdout> {
    service: Option<Uuid>,
    out: W,
    drop_observer: Option<DropObserver>,
}

impl PrintHandler<Stdout> {
    pub fn new(service: Option<Uuid>) -> Self {
        Self::with_writer(service, io::stdout())
    }
}

impl<W: Write + Send> PrintHandler<W> {
    pub fn with_writer(service: Option<Uuid>, out: W) -> Self {
        Self {
            service,
            out,
            drop_observer: None,
        }
    }

    /// Get notified about advertisements ignored because they lack the service payload
    pub fn on_drop(mut self, observer: impl Fn(&str, DropReason) + Send + 'static) -> Self {
        self.drop_observer = Some(Box::new(observer));
        self
    }

    pub fn service(&self) -> Option<Uuid> {
        self.service
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> AdvertisementHandler for PrintHandler<W> {
    fn handle(&mut self, address: &str, event: &AdvertisementEvent) -> Result<(), HandlerError> {
        let payload = match self.service.as_ref().and_then(|uuid| event.service_payload(uuid)) {
            Some(payload) if !payload.is_empty() => payload,
            _ => {
                if let Some(observer) = self.drop_observer.as_ref() {
                    observer(address, DropReason::MissingService);
                }
                return Ok(());
            }
        };

        let line = format_line(&Local::now(), address, event.rssi, payload);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;

        Ok(())
    }
}

/// Formats a received payload as
/// `[timestamp] addr=<address> rssi=<rssi> len=<n> payload_hex=<hex>`.
///
/// An unknown signal strength is written as `rssi=n/a`.
pub fn format_line(timestamp: &DateTime<Local>, address: &str, rssi: i16, payload: &[u8]) -> String {
    let rssi = if rssi == UNKNOWN_RSSI {
        "n/a".to_string()
    } else {
        rssi.to_string()
    };

    format!(
        "[{}] addr={} rssi={} len={} payload_hex={}",
        timestamp.format(TIMESTAMP_FORMAT),
        address,
        rssi,
        payload.len(),
        hex::encode(payload)
    )
}
