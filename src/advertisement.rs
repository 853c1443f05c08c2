use std::collections::HashMap;

use uuid::Uuid;

/// Signal strength reported for advertisements received before the adapter measured one.
pub const UNKNOWN_RSSI: i16 = i16::MIN;

/// A single received BLE advertisement.
///
/// Built by the scan backend for every advertisement it receives and
/// dropped right after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementEvent {
    /// Hardware address of the broadcasting device, e.g. `AA:BB:CC:DD:EE:FF`.
    pub address: String,
    /// Received signal strength indicator, or [`UNKNOWN_RSSI`] when the
    /// adapter has not reported one for the device yet.
    pub rssi: i16,
    /// Service data payloads keyed by service UUID.
    pub service_data: HashMap<Uuid, Vec<u8>>,
}

impl AdvertisementEvent {
    pub fn new(address: impl Into<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            rssi,
            service_data: HashMap::new(),
        }
    }

    /// Attach a service data payload
    pub fn with_service_data(mut self, service: Uuid, payload: impl Into<Vec<u8>>) -> Self {
        self.service_data.insert(service, payload.into());
        self
    }

    /// Payload advertised for `service`, if any.
    #[inline]
    pub fn service_payload(&self, service: &Uuid) -> Option<&[u8]> {
        self.service_data.get(service).map(Vec::as_slice)
    }
}

/// Why an advertisement was discarded without reaching its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The source address did not match the sniffer's address filter.
    AddressMismatch,
    /// The advertisement carried no payload for the handler's service.
    MissingService,
}

/// Optional observer notified with the source address of every dropped advertisement.
pub type DropObserver = Box<dyn Fn(&str, DropReason) + Send>;

/// Compares two hardware addresses ignoring ASCII case.
#[inline]
pub(crate) fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Normalizes a hardware address to the upper-case `XX:XX:XX:XX:XX:XX` form.
///
/// Returns `None` unless the input is six colon separated hex octets.
pub(crate) fn normalize_address(address: &str) -> Option<String> {
    let address = address.trim();
    let mut octets = 0;

    for octet in address.split(':') {
        if octet.len() != 2 || !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        octets += 1;
    }

    if octets == 6 {
        Some(address.to_ascii_uppercase())
    } else {
        None
    }
}
