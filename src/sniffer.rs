use std::future::Future;

use futures::StreamExt;

use crate::advertisement::{normalize_address, same_address, DropObserver, DropReason};
use crate::backend::{AdvertisementStream, ScanBackend};
use crate::{AdvertisementEvent, AdvertisementHandler, Error, Result};

/// Builder for a [`Sniffer`].
#[derive(Default)]
pub struct SnifferBuilder {
    /// Consumer of advertisements that pass the address filter. Required.
    handler: Option<Box<dyn AdvertisementHandler>>,
    /// Only advertisements from this device are dispatched.
    address_filter: Option<String>,
    /// Notified about advertisements dropped by the address filter.
    drop_observer: Option<DropObserver>,
}

impl SnifferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that receives every advertisement passing the address filter
    pub fn handler(mut self, handler: impl AdvertisementHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Only dispatch advertisements from the device with this address
    pub fn filter_by_address(mut self, address: impl Into<String>) -> Self {
        self.address_filter = Some(address.into());
        self
    }

    /// Get notified about advertisements dropped by the address filter
    pub fn on_drop(mut self, observer: impl Fn(&str, DropReason) + Send + 'static) -> Self {
        self.drop_observer = Some(Box::new(observer));
        self
    }

    pub fn build(self) -> Result<Sniffer> {
        let handler = self
            .handler
            .ok_or_else(|| Error::configuration("no advertisement handler supplied"))?;

        let address_filter = self
            .address_filter
            .map(|address| {
                normalize_address(&address).ok_or_else(|| {
                    Error::configuration(format!(
                        "invalid device address {:?}, expected XX:XX:XX:XX:XX:XX",
                        address
                    ))
                })
            })
            .transpose()?;

        Ok(Sniffer {
            handler,
            address_filter,
            drop_observer: self.drop_observer,
        })
    }
}

/// Passive advertisement sniffer.
///
/// Drops advertisements from devices other than the configured one and hands
/// the rest, one at a time and in delivery order, to its handler.
pub struct Sniffer {
    handler: Box<dyn AdvertisementHandler>,
    /// Upper-cased at construction.
    address_filter: Option<String>,
    drop_observer: Option<DropObserver>,
}

impl Sniffer {
    pub fn builder() -> SnifferBuilder {
        SnifferBuilder::new()
    }

    pub fn new(handler: impl AdvertisementHandler + 'static, address_filter: Option<&str>) -> Result<Self> {
        let builder = Self::builder().handler(handler);

        match address_filter {
            Some(address) => builder.filter_by_address(address),
            None => builder,
        }
        .build()
    }

    pub fn address_filter(&self) -> Option<&str> {
        self.address_filter.as_deref()
    }

    /// Scan until `shutdown` resolves.
    ///
    /// The scan is stopped on every exit path before this returns, including
    /// when the handler fails. A scan that was already running when `run`
    /// was called ([`Error::ScanInProgress`]) is left alone. Resolution of `shutdown` and the backend ending
    /// its stream are both normal terminations.
    pub async fn run<B, F>(&mut self, backend: &mut B, shutdown: F) -> Result<()>
    where
        B: ScanBackend + ?Sized,
        F: Future<Output = ()>,
    {
        log::info!("Starting the scan");

        let mut advertisements = match backend.start_scan().await {
            Ok(advertisements) => advertisements,
            // The active scan belongs to whoever started it.
            Err(Error::ScanInProgress) => return Err(Error::ScanInProgress),
            Err(e) => {
                if let Err(stop_err) = backend.stop_scan().await {
                    log::warn!("Could not release the scan after failed start: {}", stop_err);
                }
                return Err(e);
            }
        };

        if let Some(address) = self.address_filter.as_deref() {
            log::debug!("Filtering advertisements by address {}", address);
        }

        let outcome = self.listen(&mut advertisements, shutdown).await;

        drop(advertisements);
        let stopped = backend.stop_scan().await;

        log::info!("Scanner was stopped.");

        outcome.and(stopped)
    }

    async fn listen<F>(&mut self, advertisements: &mut AdvertisementStream, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    log::info!("Scan cancelled");
                    return Ok(());
                }
                next = advertisements.next() => match next {
                    Some(event) => self.dispatch(&event)?,
                    None => {
                        log::info!("Advertisement stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    fn dispatch(&mut self, event: &AdvertisementEvent) -> Result<()> {
        if let Some(filter) = self.address_filter.as_deref() {
            if !same_address(&event.address, filter) {
                if let Some(observer) = self.drop_observer.as_ref() {
                    observer(&event.address, DropReason::AddressMismatch);
                }
                return Ok(());
            }
        }

        log::trace!("Advertisement from {} (rssi {})", event.address, event.rssi);

        self.handler.handle(&event.address, event).map_err(Error::Handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandlerError;
    use futures::future::{self, BoxFuture, FutureExt};
    use futures::stream;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        events: Vec<AdvertisementEvent>,
        fail_start: bool,
        /// Report a scan started by someone else.
        busy: bool,
        fail_stop: bool,
        /// Keep the stream open after the scripted events.
        hold_open: bool,
        starts: usize,
        stops: usize,
    }

    impl FakeBackend {
        fn with_events(events: Vec<AdvertisementEvent>) -> Self {
            Self {
                events,
                ..Default::default()
            }
        }
    }

    impl ScanBackend for FakeBackend {
        fn start_scan(&mut self) -> BoxFuture<'_, Result<AdvertisementStream>> {
            self.starts += 1;

            let result = if self.busy {
                Err(Error::ScanInProgress)
            } else if self.fail_start {
                Err(Error::Adapter("no bluetooth adapter".into()))
            } else {
                let events = stream::iter(std::mem::take(&mut self.events));
                Ok(if self.hold_open {
                    events.chain(stream::pending()).boxed()
                } else {
                    events.boxed()
                })
            };

            future::ready(result).boxed()
        }

        fn stop_scan(&mut self) -> BoxFuture<'_, Result<()>> {
            self.stops += 1;

            let result = if self.fail_stop {
                Err(Error::Adapter("adapter vanished".into()))
            } else {
                Ok(())
            };
            future::ready(result).boxed()
        }
    }

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recording_handler(seen: &Seen) -> impl AdvertisementHandler + 'static {
        let seen = seen.clone();
        move |address: &str, _: &AdvertisementEvent| -> std::result::Result<(), HandlerError> {
            seen.lock().unwrap().push(address.to_string());
            Ok(())
        }
    }

    fn event(address: &str) -> AdvertisementEvent {
        AdvertisementEvent::new(address, -60)
    }

    #[test]
    fn build_requires_handler() {
        let err = Sniffer::builder().filter_by_address("AA:BB:CC:DD:EE:FF").build().err().unwrap();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn build_rejects_malformed_address() {
        let seen = Seen::default();
        let err = Sniffer::new(recording_handler(&seen), Some("not-a-mac")).err().unwrap();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn build_normalizes_address() {
        let seen = Seen::default();
        let sniffer = Sniffer::new(recording_handler(&seen), Some("aa:bb:cc:dd:ee:ff")).unwrap();

        assert_eq!(sniffer.address_filter(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[tokio::test]
    async fn drops_other_devices() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), Some("AA:BB:CC:DD:EE:FF")).unwrap();
        let mut backend = FakeBackend::with_events(vec![
            event("11:22:33:44:55:66"),
            event("AA:BB:CC:DD:EE:FF"),
            event("AA:BB:CC:DD:EE:FE"),
        ]);

        sniffer.run(&mut backend, future::pending()).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["AA:BB:CC:DD:EE:FF"]);
    }

    #[tokio::test]
    async fn address_filter_ignores_case() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), Some("AA:BB:CC:DD:EE:FF")).unwrap();
        let mut backend = FakeBackend::with_events(vec![event("aa:bb:cc:dd:ee:ff"), event("Aa:bB:cC:Dd:eE:Ff")]);

        sniffer.run(&mut backend, future::pending()).await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dispatches_everything_without_filter() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend::with_events(vec![
            event("11:22:33:44:55:66"),
            event("AA:BB:CC:DD:EE:FF"),
            event("11:22:33:44:55:66"),
        ]);

        sniffer.run(&mut backend, future::pending()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["11:22:33:44:55:66", "AA:BB:CC:DD:EE:FF", "11:22:33:44:55:66"]
        );
    }

    #[tokio::test]
    async fn reports_address_drops_to_observer() {
        let seen = Seen::default();
        let drops = Arc::new(Mutex::new(Vec::new()));
        let mut sniffer = Sniffer::builder()
            .handler(recording_handler(&seen))
            .filter_by_address("AA:BB:CC:DD:EE:FF")
            .on_drop({
                let drops = drops.clone();
                move |address, reason| drops.lock().unwrap().push((address.to_string(), reason))
            })
            .build()
            .unwrap();
        let mut backend = FakeBackend::with_events(vec![event("11:22:33:44:55:66"), event("AA:BB:CC:DD:EE:FF")]);

        sniffer.run(&mut backend, future::pending()).await.unwrap();

        assert_eq!(
            *drops.lock().unwrap(),
            vec![("11:22:33:44:55:66".to_string(), DropReason::AddressMismatch)]
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_scan_once() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66")],
            hold_open: true,
            ..Default::default()
        };

        sniffer
            .run(&mut backend, tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!((backend.starts, backend.stops), (1, 1));
    }

    #[tokio::test]
    async fn handler_failure_stops_scan_then_propagates() {
        let calls = Arc::new(Mutex::new(0));
        let handler = {
            let calls = calls.clone();
            move |_: &str, _: &AdvertisementEvent| -> std::result::Result<(), HandlerError> {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                if *calls == 2 {
                    Err("decoder exploded".into())
                } else {
                    Ok(())
                }
            }
        };
        let mut sniffer = Sniffer::new(handler, None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66"); 3],
            hold_open: true,
            ..Default::default()
        };

        let err = sniffer.run(&mut backend, future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::Handler(ref e) if e.to_string() == "decoder exploded"));
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(backend.stops, 1);
    }

    #[tokio::test]
    async fn adapter_failure_is_reported() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66")],
            fail_start: true,
            ..Default::default()
        };

        let err = sniffer.run(&mut backend, future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::Adapter(_)));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(backend.stops, 1);
    }

    #[tokio::test]
    async fn stream_end_stops_scan() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend::default();

        sniffer.run(&mut backend, future::pending()).await.unwrap();

        assert_eq!((backend.starts, backend.stops), (1, 1));
    }

    #[tokio::test]
    async fn handler_error_wins_over_stop_error() {
        let handler = |_: &str, _: &AdvertisementEvent| -> std::result::Result<(), HandlerError> {
            Err("bad payload".into())
        };
        let mut sniffer = Sniffer::new(handler, None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66")],
            fail_stop: true,
            ..Default::default()
        };

        let err = sniffer.run(&mut backend, future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::Handler(ref e) if e.to_string() == "bad payload"));
        assert_eq!(backend.stops, 1);
    }

    #[tokio::test]
    async fn stop_error_after_clean_exit_is_an_adapter_error() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66")],
            fail_stop: true,
            ..Default::default()
        };

        let err = sniffer.run(&mut backend, future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::Adapter(ref e) if e.to_string() == "adapter vanished"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(backend.stops, 1);
    }

    #[tokio::test]
    async fn busy_backend_keeps_its_scan() {
        let seen = Seen::default();
        let mut sniffer = Sniffer::new(recording_handler(&seen), None).unwrap();
        let mut backend = FakeBackend {
            events: vec![event("11:22:33:44:55:66")],
            busy: true,
            ..Default::default()
        };

        let err = sniffer.run(&mut backend, future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::ScanInProgress));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!((backend.starts, backend.stops), (1, 0));
    }
}
