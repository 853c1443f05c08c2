use crate::{AdvertisementEvent, HandlerError};

/// Consumer of advertisements that passed the sniffer's address filter.
///
/// `handle` runs on the delivery path, so a slow implementation delays every
/// following advertisement. Implementations may apply their own filtering and
/// return `Ok(())` for events they are not interested in. An `Err` ends the
/// sniffing session.
pub trait AdvertisementHandler: Send {
    fn handle(&mut self, address: &str, event: &AdvertisementEvent) -> Result<(), HandlerError>;
}

impl<F> AdvertisementHandler for F
where
    F: FnMut(&str, &AdvertisementEvent) -> Result<(), HandlerError> + Send,
{
    fn handle(&mut self, address: &str, event: &AdvertisementEvent) -> Result<(), HandlerError> {
        self(address, event)
    }
}
