//! This demo logs the service data of every advertisement received during ten seconds.
//! An optional device address can be given as a command line argument.

use miscale_sniffer::{AdvertisementEvent, BtleplugBackend, Error, HandlerError, Sniffer};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let address = std::env::args().nth(1);

    // Any closure taking an address and an advertisement is a handler
    let handler = |address: &str, event: &AdvertisementEvent| -> Result<(), HandlerError> {
        for (uuid, payload) in &event.service_data {
            println!("{} rssi={} {} {}", address, event.rssi, uuid, hex::encode(payload));
        }
        Ok(())
    };

    let mut sniffer = Sniffer::new(handler, address.as_deref())?;
    let mut backend = BtleplugBackend::new();

    sniffer.run(&mut backend, sleep(Duration::from_secs(10))).await
}
