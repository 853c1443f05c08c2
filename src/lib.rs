//! Passive BLE advertisement sniffer for the Xiaomi Mi Body Composition Scale.
//!
//! A [`Sniffer`] listens for advertisements, drops the ones that do not come
//! from the configured device and hands the rest to an
//! [`AdvertisementHandler`]. Handlers decide what to do with an advertisement
//! and may apply their own filtering, e.g. [`PrintHandler`] only reports the
//! payload of a single service.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use miscale_sniffer::config::BODY_COMPOSITION_SERVICE;
//! use miscale_sniffer::{BtleplugBackend, Error, PrintHandler, Sniffer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let handler = PrintHandler::new(Some(BODY_COMPOSITION_SERVICE));
//!     let mut sniffer = Sniffer::new(handler, Some("88:22:B2:F2:74:12"))?;
//!
//!     // Sniff until Ctrl+C is pressed
//!     let mut backend = BtleplugBackend::new();
//!     sniffer
//!         .run(&mut backend, async {
//!             tokio::signal::ctrl_c().await.ok();
//!         })
//!         .await
//! }
//!```

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use advertisement::{AdvertisementEvent, DropObserver, DropReason, UNKNOWN_RSSI};
pub use backend::{AdvertisementStream, BtleplugBackend, ScanBackend};
pub use config::Config;
pub use error::{BoxError, Error, HandlerError, Result};
pub use handler::AdvertisementHandler;
pub use print::PrintHandler;
pub use sniffer::{Sniffer, SnifferBuilder};

mod advertisement;
mod backend;
mod error;
mod handler;
mod sniffer;

pub mod config;
pub mod lookup;
pub mod print;
