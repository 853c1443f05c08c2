//! Finds the configured device by name, connects to it and reads one characteristic.

use std::process::ExitCode;
use std::time::Duration;

use miscale_sniffer::config::DEVICE_NAME_VAR;
use miscale_sniffer::{lookup, Config, Error};

const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;

    let name = config
        .device_name
        .ok_or_else(|| Error::Configuration(format!("{} is not set", DEVICE_NAME_VAR)))?;

    let device = lookup::find_by_name(config.adapter_index, &name, SCAN_TIMEOUT).await?;
    println!("Found {}", device.info().await);

    let value = device.read_characteristic(config.characteristic_uuid).await;

    if let Err(e) = device.disconnect().await {
        log::warn!("Could not disconnect from {}: {}", device.address(), e);
    }

    let value = value?;
    println!(
        "{} = {} ({} bytes)",
        config.characteristic_uuid,
        hex::encode(&value),
        value.len()
    );

    Ok(())
}
