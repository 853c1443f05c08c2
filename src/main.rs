use std::process::ExitCode;

use miscale_sniffer::{BtleplugBackend, Config, Error, PrintHandler, Sniffer};

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init();

    match run().await {
        Ok(()) => {
            println!("Stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;

    let handler = PrintHandler::new(config.service_uuid);
    let mut sniffer = Sniffer::new(handler, config.device_mac.as_deref())?;

    if config.service_uuid.is_none() {
        log::warn!("No service UUID configured, no advertisement will be printed");
    }

    println!("Listening for Mi Scale advertisements… (Ctrl+C to stop)");
    if let Some(address) = sniffer.address_filter() {
        println!("  filter: {}", address);
    }

    let mut backend = BtleplugBackend::new().adapter_index(config.adapter_index);

    sniffer
        .run(&mut backend, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for Ctrl+C: {}", e);
                futures::future::pending::<()>().await;
            }
        })
        .await
}
