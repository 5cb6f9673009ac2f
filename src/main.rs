use log::{error, info, LevelFilter};

/// Logging configuration, relative to the working directory.
const LOG_CONFIG: &str = "log4rs.yaml";

async fn run() -> Result<(), rocket::Error> {
    info!("Configuring server...");
    let rocket = voto_backend::build().ignite().await?;
    let config = rocket.config();
    info!(
        "...server configured, listening on {}:{}",
        config.address, config.port
    );
    // Disable rocket logging from now on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, log4rs_dynamic_filters::default_deserializers()) {
        eprintln!("Failed to initialise logging from {LOG_CONFIG}: {e}");
        std::process::exit(1)
    }
    info!("Initialised logging");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
