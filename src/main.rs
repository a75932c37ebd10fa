use anyhow::{Context, Result};
use tracing::{info, warn};

use skyatlas::climate::load_raster;
use skyatlas::http::plain_client;
use skyatlas::{AppConfig, AppServices, VERSION, logging, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;
    info!("Starting SkyAtlas {}", VERSION);

    let climate = match config.climate.raster.as_deref() {
        Some(source) => {
            let client = plain_client(config.weather.timeout())?;
            load_raster(source, &client).await
        }
        None => {
            warn!("No climate raster configured; climate lookups will report Unknown");
            None
        }
    };

    let services = AppServices::from_config(&config, climate)
        .context("Failed to initialize services")?;

    web::run(&config.server, services).await
}
