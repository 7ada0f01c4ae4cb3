use clap::Parser;
use sentinel_locator::adapters::catalog::CatalogSettings;
use sentinel_locator::adapters::{
    http_client, BigQueryCatalog, GeofabrikBoundarySource, GoogleGeocoder, StorageListingClient,
};
use sentinel_locator::utils::error::ErrorSeverity;
use sentinel_locator::utils::{logger, validation::Validate};
use sentinel_locator::{BoundingBox, CliConfig, Command, GeoPoint, ImageLocator, TomlConfig};
use std::sync::Arc;

fn build_locator(config: &TomlConfig) -> sentinel_locator::Result<ImageLocator> {
    // 所有 adapter 共用同一個 client
    let client = http_client(config.request_timeout())?;
    let endpoints = &config.endpoints;

    let catalog = BigQueryCatalog::new(
        client.clone(),
        CatalogSettings {
            api_url: endpoints.catalog_api_url.clone(),
            project: endpoints.catalog_project.clone(),
            table: endpoints.catalog_table.clone(),
            access_token: endpoints.catalog_access_token.clone(),
        },
    );
    let geocoder = GoogleGeocoder::new(
        client.clone(),
        endpoints.geocode_api_url.clone(),
        endpoints.geocode_api_key.clone(),
    );
    let lister = StorageListingClient::new(client.clone());
    let boundaries = GeofabrikBoundarySource::new(client, endpoints.boundary_base_url.clone());

    Ok(ImageLocator::new(
        config,
        Arc::new(catalog),
        Arc::new(geocoder),
        Arc::new(lister),
    )?
    .with_boundary_source(Arc::new(boundaries)))
}

async fn run(cli: &CliConfig, locator: &ImageLocator) -> sentinel_locator::Result<String> {
    match &cli.command {
        Command::Point { lat, lng } => {
            let point = GeoPoint::new(*lat, *lng)?;
            locator.images_at_point(&point).await?.to_json()
        }
        Command::Address { address } => locator.images_at_address(address).await?.to_json(),
        Command::Area {
            north,
            south,
            east,
            west,
        } => {
            let bbox = BoundingBox::new(*north, *south, *east, *west)?;
            locator.images_in_area(&bbox).await?.to_json()
        }
        Command::Polygon { file } => {
            let text = std::fs::read_to_string(file)?;
            let count = locator.image_count_in_polygon(&text).await?;
            Ok(serde_json::to_string(&count)?)
        }
        Command::Region { region, country } => {
            let count = locator.image_count_in_region(region, country).await?;
            Ok(serde_json::to_string(&count)?)
        }
    }
}

fn exit_with(e: &sentinel_locator::LocatorError) -> ! {
    tracing::error!(
        "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting sentinel-locator");
    tracing::debug!("CLI arguments: {:?}", cli);

    let config = match cli.load_config().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    let locator = match build_locator(&config) {
        Ok(locator) => locator,
        Err(e) => exit_with(&e),
    };

    match run(&cli, &locator).await {
        Ok(output) => {
            println!("{}", output);
            tracing::info!("✅ Done");
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}
