use actix_web::{middleware, web, App, HttpServer};
use stalkgen::{
    logger::{self, LoggerConfig},
    server::{self, AppState},
    Config, MemeService,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = Config::from_env();
    logger::init_with_config(LoggerConfig::for_environment(config.environment))?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &config);
    logger::log_config_info(&config);

    let service = match MemeService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            log::error!("❌ Failed to initialize image service: {}", e);
            return Err(e.into());
        }
    };
    let state = web::Data::new(AppState::new(service, config.environment));

    let cors_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(server::build_cors(&cors_config))
            .app_data(state.clone())
            .configure(server::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
