use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use image_compressor::{routes, BlobStore, CompressorPanel, ImageProcessor, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🦀 Starting Image Compressor Service");
    log::info!("📍 Listening on {}:{}", config.host, config.port);
    log::info!("📤 Upload limit: {} bytes", config.max_upload_bytes);

    // One panel shared by every worker
    let panel = web::Data::new(CompressorPanel::new(ImageProcessor::new(), BlobStore::new()));
    let max_upload_bytes = config.max_upload_bytes;
    let cors_max_age = config.cors_max_age;

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(cors_max_age);

        App::new()
            .app_data(panel.clone())
            .app_data(web::JsonConfig::default().limit(max_upload_bytes))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(routes::configure::<ImageProcessor>)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
