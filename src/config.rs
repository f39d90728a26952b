use crate::services::catalog::CatalogStore;
use crate::services::ytdlp::YtDlp;
use crate::AppState;
use anyhow::Result;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;

lazy_static! {
    pub static ref CATALOG_PATH: String =
        env::var("CATALOG_PATH").unwrap_or_else(|_| "series/series_es.json".to_string());
    pub static ref ALLOWED_ORIGIN: String =
        env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

pub fn init_logger() {
    Builder::new().filter_level(LevelFilter::Info).parse_default_env().init();
    info!("Starting catalog backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn create_app_state() -> AppState {
    let ytdlp = YtDlp::resolve();
    let catalog = CatalogStore::new(&*CATALOG_PATH);
    info!("Catalog file: {}", catalog.path().display());
    info!("Extraction tool: {}", ytdlp.program().display());
    AppState { catalog, ytdlp }
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[ALLOWED_ORIGIN.as_str()]))
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Options,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type"]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
