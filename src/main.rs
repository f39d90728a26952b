#[macro_use]
extern crate rocket;

mod api;
mod config;
mod models;
mod services;
mod utils;

use rocket::{Build, Rocket};
use services::catalog::CatalogStore;
use services::ytdlp::YtDlp;

pub struct AppState {
    pub catalog: CatalogStore,
    pub ytdlp: YtDlp,
}

fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount(
            "/api",
            routes![
                api::get_catalog,
                api::replace_catalog,
                api::replace_series,
                api::clean_title_endpoint,
            ],
        )
        .mount(
            "/api/import",
            routes![
                api::import_playlist,
                api::import_playlist_stream,
                api::import_video,
                api::import_channel,
            ],
        )
}

#[launch]
fn rocket() -> _ {
    config::load_environment();
    config::init_logger();
    let cors = config::create_cors().expect("CORS configuration failed");
    build_rocket(config::create_app_state()).attach(cors)
}
