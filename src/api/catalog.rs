use crate::models::{
    CatalogDocument, CleanTitleRequest, CleanTitleResponse, ErrorResponse, SeriesRecord,
    UpdateResponse,
};
use crate::utils::clean_title;
use crate::AppState;
use log::{error, info};
use rocket::serde::json::Json;
use rocket::{get, post, put, State};

#[get("/series")]
pub async fn get_catalog(state: &State<AppState>) -> Result<Json<CatalogDocument>, ErrorResponse> {
    match state.catalog.load().await {
        Ok(document) => Ok(Json(document)),
        Err(e) => {
            error!("Failed to load catalog: {e}");
            Err(ErrorResponse::internal(format!("Failed to load catalog: {e}")))
        }
    }
}

#[put("/series", data = "<document>")]
pub async fn replace_catalog(
    state: &State<AppState>,
    document: Json<CatalogDocument>,
) -> Result<Json<UpdateResponse>, ErrorResponse> {
    match state.catalog.replace(&document).await {
        Ok(()) => {
            info!("Catalog replaced ({} series)", document.series.len());
            Ok(Json(UpdateResponse { success: true }))
        }
        Err(e) => {
            error!("Failed to save catalog: {e}");
            Err(ErrorResponse::internal(format!("Failed to save catalog: {e}")))
        }
    }
}

#[put("/series/<id>", data = "<record>")]
pub async fn replace_series(
    state: &State<AppState>,
    id: &str,
    record: Json<SeriesRecord>,
) -> Result<Json<UpdateResponse>, ErrorResponse> {
    match state.catalog.replace_series(id, record.into_inner()).await {
        Ok(matched) => {
            if matched {
                info!("Series '{id}' replaced");
            }
            Ok(Json(UpdateResponse { success: true }))
        }
        Err(e) => {
            error!("Failed to update series '{id}': {e}");
            Err(ErrorResponse::internal(format!("Failed to update series: {e}")))
        }
    }
}

#[post("/clean-title", data = "<request>")]
pub async fn clean_title_endpoint(request: Json<CleanTitleRequest>) -> Json<CleanTitleResponse> {
    Json(CleanTitleResponse {
        cleaned: clean_title(&request.title),
    })
}
