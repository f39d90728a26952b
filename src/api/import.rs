use crate::models::{
    ChannelInfo, ErrorResponse, PlaylistImportRequest, PlaylistImportResponse, UrlImportRequest,
    VideoRecord,
};
use crate::services::import;
use crate::AppState;
use log::{error, info};
use rocket::http::ContentType;
use rocket::response::stream::TextStream;
use rocket::serde::json::Json;
use rocket::{post, State};

fn require_url(url: &str) -> Result<(), ErrorResponse> {
    if url.trim().is_empty() {
        Err(ErrorResponse::bad_request("URL required"))
    } else {
        Ok(())
    }
}

fn ndjson() -> ContentType {
    ContentType::new("application", "x-ndjson")
}

#[post("/playlist", data = "<request>")]
pub async fn import_playlist(
    state: &State<AppState>,
    request: Json<PlaylistImportRequest>,
) -> Result<Json<PlaylistImportResponse>, ErrorResponse> {
    require_url(&request.url)?;
    match import::import_playlist(&state.ytdlp, &request.url, request.get_descriptions).await {
        Ok(videos) => {
            info!("Imported {} videos from {}", videos.len(), request.url);
            Ok(Json(PlaylistImportResponse { videos }))
        }
        Err(e) => {
            error!("Playlist import failed for {}: {e}", request.url);
            Err(ErrorResponse::bad_gateway(format!("Playlist import failed: {e}")))
        }
    }
}

/// Streaming variant of the playlist import: one ImportEvent per line.
/// Dropping the connection drops the stream, which tears down the
/// extraction process instead of leaving it running.
#[post("/playlist/stream", data = "<request>")]
pub async fn import_playlist_stream(
    state: &State<AppState>,
    request: Json<PlaylistImportRequest>,
) -> Result<(ContentType, TextStream![String]), ErrorResponse> {
    require_url(&request.url)?;
    let mut events = import::stream_playlist(&state.ytdlp, &request.url, request.get_descriptions)
        .map_err(|e| {
            error!("Streaming import failed to start for {}: {e}", request.url);
            ErrorResponse::bad_gateway(format!("Streaming import failed to start: {e}"))
        })?;

    Ok((
        ndjson(),
        TextStream! {
            while let Some(event) = events.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => {
                        yield line;
                        yield "\n".to_string();
                    }
                    Err(e) => {
                        error!("Failed to serialize import event: {e}");
                        break;
                    }
                }
            }
        },
    ))
}

#[post("/video", data = "<request>")]
pub async fn import_video(
    state: &State<AppState>,
    request: Json<UrlImportRequest>,
) -> Result<Json<VideoRecord>, ErrorResponse> {
    require_url(&request.url)?;
    match import::fetch_video(&state.ytdlp, &request.url).await {
        Ok(video) => Ok(Json(video)),
        Err(e) => {
            error!("Video import failed for {}: {e}", request.url);
            Err(ErrorResponse::bad_gateway(format!("Video import failed: {e}")))
        }
    }
}

#[post("/channel", data = "<request>")]
pub async fn import_channel(
    state: &State<AppState>,
    request: Json<UrlImportRequest>,
) -> Result<Json<ChannelInfo>, ErrorResponse> {
    require_url(&request.url)?;
    match import::fetch_channel(&state.ytdlp, &request.url).await {
        Ok(info) => Ok(Json(info)),
        Err(e) => {
            error!("Channel import failed for {}: {e}", request.url);
            Err(ErrorResponse::bad_gateway(format!("Channel import failed: {e}")))
        }
    }
}
