use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::serde::{Deserialize, Serialize};
use rocket::{response, Response};
use serde_json::{Map, Value};
use std::io::Cursor;

/// One video entry as produced by the import pipeline. `url` and `thumbnail`
/// are always derived from `id`, never copied from the tool's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: String,
    pub id: String,
    pub url: String,
    pub duration: i64, // seconds, 0 when unknown
    pub thumbnail: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub title: String,
    pub channel_id: String,
    pub thumbnail: String,
}

/// Progress events of one import run, serialized one-per-line on the
/// NDJSON streaming endpoint. `Count` is emitted at most once and only
/// when the probe succeeded; `Done` is the single terminal event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    Count { total: u64 },
    Video { video: VideoRecord, current: usize },
    Done { videos: Vec<VideoRecord> },
}

/// A series entry is kept as a raw JSON map so unknown keys survive a
/// load/save round trip. Key order on disk is enforced by the catalog store.
pub type SeriesRecord = Map<String, Value>;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub series: Vec<SeriesRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistImportRequest {
    pub url: String,
    #[serde(default)]
    pub get_descriptions: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistImportResponse {
    pub videos: Vec<VideoRecord>,
}

#[derive(Debug, Deserialize)]
pub struct UrlImportRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CleanTitleRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanTitleResponse {
    pub cleaned: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: Status,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse {
            status: Status::BadRequest,
            error: "bad_request".to_string(),
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ErrorResponse {
            status: Status::BadGateway,
            error: "tool_failure".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ErrorResponse {
            status: Status::InternalServerError,
            error: "internal_error".to_string(),
            message: message.into(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).unwrap_or_default();
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}
