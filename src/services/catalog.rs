use crate::models::{CatalogDocument, SeriesRecord};
use log::{info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Preferred key order for a series record on disk. Keys outside this list
/// are appended afterward in their original order. This is a diff-stability
/// contract on the serialized form only.
const SERIES_KEY_ORDER: [&str; 10] = [
    "id",
    "title",
    "original_title",
    "studio",
    "release_year",
    "genres",
    "values",
    "synopsis",
    "images",
    "seasons",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File-backed catalog document. Concurrent load-modify-save cycles from the
/// HTTP surface are serialized behind one coarse lock; last writer wins is
/// not acceptable even for a single-operator tool once streaming imports
/// run next to edits.
pub struct CatalogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CatalogStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<CatalogDocument, CatalogError> {
        let _guard = self.lock.lock().await;
        self.read_document().await
    }

    /// Whole-document overwrite.
    pub async fn replace(&self, document: &CatalogDocument) -> Result<(), CatalogError> {
        let _guard = self.lock.lock().await;
        self.write_document(document).await
    }

    /// Replace the series matching `id`, holding the lock across the whole
    /// load-modify-save cycle. Returns whether a record matched; an unknown
    /// id still rewrites the document unchanged, like the original tool.
    pub async fn replace_series(
        &self,
        id: &str,
        record: SeriesRecord,
    ) -> Result<bool, CatalogError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let mut matched = false;
        for series in document.series.iter_mut() {
            if series.get("id").and_then(|v| v.as_str()) == Some(id) {
                *series = record;
                matched = true;
                break;
            }
        }
        if !matched {
            warn!("No series with id '{id}' in catalog, document left unchanged");
        }
        self.write_document(&document).await?;
        Ok(matched)
    }

    async fn read_document(&self) -> Result<CatalogDocument, CatalogError> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_document(&self, document: &CatalogDocument) -> Result<(), CatalogError> {
        let ordered = CatalogDocument {
            series: document.series.iter().map(reorder_series_keys).collect(),
        };
        // 4-space indentation, UTF-8 with non-ASCII preserved literally.
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        ordered.serialize(&mut serializer)?;
        tokio::fs::write(&self.path, buf).await?;
        info!(
            "Saved catalog with {} series to {}",
            ordered.series.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Rebuild one series map with the preferred keys first, regardless of the
/// order the in-memory representation happens to carry.
fn reorder_series_keys(record: &SeriesRecord) -> SeriesRecord {
    let mut ordered = SeriesRecord::new();
    for key in SERIES_KEY_ORDER {
        if let Some(value) = record.get(key) {
            ordered.insert(key.to_string(), value.clone());
        }
    }
    for (key, value) in record {
        if !ordered.contains_key(key) {
            ordered.insert(key.clone(), value.clone());
        }
    }
    ordered
}
