//! The JSON sidecar stored next to a downloaded model.
//!
//! Field names and order are consumed by other tooling and must not change.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::error::FetchError;
use crate::local;
use crate::select::Selection;
use crate::types::ModelMetadata;

const UNKNOWN_TYPE: &str = "Unknown";

/// Flattened projection of a model, its selected version and selected file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalArtifactRecord {
    pub model_id: u64,
    pub model_name: String,
    pub model_description: String,
    pub model_url: String,
    pub model_type: String,
    pub model_tags: Vec<String>,
    pub download_link: String,
    pub preview_image_url: String,
    pub model_version_id: String,
    pub model_version_download_link: String,
    pub model_version_image_url: String,
}

impl LocalArtifactRecord {
    pub fn new(model: &ModelMetadata, selection: &Selection<'_>, model_url: String) -> Self {
        let image_url = selection
            .version
            .images
            .first()
            .map(|i| i.url.clone())
            .unwrap_or_default();
        let version_link = selection
            .version
            .download_url
            .clone()
            .unwrap_or_else(|| selection.file.download_url.clone());

        Self {
            model_id: model.id,
            model_name: model.name.clone(),
            model_description: model.description.clone().unwrap_or_default(),
            model_url,
            model_type: model
                .kind
                .clone()
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            model_tags: model.tags.clone(),
            download_link: version_link.clone(),
            preview_image_url: image_url.clone(),
            model_version_id: selection.version.id.to_string(),
            model_version_download_link: version_link,
            model_version_image_url: image_url,
        }
    }

    /// Serialize with four-space indentation, leaving non-ASCII text as-is.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FetchError> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

/// Write `record` to `path` unless a file already exists there.
///
/// Returns `true` when the file was written, `false` when it was left alone.
pub fn write_sidecar(record: &LocalArtifactRecord, path: &Path) -> Result<bool, FetchError> {
    let bytes = record.to_json_bytes()?;

    if local::write_if_absent(path, &bytes)? {
        info!(path = %path.display(), "metadata file written");
        Ok(true)
    } else {
        info!(path = %path.display(), "metadata file already exists, leaving it untouched");
        Ok(false)
    }
}
