//! Wire types for `GET /api/v1/models/{id}`.
//!
//! Only the fields the mirror consumes are modelled; everything else in the
//! response body is ignored. Optional fields default so that sparse upstream
//! records still decode.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Full model record as returned by the hosting API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub id: u64,
    pub name: String,
    /// Raw HTML markup, trusted as pre-sanitized by the host.
    #[serde(default)]
    pub description: Option<String>,
    /// Model category, e.g. `"Checkpoint"` or `"LORA"`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub creator: Option<Creator>,
    /// Newest first, in the order the host returns them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_versions: Vec<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A named release of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub base_model: Option<String>,
    /// Version-level download link; points at the host's default file.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<ModelFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    pub name: String,
    pub download_url: String,
    #[serde(rename = "sizeKB", default)]
    pub size_kb: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary: bool,
    /// Free-text packaging label such as `"Model"`, `"Pruned Model"` or `"VAE"`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl ModelFile {
    /// Advertised size in bytes, derived from `sizeKB`.
    pub fn expected_size(&self) -> Option<u64> {
        self.size_kb
            .filter(|kb| kb.is_finite() && *kb >= 0.0)
            .map(|kb| (kb * 1024.0).round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}
