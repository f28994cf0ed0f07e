//! Version and file selection.
//!
//! Upstream metadata is not always consistent about which file is the
//! "real" model, so file choice falls back through three rules in a fixed
//! order: the `primary` flag, then a `type` of `Model` (any case), then the
//! first listed file.

use crate::error::FetchError;
use crate::types::{ModelFile, ModelMetadata, Version};

/// A version and one of its files, both borrowed from the metadata record.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub version: &'a Version,
    pub file: &'a ModelFile,
}

/// Pick the requested version, or the first listed one when none is requested.
///
/// The remote order is kept as-is; the first entry is the host's latest.
pub fn select_version(
    model: &ModelMetadata,
    requested: Option<u64>,
) -> Result<&Version, FetchError> {
    match requested {
        Some(version_id) => model
            .model_versions
            .iter()
            .find(|v| v.id == version_id)
            .ok_or(FetchError::VersionNotFound { version_id }),
        None => model
            .model_versions
            .first()
            .ok_or(FetchError::NoVersionAvailable { model_id: model.id }),
    }
}

/// Pick the file to download from a version.
pub fn select_file(version: &Version) -> Result<&ModelFile, FetchError> {
    let files = &version.files;

    files
        .iter()
        .find(|f| f.primary)
        .or_else(|| {
            files.iter().find(|f| {
                f.kind
                    .as_deref()
                    .is_some_and(|k| k.eq_ignore_ascii_case("model"))
            })
        })
        .or_else(|| files.first())
        .ok_or(FetchError::NoFileAvailable {
            version_id: version.id,
        })
}

/// Resolve both the version and the file in one step.
pub fn select(model: &ModelMetadata, requested: Option<u64>) -> Result<Selection<'_>, FetchError> {
    let version = select_version(model, requested)?;
    let file = select_file(version)?;
    Ok(Selection { version, file })
}
