//! The mirror pipeline: resolve, fetch, select, download, describe, publish.
//!
//! Stages run strictly in order. Selection happens before anything touches
//! the filesystem, so a bad version id leaves no trace on disk. Every
//! artifact that already exists is kept as-is, which makes re-runs cheap.


use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{info, warn};

use crate::api::CivitaiClient;
use crate::descriptor::ModelDescriptor;
use crate::downloader::DownloadOutcome;
use crate::error::FetchError;
use crate::page::{self, DEFAULT_STYLESHEET, PageContext};
use crate::publish::{self, PublishReport, PublishTarget, Uploader};
use crate::record::{self, LocalArtifactRecord};
use crate::select;

const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const DEFAULT_IMAGE_EXT: &str = ".jpg";

/// Knobs for a pipeline run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Parent of the per-model directory.
    pub output_dir: PathBuf,
    /// Whether to write the `<name>.html` description page.
    pub render_page: bool,
    /// Stylesheet linked from the page.
    pub stylesheet: String,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            render_page: true,
            stylesheet: DEFAULT_STYLESHEET.to_string(),
        }
    }
}

/// A downloaded (or already present) binary artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub outcome: DownloadOutcome,
}

/// A generated text artifact; `written` is false when an existing file was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub written: bool,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct MirrorReport {
    pub model_dir: PathBuf,
    pub model_file: Artifact,
    pub preview_image: Option<Artifact>,
    pub sidecar: GeneratedFile,
    pub page: Option<GeneratedFile>,
    pub publish: Option<PublishReport>,
}

struct Publisher {
    uploader: Box<dyn Uploader>,
    target: PublishTarget,
}

/// One pipeline, with the page and publish stages switched on by configuration.
pub struct Pipeline {
    client: CivitaiClient,
    options: MirrorOptions,
    publisher: Option<Publisher>,
}

impl Pipeline {
    pub fn new(client: CivitaiClient, options: MirrorOptions) -> Self {
        Self {
            client,
            options,
            publisher: None,
        }
    }

    /// Enable the publish stage.
    pub fn with_publisher(mut self, uploader: impl Uploader + 'static, target: PublishTarget) -> Self {
        self.publisher = Some(Publisher {
            uploader: Box::new(uploader),
            target,
        });
        self
    }

    /// Mirror the model addressed by `url`.
    pub fn run(&self, url: &str) -> Result<MirrorReport, FetchError> {
        let descriptor = ModelDescriptor::parse(url)?;
        info!(%descriptor, "resolving model");

        let model = self.client.fetch_model(descriptor.model_id)?;
        let selection = select::select(&model, descriptor.requested_version_id)?;
        info!(
            model = %model.name,
            version = selection.version.id,
            file = %selection.file.name,
            file_type = selection.file.kind.as_deref().unwrap_or("unknown"),
            "selected file"
        );

        let base_name = sanitize_name(&model.name, model.id);
        let model_dir = self.options.output_dir.join(&base_name);
        fs::create_dir_all(&model_dir)?;

        let downloader = self.client.downloader();

        let model_path = model_dir.join(file_component(&selection.file.name, &base_name));
        let outcome = downloader.download(
            &selection.file.download_url,
            &model_path,
            selection.file.expected_size(),
        )?;
        let model_file = Artifact {
            path: model_path,
            outcome,
        };

        let preview_image = match selection.version.images.first() {
            Some(image) => {
                let path = model_dir.join(format!("{}{}", base_name, image_extension(&image.url)));
                let outcome = downloader.download(&image.url, &path, None)?;
                Some(Artifact { path, outcome })
            }
            None => {
                warn!(version = selection.version.id, "version has no preview image");
                None
            }
        };

        let record = LocalArtifactRecord::new(
            &model,
            &selection,
            self.client.model_page_url(model.id),
        );
        let sidecar_path = model_dir.join(format!("{base_name}.json"));
        let sidecar = GeneratedFile {
            written: record::write_sidecar(&record, &sidecar_path)?,
            path: sidecar_path,
        };

        let page = if self.options.render_page {
            let ctx = PageContext {
                host: self.client.host(),
                stylesheet: &self.options.stylesheet,
            };
            let html = page::render_page(&model, selection.version, &ctx)?;
            let path = model_dir.join(format!("{base_name}.html"));
            Some(GeneratedFile {
                written: page::write_page(&html, &path)?,
                path,
            })
        } else {
            None
        };

        info!(dir = %model_dir.display(), "all artifacts in place");

        let publish = match &self.publisher {
            Some(p) => {
                let report = publish::publish_dir(p.uploader.as_ref(), &model_dir, &base_name, &p.target)?;
                info!(
                    repo = %p.target.repo_id,
                    uploaded = report.uploaded.len(),
                    failed = report.failed.len(),
                    "publish finished"
                );
                Some(report)
            }
            None => None,
        };

        Ok(MirrorReport {
            model_dir,
            model_file,
            preview_image,
            sidecar,
            page,
            publish,
        })
    }
}

/// Directory and base file name for a model: the display name without
/// characters that are invalid in Windows file names.
pub fn sanitize_name(name: &str, model_id: u64) -> String {
    let cleaned: String = name.chars().filter(|c| !FORBIDDEN_NAME_CHARS.contains(c)).collect();
    match cleaned.trim() {
        "" | "." | ".." => model_id.to_string(),
        _ => cleaned,
    }
}

/// Last path component of a remote file name, so it cannot escape the model directory.
fn file_component(name: &str, fallback: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Extension (with the dot) of the path part of `url`, or `.jpg`.
pub fn image_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    Path::new(&path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string())
}
