//! Static HTML description page for a mirrored model.
//!
//! Every field is HTML-escaped except the model description, which the host
//! already delivers as sanitized markup and is embedded verbatim.

use std::path::Path;

use minijinja::{Environment, context};
use tracing::info;

use crate::error::FetchError;
use crate::local;
use crate::types::{ModelMetadata, Version};

const TEMPLATE_NAME: &str = "model_page.html";
const TEMPLATE: &str = include_str!("../templates/model_page.html");

/// Stylesheet linked from the page when none is configured.
pub const DEFAULT_STYLESHEET: &str = "style_html.css";

/// Inputs to the page that do not come from the model record.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// Host used for the model and creator links.
    pub host: &'a str,
    /// Path or URL of the external stylesheet.
    pub stylesheet: &'a str,
}

/// Render the page of `model` as released in `version`.
///
/// Output depends only on the arguments.
pub fn render_page(
    model: &ModelMetadata,
    version: &Version,
    page: &PageContext<'_>,
) -> Result<String, FetchError> {
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;
    let tmpl = env.get_template(TEMPLATE_NAME)?;

    let creator = model
        .creator
        .as_ref()
        .and_then(|c| c.username.as_deref())
        .unwrap_or_default();
    let avatar = model
        .creator
        .as_ref()
        .and_then(|c| c.image.as_deref())
        .unwrap_or_default();
    let download_url = version
        .download_url
        .as_deref()
        .or_else(|| version.files.first().map(|f| f.download_url.as_str()))
        .unwrap_or_default();
    let images: Vec<&str> = version.images.iter().map(|i| i.url.as_str()).collect();

    let html = tmpl.render(context! {
        stylesheet => page.stylesheet,
        model_url => format!("{}/models/{}", page.host, model.id),
        name => &model.name,
        creator => creator,
        creator_url => format!("{}/user/{}", page.host, creator),
        avatar => avatar,
        version_name => &version.name,
        base_model => version.base_model.as_deref().unwrap_or_default(),
        tags => &model.tags,
        download_url => download_url,
        description => model.description.as_deref().unwrap_or_default(),
        images => images,
    })?;

    Ok(html)
}

/// Write `html` to `path` unless a file already exists there.
pub fn write_page(html: &str, path: &Path) -> Result<bool, FetchError> {
    if local::write_if_absent(path, html.as_bytes())? {
        info!(path = %path.display(), "model page written");
        Ok(true)
    } else {
        info!(path = %path.display(), "model page already exists, leaving it untouched");
        Ok(false)
    }
}
