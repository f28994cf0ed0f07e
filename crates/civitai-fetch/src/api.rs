use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::downloader::Downloader;
use crate::error::FetchError;
use crate::publish::HfUploader;
use crate::types::ModelMetadata;

/// Public Civitai host.
pub const DEFAULT_HOST: &str = "https://civitai.com";

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Top-level builder for the hosting API client.
///
/// # Example
/// ```rust,no_run
/// use civitai_fetch::Api;
/// let client = Api::new()
///     .set_token("secret")
///     .no_progress()
///     .build()
///     .unwrap();
/// let model = client.fetch_model(827184).unwrap();
/// println!("{}", model.name);
/// ```
pub struct Api {
    pub(crate) host: String,
    pub(crate) token: Option<String>,
    pub(crate) proxy: Option<String>,
    pub(crate) show_progress: bool,
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

impl Api {
    /// Create a new `Api` instance.
    ///
    /// Proxy is automatically read from `HTTP_PROXY` / `HTTPS_PROXY` environment variables.
    pub fn new() -> Self {
        let proxy = env::var("HTTP_PROXY")
            .ok()
            .or_else(|| env::var("HTTPS_PROXY").ok());

        Self {
            host: DEFAULT_HOST.to_string(),
            token: None,
            proxy,
            show_progress: true,
        }
    }

    /// Override the API host (default: `https://civitai.com`).
    pub fn set_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Bearer token attached to metadata requests and downloads.
    pub fn set_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the HTTP/HTTPS proxy URL.
    pub fn set_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Connect directly, ignoring any proxy picked up from the environment.
    pub fn no_proxy(mut self) -> Self {
        self.proxy = None;
        self
    }

    /// Disable progress bars.
    pub fn no_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Build the blocking HTTP client and return a ready-to-use handle.
    pub fn build(self) -> Result<CivitaiClient, FetchError> {
        let http = http_client(self.proxy.as_deref())?;
        Ok(CivitaiClient {
            host: self.host,
            token: self.token,
            show_progress: self.show_progress,
            http,
        })
    }
}

/// Build the shared blocking client.
///
/// Only the connect phase is bounded; model files are large enough that a
/// whole-request timeout would abort healthy transfers. Proxy selection is
/// explicit: without `proxy` the client connects directly.
pub(crate) fn http_client(proxy: Option<&str>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(concat!("civitai-fetch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(None::<Duration>)
        .no_proxy();

    if let Some(proxy_url) = proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(p) => {
                builder = builder.proxy(p.no_proxy(reqwest::NoProxy::from_env()));
            }
            Err(e) => {
                warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy URL");
            }
        }
    }

    Ok(builder.build()?)
}

/// Handle to the hosting API produced by [`Api::build`].
#[derive(Clone)]
pub struct CivitaiClient {
    host: String,
    token: Option<String>,
    show_progress: bool,
    http: Client,
}

impl CivitaiClient {
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Human-facing page of a model, e.g. `https://civitai.com/models/42`.
    pub fn model_page_url(&self, model_id: u64) -> String {
        format!("{}/models/{}", self.host, model_id)
    }

    fn metadata_url(&self, model_id: u64) -> String {
        format!("{}/api/v1/models/{}", self.host, model_id)
    }

    /// Fetch the full metadata record of a model.
    ///
    /// Issues exactly one GET; any status other than 200 is a
    /// [`FetchError::Remote`].
    pub fn fetch_model(&self, model_id: u64) -> Result<ModelMetadata, FetchError> {
        let url = self.metadata_url(model_id);
        debug!(%url, "fetching model metadata");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send()?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::Remote {
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// A downloader sharing this client's connection pool and token.
    pub fn downloader(&self) -> Downloader {
        Downloader::new(self.http.clone(), self.token.clone(), self.show_progress)
    }

    /// A Hugging Face uploader sharing this client's connection pool.
    pub fn hf_uploader(&self, hf_token: impl Into<String>) -> HfUploader {
        HfUploader::new(self.http.clone(), hf_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "id": 42,
        "name": "Test Model",
        "type": "LORA",
        "tags": ["style"],
        "modelVersions": []
    }"#;

    #[test]
    fn test_api_defaults() {
        let api = Api::new();
        assert_eq!(api.host, DEFAULT_HOST);
        assert!(api.token.is_none());
        assert!(api.show_progress);
    }

    #[test]
    fn test_api_builder_methods() {
        let api = Api::new()
            .set_host("http://localhost:8080/")
            .set_token("t0k")
            .set_proxy("http://proxy:8080")
            .no_progress();

        assert_eq!(api.host, "http://localhost:8080");
        assert_eq!(api.token.as_deref(), Some("t0k"));
        assert_eq!(api.proxy, Some("http://proxy:8080".to_string()));
        assert!(!api.show_progress);
    }

    #[test]
    fn test_model_page_url() {
        let client = Api::new().set_host("https://example.org").build().unwrap();
        assert_eq!(client.model_page_url(9), "https://example.org/models/9");
    }

    #[test]
    fn test_fetch_model_sends_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v1/models/42")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .expect(1)
            .create();

        let client = Api::new()
            .set_host(server.url())
            .set_token("secret")
            .no_proxy()
            .build()
            .unwrap();
        let model = client.fetch_model(42).unwrap();

        assert_eq!(model.id, 42);
        assert_eq!(model.kind.as_deref(), Some("LORA"));
        mock.assert();
    }

    #[test]
    fn test_fetch_model_without_token_omits_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v1/models/42")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(BODY)
            .create();

        let client = Api::new().set_host(server.url()).no_proxy().build().unwrap();
        client.fetch_model(42).unwrap();
        mock.assert();
    }

    #[test]
    fn test_fetch_model_non_200_is_remote_error() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v1/models/404")
            .with_status(404)
            .expect(1)
            .create();

        let client = Api::new().set_host(server.url()).no_proxy().build().unwrap();
        let err = client.fetch_model(404).unwrap_err();

        assert!(matches!(err, FetchError::Remote { status: 404 }));
        mock.assert();
    }
}
