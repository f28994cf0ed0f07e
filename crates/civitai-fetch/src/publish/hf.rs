//! Hugging Face Hub uploader.
//!
//! One file per commit. The hub's preupload probe decides whether the file
//! is committed inline (base64 in the NDJSON commit payload) or pushed to
//! LFS storage first and committed as a pointer. Large LFS objects are
//! split into the parts the hub asks for when it answers with a multipart
//! transfer.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::{Client, Response};
use reqwest::header::ETAG;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{RepoKind, Uploader};
use crate::error::PublishError;

/// Public Hugging Face Hub.
pub const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";

const DEFAULT_REVISION: &str = "main";
const SAMPLE_LEN: usize = 512;
const HASH_CHUNK: usize = 64 * 1024;
const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
/// Upload header that carries the part size of a multipart transfer.
const CHUNK_SIZE_HEADER: &str = "chunk_size";

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: String,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    #[serde(default)]
    upload: Option<LfsAction>,
    #[serde(default)]
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

/// Uploads files to a Hugging Face Hub repository over its HTTP API.
pub struct HfUploader {
    http: Client,
    token: String,
    endpoint: String,
    revision: String,
}

impl HfUploader {
    pub fn new(http: Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            endpoint: DEFAULT_HF_ENDPOINT.to_string(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }

    /// Override the hub endpoint (default: `https://huggingface.co`).
    pub fn set_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Target branch (default: `main`).
    pub fn set_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    fn api_base(&self, repo_id: &str, kind: RepoKind) -> String {
        format!("{}/api/{}s/{}", self.endpoint, kind.as_str(), repo_id)
    }

    fn lfs_batch_url(&self, repo_id: &str, kind: RepoKind) -> String {
        let prefix = match kind {
            RepoKind::Model => String::new(),
            other => format!("{}s/", other.as_str()),
        };
        format!(
            "{}/{}{}.git/info/lfs/objects/batch",
            self.endpoint, prefix, repo_id
        )
    }

    fn preupload(
        &self,
        repo_id: &str,
        kind: RepoKind,
        path_in_repo: &str,
        size: u64,
        sample: &[u8],
    ) -> Result<PreuploadFile, PublishError> {
        let url = format!("{}/preupload/{}", self.api_base(repo_id, kind), self.revision);
        let body = json!({
            "files": [{
                "path": path_in_repo,
                "size": size,
                "sample": BASE64.encode(sample),
            }]
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        let parsed: PreuploadResponse = serde_json::from_str(&ensure_success(resp, "preupload")?.text()?)?;

        parsed
            .files
            .into_iter()
            .find(|f| f.path == path_in_repo)
            .ok_or_else(|| PublishError::InvalidResponse {
                message: format!("preupload response does not mention {path_in_repo}"),
            })
    }

    /// Push the file body to LFS storage unless the hub already has it.
    fn upload_lfs(
        &self,
        local_path: &Path,
        repo_id: &str,
        kind: RepoKind,
        oid: &str,
        size: u64,
    ) -> Result<(), PublishError> {
        let body = json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "objects": [{ "oid": oid, "size": size }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });

        let resp = self
            .http
            .post(self.lfs_batch_url(repo_id, kind))
            .bearer_auth(&self.token)
            .header("Accept", LFS_MEDIA_TYPE)
            .header("Content-Type", LFS_MEDIA_TYPE)
            .body(body.to_string())
            .send()?;
        let batch: LfsBatchResponse = serde_json::from_str(&ensure_success(resp, "lfs batch")?.text()?)?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::InvalidResponse {
                message: "lfs batch response has no objects".into(),
            })?;

        if let Some(err) = object.error {
            return Err(PublishError::Rejected {
                operation: "lfs batch",
                status: err.code,
                message: err.message,
            });
        }

        let Some(actions) = object.actions else {
            debug!(%oid, "lfs object already stored");
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            if upload.header.contains_key(CHUNK_SIZE_HEADER) {
                self.upload_parts(local_path, oid, &upload)?;
            } else {
                let mut request = self.http.put(&upload.href).body(File::open(local_path)?);
                for (name, value) in &upload.header {
                    request = request.header(name.as_str(), value.as_str());
                }
                ensure_success(request.send()?, "lfs upload")?;
            }
        }

        if let Some(verify) = actions.verify {
            let mut request = self
                .http
                .post(&verify.href)
                .bearer_auth(&self.token)
                .header("Accept", LFS_MEDIA_TYPE)
                .header("Content-Type", LFS_MEDIA_TYPE)
                .body(json!({ "oid": oid, "size": size }).to_string());
            for (name, value) in &verify.header {
                request = request.header(name.as_str(), value.as_str());
            }
            ensure_success(request.send()?, "lfs verify")?;
        }

        Ok(())
    }

    /// Multipart transfer: `header` holds `chunk_size` plus one presigned URL
    /// per part, keyed by the zero-padded part number. Each part's ETag goes
    /// into the completion request sent to `href`.
    fn upload_parts(&self, local_path: &Path, oid: &str, upload: &LfsAction) -> Result<(), PublishError> {
        let chunk_size = upload
            .header
            .get(CHUNK_SIZE_HEADER)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| PublishError::InvalidResponse {
                message: "multipart upload without a usable chunk_size".into(),
            })?;

        let mut part_urls: Vec<(u32, &str)> = upload
            .header
            .iter()
            .filter_map(|(key, url)| key.parse::<u32>().ok().map(|n| (n, url.as_str())))
            .collect();
        if part_urls.is_empty() {
            return Err(PublishError::InvalidResponse {
                message: "multipart upload lists no part URLs".into(),
            });
        }
        part_urls.sort_unstable_by_key(|(n, _)| *n);

        let mut file = File::open(local_path)?;
        let mut parts = Vec::with_capacity(part_urls.len());
        for (number, url) in part_urls {
            let mut chunk = Vec::new();
            file.by_ref().take(chunk_size).read_to_end(&mut chunk)?;

            let resp = ensure_success(self.http.put(url).body(chunk).send()?, "lfs part upload")?;
            let etag = resp
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| PublishError::InvalidResponse {
                    message: format!("part {number} response has no ETag"),
                })?
                .to_string();
            debug!(part = number, %etag, "lfs part uploaded");
            parts.push(json!({ "partNumber": number, "etag": etag }));
        }

        let resp = self
            .http
            .post(&upload.href)
            .header("Accept", LFS_MEDIA_TYPE)
            .header("Content-Type", LFS_MEDIA_TYPE)
            .body(json!({ "oid": oid, "parts": parts }).to_string())
            .send()?;
        ensure_success(resp, "lfs multipart completion")?;
        Ok(())
    }

    fn commit(
        &self,
        repo_id: &str,
        kind: RepoKind,
        path_in_repo: &str,
        operation: serde_json::Value,
    ) -> Result<(), PublishError> {
        let url = format!("{}/commit/{}", self.api_base(repo_id, kind), self.revision);
        let header = json!({
            "key": "header",
            "value": {
                "summary": format!("Upload {path_in_repo}"),
                "description": "",
            }
        });
        let payload = format!("{header}\n{operation}\n");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()?;
        ensure_success(resp, "commit")?;
        Ok(())
    }
}

impl Uploader for HfUploader {
    fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        repo_id: &str,
        repo_kind: RepoKind,
    ) -> Result<(), PublishError> {
        let size = std::fs::metadata(local_path)?.len();
        let sample = read_sample(local_path)?;

        let probe = self.preupload(repo_id, repo_kind, path_in_repo, size, &sample)?;
        if probe.should_ignore {
            info!(%path_in_repo, "hub ignores this path, not committing");
            return Ok(());
        }

        let operation = if probe.upload_mode == "lfs" {
            let oid = sha256_file(local_path)?;
            self.upload_lfs(local_path, repo_id, repo_kind, &oid, size)?;
            json!({
                "key": "lfsFile",
                "value": {
                    "path": path_in_repo,
                    "algo": "sha256",
                    "oid": oid,
                    "size": size,
                }
            })
        } else {
            let content = std::fs::read(local_path)?;
            json!({
                "key": "file",
                "value": {
                    "content": BASE64.encode(content),
                    "path": path_in_repo,
                    "encoding": "base64",
                }
            })
        };

        self.commit(repo_id, repo_kind, path_in_repo, operation)
    }
}

fn ensure_success(resp: Response, operation: &'static str) -> Result<Response, PublishError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().unwrap_or_default();
    Err(PublishError::Rejected {
        operation,
        status: status.as_u16(),
        message,
    })
}

fn read_sample(path: &Path) -> Result<Vec<u8>, PublishError> {
    let mut sample = Vec::with_capacity(SAMPLE_LEN);
    File::open(path)?
        .take(SAMPLE_LEN as u64)
        .read_to_end(&mut sample)?;
    Ok(sample)
}

fn sha256_file(path: &Path) -> Result<String, PublishError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
