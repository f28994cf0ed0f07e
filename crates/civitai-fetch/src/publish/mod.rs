//! Best-effort re-upload of a mirrored model directory.
//!
//! A failed file is logged and recorded, and the batch moves on to the next
//! one. Callers get a [`PublishReport`] listing both outcomes.

mod hf;

pub use hf::{DEFAULT_HF_ENDPOINT, HfUploader};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{FetchError, PublishError};

/// Kind of repository on the publishing hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoKind {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" => Ok(RepoKind::Model),
            "dataset" => Ok(RepoKind::Dataset),
            "space" => Ok(RepoKind::Space),
            other => Err(format!("unknown repository kind: {other}")),
        }
    }
}

/// Uploads one local file into a hub repository.
pub trait Uploader {
    fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        repo_id: &str,
        repo_kind: RepoKind,
    ) -> Result<(), PublishError>;
}

/// Where a mirrored directory is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub repo_id: String,
    pub repo_kind: RepoKind,
}

/// A file that could not be uploaded.
#[derive(Debug)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub error: PublishError,
}

/// Per-file result of a publish batch.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub uploaded: Vec<PathBuf>,
    pub failed: Vec<FailedUpload>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload every top-level regular file in `dir` to `<prefix>/<file name>`.
///
/// Subdirectories are skipped and files are visited in name order. Only
/// failing to list `dir` is an error; upload failures end up in the report.
pub fn publish_dir<U: Uploader + ?Sized>(
    uploader: &U,
    dir: &Path,
    prefix: &str,
    target: &PublishTarget,
) -> Result<PublishReport, FetchError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();

    let mut report = PublishReport::default();
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path_in_repo = if prefix.is_empty() {
            file_name
        } else {
            format!("{prefix}/{file_name}")
        };

        info!(file = %path.display(), repo = %target.repo_id, %path_in_repo, "uploading");
        match uploader.upload_file(&path, &path_in_repo, &target.repo_id, target.repo_kind) {
            Ok(()) => {
                info!(file = %path.display(), repo = %target.repo_id, "upload finished");
                report.uploaded.push(path);
            }
            Err(error) => {
                warn!(file = %path.display(), repo = %target.repo_id, %error, "upload failed");
                report.failed.push(FailedUpload { path, error });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tracing_test::traced_test;

    use super::*;

    /// Records every call and fails on the names it is told to.
    struct FakeUploader {
        fail_on: Vec<&'static str>,
        calls: RefCell<Vec<(String, String, RepoKind)>>,
    }

    impl FakeUploader {
        fn new(fail_on: Vec<&'static str>) -> Self {
            Self {
                fail_on,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Uploader for FakeUploader {
        fn upload_file(
            &self,
            local_path: &Path,
            path_in_repo: &str,
            repo_id: &str,
            repo_kind: RepoKind,
        ) -> Result<(), PublishError> {
            self.calls
                .borrow_mut()
                .push((path_in_repo.to_string(), repo_id.to_string(), repo_kind));
            let name = local_path.file_name().unwrap().to_string_lossy();
            if self.fail_on.iter().any(|f| *f == name) {
                return Err(PublishError::Rejected {
                    operation: "commit",
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn target() -> PublishTarget {
        PublishTarget {
            repo_id: "me/mirror".into(),
            repo_kind: RepoKind::Model,
        }
    }

    #[test]
    #[traced_test]
    fn test_failure_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.json", "b.safetensors", "c.jpg"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let uploader = FakeUploader::new(vec!["b.safetensors"]);
        let report = publish_dir(&uploader, dir.path(), "Model", &target()).unwrap();

        let calls = uploader.calls.borrow();
        let paths: Vec<&str> = calls.iter().map(|c| c.0.as_str()).collect();
        assert_eq!(paths, ["Model/a.json", "Model/b.safetensors", "Model/c.jpg"]);
        assert!(calls.iter().all(|c| c.1 == "me/mirror" && c.2 == RepoKind::Model));

        assert_eq!(report.uploaded.len(), 2);
        assert!(report.uploaded[1].ends_with("c.jpg"));
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("b.safetensors"));
        assert!(!report.is_complete());
        assert!(logs_contain("upload failed"));
    }

    #[test]
    fn test_subdirectories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/inner.txt"), "y").unwrap();

        let uploader = FakeUploader::new(vec![]);
        let report = publish_dir(&uploader, dir.path(), "", &target()).unwrap();

        assert_eq!(uploader.calls.borrow().len(), 1);
        assert_eq!(uploader.calls.borrow()[0].0, "top.txt");
        assert!(report.is_complete());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = FakeUploader::new(vec![]);
        let err = publish_dir(&uploader, &dir.path().join("nope"), "x", &target()).unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }

    #[test]
    fn test_repo_kind_parse() {
        assert_eq!("Dataset".parse::<RepoKind>().unwrap(), RepoKind::Dataset);
        assert_eq!("space".parse::<RepoKind>().unwrap(), RepoKind::Space);
        assert!("org".parse::<RepoKind>().is_err());
        assert_eq!(RepoKind::default().to_string(), "model");
    }
}
