use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::local;

const CHUNK_SIZE: usize = 64 * 1024;

const BAR_TEMPLATE: &str =
    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

/// What [`Downloader::download`] did for a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was already complete; no request was made.
    Skipped,
    /// The file was fetched and `bytes` were written.
    Downloaded { bytes: u64 },
}

/// Streams remote files to disk, skipping targets that are already complete.
pub struct Downloader {
    client: Client,
    token: Option<String>,
    show_progress: bool,
}

impl Downloader {
    pub fn new(client: Client, token: Option<String>, show_progress: bool) -> Self {
        Self {
            client,
            token,
            show_progress,
        }
    }

    /// Download `url` to `dest` unless `dest` already holds the complete file.
    ///
    /// An existing file whose size differs from `expected_size` is replaced by
    /// a full download. When `expected_size` is given and the response body
    /// has a different length, the written file is left in place and
    /// [`FetchError::IncompleteDownload`] is returned.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
    ) -> Result<DownloadOutcome, FetchError> {
        if local::check(dest, expected_size).is_complete() {
            info!(path = %dest.display(), "file already present, skipping download");
            return Ok(DownloadOutcome::Skipped);
        }

        info!(%url, path = %dest.display(), "downloading");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut resp = request.send()?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::Download {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bar = self.progress_bar(resp.content_length(), label);

        let mut out = BufWriter::new(File::create(dest)?);
        let written = copy_chunked(&mut resp, &mut out, &bar)?;
        out.flush()?;
        bar.finish_and_clear();

        if let Some(expected) = expected_size {
            if written != expected {
                return Err(FetchError::IncompleteDownload {
                    path: dest.to_path_buf(),
                    expected,
                    actual: written,
                });
            }
        }

        info!(path = %dest.display(), bytes = written, "download finished");
        Ok(DownloadOutcome::Downloaded { bytes: written })
    }

    fn progress_bar(&self, total: Option<u64>, label: String) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let (bar, template) = match total {
            Some(len) => (ProgressBar::new(len), BAR_TEMPLATE),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(label);
        bar
    }
}

/// Copy `reader` into `writer` in fixed-size chunks, advancing `bar` by the
/// cumulative byte count.
fn copy_chunked<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    bar: &ProgressBar,
) -> Result<u64, FetchError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
        bar.inc(n as u64);
    }

    debug!(bytes = written, "stream drained");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Api;

    fn downloader(server: &mockito::ServerGuard, token: Option<&str>) -> Downloader {
        let mut api = Api::new().set_host(server.url()).no_proxy().no_progress();
        if let Some(t) = token {
            api = api.set_token(t);
        }
        api.build().unwrap().downloader()
    }

    #[test]
    fn test_downloads_and_creates_parent_dirs() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/files/a.bin")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body("0123456789")
            .expect(1)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/deeper/a.bin");
        let url = format!("{}/files/a.bin", server.url());

        let outcome = downloader(&server, Some("tok"))
            .download(&url, &dest, Some(10))
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: 10 });
        assert_eq!(fs::read(&dest).unwrap(), b"0123456789");
        mock.assert();
    }

    #[test]
    fn test_complete_file_makes_no_request() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/files/a.bin").expect(0).create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        fs::write(&dest, b"abc").unwrap();
        let url = format!("{}/files/a.bin", server.url());

        let d = downloader(&server, None);
        assert_eq!(d.download(&url, &dest, Some(3)).unwrap(), DownloadOutcome::Skipped);
        assert_eq!(d.download(&url, &dest, None).unwrap(), DownloadOutcome::Skipped);
        mock.assert();
    }

    #[test]
    fn test_size_mismatch_triggers_full_redownload() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/files/a.bin")
            .with_status(200)
            .with_body("abcdef")
            .expect(1)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        fs::write(&dest, b"abcdefgh-too-long").unwrap();
        let url = format!("{}/files/a.bin", server.url());

        let outcome = downloader(&server, None).download(&url, &dest, Some(6)).unwrap();

        assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: 6 });
        assert_eq!(fs::read(&dest).unwrap(), b"abcdef");
        mock.assert();
    }

    #[test]
    fn test_non_200_is_download_error() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/files/a.bin").with_status(403).create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        let url = format!("{}/files/a.bin", server.url());

        let err = downloader(&server, None).download(&url, &dest, None).unwrap_err();
        assert!(matches!(err, FetchError::Download { status: 403, .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_short_body_is_incomplete_download() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/files/a.bin")
            .with_status(200)
            .with_body("abc")
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        let url = format!("{}/files/a.bin", server.url());

        let err = downloader(&server, None).download(&url, &dest, Some(1024)).unwrap_err();
        match err {
            FetchError::IncompleteDownload {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1024);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(local::check(&dest, Some(1024)), local::LocalState::Missing);
    }
}
