//! Whole-file downloads to a local directory.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::{check_status, DriveClient};
use crate::errors::{DrivemanError, Result};
use crate::text::{sanitize_filename, unique_path};

/// Where a download landed.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub total_bytes: u64,
}

impl DriveClient {
    /// Fetch the content of `id` into `dest_dir`, named after `display_name`.
    ///
    /// Bytes go to a `.part` file that is renamed once the body is complete,
    /// so an interrupted download never leaves a file under the final name.
    /// An existing file is not overwritten; a numbered name is picked instead.
    pub async fn download(
        &self,
        id: &str,
        display_name: &str,
        dest_dir: &Path,
        progress: Option<&ProgressBar>,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult> {
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        if let (Some(pb), Some(len)) = (progress, resp.content_length()) {
            pb.set_length(len);
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = unique_path(dest_dir, &sanitize_filename(display_name));
        let part = part_path(&dest);
        let mut file = tokio::fs::File::create(&part).await?;

        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        let outcome: Result<()> = async {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(DrivemanError::Cancelled),
                    chunk = stream.next() => match chunk {
                        Some(Ok(data)) => {
                            file.write_all(&data).await?;
                            written += data.len() as u64;
                            if let Some(pb) = progress {
                                pb.set_position(written);
                            }
                        }
                        Some(Err(e)) => return Err(DrivemanError::Http(e)),
                        None => break,
                    },
                }
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&part).await {
                tracing::debug!(path = %part.display(), error = %rm, "could not remove partial file");
            }
            return Err(e);
        }
        drop(file);

        tokio::fs::rename(&part, &dest).await?;
        tracing::info!(id, path = %dest.display(), bytes = written, "downloaded file");

        Ok(DownloadResult {
            path: dest,
            total_bytes: written,
        })
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path as UrlPath, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    use super::super::testing::*;
    use super::*;

    async fn media(
        UrlPath(id): UrlPath<String>,
        Query(q): Query<HashMap<String, String>>,
    ) -> (StatusCode, Vec<u8>) {
        if q.get("alt").map(String::as_str) != Some("media") {
            return (StatusCode::BAD_REQUEST, b"expected alt=media".to_vec());
        }
        match id.as_str() {
            "f1" => (StatusCode::OK, b"file body".to_vec()),
            _ => (StatusCode::NOT_FOUND, b"{\"error\":{\"message\":\"File not found\"}}".to_vec()),
        }
    }

    async fn start() -> DriveClient {
        let router = Router::new().route("/drive/v3/files/{id}", get(media));
        client(serve(router).await)
    }

    #[tokio::test]
    async fn test_download_writes_sanitized_file() {
        let client = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let pb = ProgressBar::hidden();

        let result = client
            .download("f1", "notes/today.txt", tmp.path(), Some(&pb), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.path, tmp.path().join("notes_today.txt"));
        assert_eq!(result.total_bytes, 9);
        assert_eq!(std::fs::read(&result.path).unwrap(), b"file body");
        assert!(!tmp.path().join("notes_today.txt.part").exists());
        assert_eq!(pb.position(), 9);
    }

    #[tokio::test]
    async fn test_download_does_not_overwrite() {
        let client = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "keep me").unwrap();

        let result = client
            .download("f1", "a.txt", tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.path, tmp.path().join("a (1).txt"));
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "keep me");
    }

    #[tokio::test]
    async fn test_download_missing_leaves_nothing() {
        let client = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let err = client
            .download("nope", "x.bin", tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DrivemanError::Api { status: 404, .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/a.txt")),
            PathBuf::from("/tmp/a.txt.part")
        );
    }
}
