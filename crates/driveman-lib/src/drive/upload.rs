//! Resumable uploads with progress reporting and cancellation.
//!
//! A single upload is two requests: a metadata POST that opens an upload
//! session and returns its URL in `Location`, then a PUT streaming the bytes
//! to that URL. Progress is published on a `watch` channel as each chunk is
//! handed to the transport.
//!
//! [`upload_all`] drives several uploads strictly one after another.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde_json::json;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::model::{DriveItem, ROOT_ID};
use super::{check_status, DriveClient};
use crate::errors::{DrivemanError, Result};

/// Bytes handed to the transport so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Whole-number percentage, 100 for empty files.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// Something to upload: a local file or an in-memory buffer.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub name: String,
    pub mime_type: String,
    pub len: u64,
    origin: Origin,
}

impl UploadSource {
    /// Describe a local file. The name is the file name and the mime type is
    /// guessed from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(DrivemanError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            mime_type,
            len: meta.len(),
            origin: Origin::File(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: Option<&str>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());
        Self {
            len: data.len() as u64,
            name,
            mime_type,
            origin: Origin::Memory(data.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::File(p) => Some(p),
            Origin::Memory(_) => None,
        }
    }

    async fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        Ok(match &self.origin {
            Origin::File(path) => Box::new(tokio::fs::File::open(path).await?),
            Origin::Memory(data) => Box::new(Cursor::new(data.clone())),
        })
    }
}

/// An upload running on its own task.
pub struct UploadHandle {
    pub progress: watch::Receiver<UploadProgress>,
    cancel: CancellationToken,
    task: JoinHandle<Result<DriveItem>>,
}

impl UploadHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the upload to settle.
    pub async fn finish(self) -> Result<DriveItem> {
        self.task
            .await
            .map_err(|e| DrivemanError::Application(format!("Upload task failed: {e}")))?
    }
}

impl DriveClient {
    /// Upload `source` into `folder` (root by default).
    ///
    /// Resolves with the created item when the final PUT answers 200 or 201.
    /// Any other final status becomes `Upload failed with status N`.
    pub async fn upload_item(
        &self,
        source: UploadSource,
        folder: Option<&str>,
        progress: watch::Sender<UploadProgress>,
        cancel: CancellationToken,
    ) -> Result<DriveItem> {
        if cancel.is_cancelled() {
            return Err(DrivemanError::Cancelled);
        }
        let token = self.bearer()?;
        let client = self.http.get_client().await;
        let parent = folder.filter(|f| !f.is_empty()).unwrap_or(ROOT_ID);
        let total = source.len;

        // Phase 1: open the upload session.
        let init = client
            .post(format!("{}/files", self.endpoints.upload_base))
            .query(&[("uploadType", "resumable")])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", &source.mime_type)
            .header("X-Upload-Content-Length", total.to_string())
            .json(&json!({ "name": source.name, "parents": [parent] }));

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DrivemanError::Cancelled),
            resp = init.send() => resp?,
        };
        let resp = check_status(resp).await?;
        let session_url = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DrivemanError::Upload("Upload session URL missing from response".into())
            })?;

        tracing::debug!(name = %source.name, total, "opened upload session");

        // Phase 2: stream the bytes.
        progress.send_replace(UploadProgress { sent: 0, total });
        let reader = source.open().await?;
        let mut sent = 0u64;
        let stream = ReaderStream::with_capacity(reader, self.chunk_size).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.send_replace(UploadProgress { sent, total });
            }
            chunk
        });

        let put = client
            .put(&session_url)
            .header(CONTENT_TYPE, &source.mime_type)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream));

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(name = %source.name, "upload cancelled");
                return Err(DrivemanError::Cancelled);
            }
            resp = put.send() => resp?,
        };

        let status = resp.status().as_u16();
        if status != 200 && status != 201 {
            tracing::debug!(name = %source.name, status, "upload rejected");
            return Err(DrivemanError::Upload(format!(
                "Upload failed with status {status}"
            )));
        }

        let item: DriveItem = resp.json().await?;
        tracing::info!(id = %item.id, name = %item.name, bytes = total, "uploaded file");
        Ok(item)
    }

    /// Run [`upload_item`](Self::upload_item) on a background task.
    pub fn start_upload(&self, source: UploadSource, folder: Option<String>) -> UploadHandle {
        let (tx, rx) = watch::channel(UploadProgress {
            sent: 0,
            total: source.len,
        });
        let cancel = CancellationToken::new();
        let client = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            client
                .upload_item(source, folder.as_deref(), tx, task_cancel)
                .await
        });
        UploadHandle {
            progress: rx,
            cancel,
            task,
        }
    }
}

/// Anything that can perform a single upload.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        source: UploadSource,
        folder: Option<&str>,
        progress: watch::Sender<UploadProgress>,
        cancel: CancellationToken,
    ) -> Result<DriveItem>;
}

#[async_trait]
impl Uploader for DriveClient {
    async fn upload(
        &self,
        source: UploadSource,
        folder: Option<&str>,
        progress: watch::Sender<UploadProgress>,
        cancel: CancellationToken,
    ) -> Result<DriveItem> {
        self.upload_item(source, folder, progress, cancel).await
    }
}

/// Per-file notifications from [`upload_all`]. `index` is the position in
/// the input list.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started {
        index: usize,
        name: String,
        total: u64,
    },
    Progress {
        index: usize,
        progress: UploadProgress,
    },
    Finished {
        index: usize,
        name: String,
        result: std::result::Result<DriveItem, String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Not attempted because the batch was cancelled.
    pub skipped: usize,
    pub uploaded: Vec<DriveItem>,
    pub failures: Vec<(String, String)>,
}

impl UploadSummary {
    pub fn success_message(&self) -> Option<String> {
        (self.succeeded > 0).then(|| {
            format!(
                "Uploaded {} {} successfully",
                self.succeeded,
                plural_files(self.succeeded)
            )
        })
    }

    pub fn failure_message(&self) -> Option<String> {
        (self.failed > 0)
            .then(|| format!("Failed to upload {} {}", self.failed, plural_files(self.failed)))
    }
}

fn plural_files(n: usize) -> &'static str {
    if n == 1 {
        "file"
    } else {
        "files"
    }
}

/// Upload `sources` one at a time. The next file starts only after the
/// previous one settled; a failure is recorded and the batch moves on.
/// Cancellation stops before the next file and counts the rest as skipped.
pub async fn upload_all(
    uploader: &dyn Uploader,
    sources: Vec<UploadSource>,
    folder: Option<&str>,
    events: &mpsc::UnboundedSender<UploadEvent>,
    cancel: &CancellationToken,
) -> UploadSummary {
    let mut summary = UploadSummary::default();
    let count = sources.len();

    for (index, source) in sources.into_iter().enumerate() {
        if cancel.is_cancelled() {
            summary.skipped = count - index;
            break;
        }

        let name = source.name.clone();
        let _ = events.send(UploadEvent::Started {
            index,
            name: name.clone(),
            total: source.len,
        });

        let (tx, mut rx) = watch::channel(UploadProgress {
            sent: 0,
            total: source.len,
        });
        let upload = uploader.upload(source, folder, tx, cancel.child_token());
        let forward = async {
            while rx.changed().await.is_ok() {
                let progress = *rx.borrow_and_update();
                let _ = events.send(UploadEvent::Progress { index, progress });
            }
        };
        let (result, ()) = tokio::join!(upload, forward);

        match result {
            Ok(item) => {
                summary.succeeded += 1;
                summary.uploaded.push(item.clone());
                let _ = events.send(UploadEvent::Finished {
                    index,
                    name,
                    result: Ok(item),
                });
            }
            Err(DrivemanError::Cancelled) => {
                summary.skipped = count - index;
                let _ = events.send(UploadEvent::Finished {
                    index,
                    name,
                    result: Err(DrivemanError::Cancelled.to_string()),
                });
                break;
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "upload failed");
                summary.failed += 1;
                summary.failures.push((name.clone(), e.to_string()));
                let _ = events.send(UploadEvent::Finished {
                    index,
                    name,
                    result: Err(e.to_string()),
                });
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::body::Bytes;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{post, put};
    use axum::{Json, Router};

    use super::super::testing::*;
    use super::*;

    // -- sequential batch ----------------------------------------------------

    /// Records call order and fails the file named `fail`.
    struct ScriptedUploader {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedUploader {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Uploader for ScriptedUploader {
        async fn upload(
            &self,
            source: UploadSource,
            _folder: Option<&str>,
            progress: watch::Sender<UploadProgress>,
            _cancel: CancellationToken,
        ) -> Result<DriveItem> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(source.name.clone());

            tokio::task::yield_now().await;
            progress.send_replace(UploadProgress {
                sent: source.len,
                total: source.len,
            });
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if source.name == "fail" {
                return Err(DrivemanError::Upload("Upload failed with status 500".into()));
            }
            Ok(DriveItem {
                id: format!("id-{}", source.name),
                name: source.name,
                ..DriveItem::default()
            })
        }
    }

    fn sources(names: &[&str]) -> Vec<UploadSource> {
        names
            .iter()
            .map(|n| UploadSource::from_bytes(*n, Some("text/plain"), b"data".to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_upload_all_continues_after_failure() {
        let uploader = ScriptedUploader::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let summary = upload_all(
            &uploader,
            sources(&["one", "fail", "three"]),
            None,
            &tx,
            &cancel,
        )
        .await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(
            *uploader.calls.lock().unwrap(),
            vec!["one".to_string(), "fail".into(), "three".into()]
        );
        assert_eq!(uploader.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failures[0].0, "fail");
        assert_eq!(
            summary.success_message().as_deref(),
            Some("Uploaded 2 files successfully")
        );
        assert_eq!(
            summary.failure_message().as_deref(),
            Some("Failed to upload 1 file")
        );

        drop(tx);
        let mut started = 0;
        let mut finished = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::Started { .. } => started += 1,
                UploadEvent::Finished { index, result, .. } => finished.push((index, result.is_ok())),
                UploadEvent::Progress { .. } => {}
            }
        }
        assert_eq!(started, 3);
        assert_eq!(finished, vec![(0, true), (1, false), (2, true)]);
    }

    #[tokio::test]
    async fn test_upload_all_cancelled_skips_everything() {
        let uploader = ScriptedUploader::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = upload_all(&uploader, sources(&["a", "b"]), None, &tx, &cancel).await;
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.succeeded + summary.failed, 0);
        assert!(uploader.calls.lock().unwrap().is_empty());
        assert_eq!(summary.success_message(), None);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(UploadProgress { sent: 0, total: 0 }.percent(), 100);
        assert_eq!(UploadProgress { sent: 50, total: 200 }.percent(), 25);
        assert_eq!(UploadProgress { sent: 300, total: 200 }.percent(), 100);
    }

    #[tokio::test]
    async fn test_source_from_path_guesses_mime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let source = UploadSource::from_path(&path).await.unwrap();
        assert_eq!(source.name, "notes.txt");
        assert_eq!(source.mime_type, "text/plain");
        assert_eq!(source.len, 5);
        assert_eq!(source.path(), Some(path.as_path()));

        assert!(UploadSource::from_path(tmp.path()).await.is_err());
    }

    // -- resumable protocol ----------------------------------------------------

    #[derive(Default)]
    struct UploadServer {
        init_headers: Option<HeaderMap>,
        init_body: Option<serde_json::Value>,
        init_query: Option<std::collections::HashMap<String, String>>,
        put_headers: Option<HeaderMap>,
        put_body: Vec<u8>,
        put_status: u16,
        omit_location: bool,
    }

    type Shared = Arc<Mutex<UploadServer>>;

    async fn init_session(
        State(state): State<Shared>,
        headers: HeaderMap,
        Query(query): Query<std::collections::HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        let mut s = state.lock().unwrap();
        s.init_headers = Some(headers.clone());
        s.init_body = Some(body);
        s.init_query = Some(query);
        let mut out = HeaderMap::new();
        if !s.omit_location {
            let host = headers
                .get("host")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let url = format!("http://{host}/session/abc");
            out.insert("location", HeaderValue::from_str(&url).unwrap());
        }
        (StatusCode::OK, out)
    }

    async fn receive_bytes(
        State(state): State<Shared>,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        let mut s = state.lock().unwrap();
        s.put_headers = Some(headers);
        s.put_body = body.to_vec();
        let status = StatusCode::from_u16(s.put_status).unwrap();
        (
            status,
            Json(serde_json::json!({"id": "up1", "name": "hello.txt", "mimeType": "text/plain"})),
        )
    }

    async fn upload_server(put_status: u16, omit_location: bool) -> (Shared, DriveClient) {
        let state: Shared = Arc::new(Mutex::new(UploadServer {
            put_status,
            omit_location,
            ..UploadServer::default()
        }));
        let router = Router::new()
            .route("/upload/drive/v3/files", post(init_session))
            .route("/session/abc", put(receive_bytes))
            .with_state(state.clone());
        let addr = serve(router).await;
        (state, client(addr))
    }

    #[tokio::test]
    async fn test_resumable_upload_two_phases() {
        let (state, client) = upload_server(200, false).await;
        let data = vec![7u8; 10_000];
        let source = UploadSource::from_bytes("hello.txt", Some("text/plain"), data.clone());
        let (tx, rx) = watch::channel(UploadProgress::default());

        let item = client
            .upload_item(source, Some("F1"), tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(item.id, "up1");

        let final_progress = *rx.borrow();
        assert_eq!(final_progress, UploadProgress { sent: 10_000, total: 10_000 });

        let s = state.lock().unwrap();
        assert_eq!(s.init_query.as_ref().unwrap()["uploadType"], "resumable");
        let init_headers = s.init_headers.as_ref().unwrap();
        assert_eq!(init_headers["x-upload-content-type"], "text/plain");
        assert_eq!(init_headers["x-upload-content-length"], "10000");
        assert_eq!(
            init_headers["authorization"],
            format!("Bearer {TEST_TOKEN}").as_str()
        );
        assert_eq!(
            s.init_body.as_ref().unwrap(),
            &serde_json::json!({"name": "hello.txt", "parents": ["F1"]})
        );
        let put_headers = s.put_headers.as_ref().unwrap();
        assert_eq!(put_headers["content-type"], "text/plain");
        assert_eq!(put_headers["content-length"], "10000");
        assert_eq!(s.put_body, data);
    }

    #[tokio::test]
    async fn test_created_status_is_success() {
        let (_, client) = upload_server(201, false).await;
        let source = UploadSource::from_bytes("hello.txt", None, b"hi".to_vec());
        let (tx, _rx) = watch::channel(UploadProgress::default());
        let item = client
            .upload_item(source, None, tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(item.name, "hello.txt");
    }

    #[tokio::test]
    async fn test_other_final_status_is_upload_failure() {
        let (_, client) = upload_server(500, false).await;
        let source = UploadSource::from_bytes("hello.txt", None, b"hi".to_vec());
        let (tx, _rx) = watch::channel(UploadProgress::default());
        let err = client
            .upload_item(source, None, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload failed with status 500");
    }

    #[tokio::test]
    async fn test_missing_location_is_upload_error() {
        let (state, client) = upload_server(200, true).await;
        let source = UploadSource::from_bytes("hello.txt", None, b"hi".to_vec());
        let (tx, _rx) = watch::channel(UploadProgress::default());
        let err = client
            .upload_item(source, None, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DrivemanError::Upload(_)));
        assert!(state.lock().unwrap().put_headers.is_none());
    }

    #[tokio::test]
    async fn test_start_upload_handle() {
        let (_, client) = upload_server(200, false).await;
        let source = UploadSource::from_bytes("hello.txt", None, vec![1u8; 2048]);
        let handle = client.start_upload(source, None);
        let progress = handle.progress.clone();
        let item = handle.finish().await.unwrap();
        assert_eq!(item.id, "up1");
        assert_eq!(progress.borrow().sent, 2048);
    }

    #[tokio::test]
    async fn test_pre_cancelled_upload_sends_nothing() {
        let (state, client) = upload_server(200, false).await;
        let source = UploadSource::from_bytes("hello.txt", None, b"hi".to_vec());
        let (tx, _rx) = watch::channel(UploadProgress::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.upload_item(source, None, tx, cancel).await.unwrap_err();
        assert!(matches!(err, DrivemanError::Cancelled));
        assert!(state.lock().unwrap().init_headers.is_none());
    }
}
