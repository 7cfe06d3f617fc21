//! `upload` and `download`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::drive::{upload_all, DriveClient, UploadEvent, UploadSource, UploadSummary};
use crate::errors::{DrivemanError, Result};
use crate::format::format_file_size;
use crate::output::{self, progress};

pub fn upload_command() -> Command {
    Command::new("upload")
        .about("Upload one or more files, one after another")
        .arg(
            Arg::new("paths")
                .required(true)
                .num_args(1..)
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("parent")
                .short('p')
                .long("parent")
                .value_name("FOLDER_ID")
                .help("Upload into this folder instead of My Drive"),
        )
}

pub fn download_command() -> Command {
    Command::new("download")
        .about("Download a file")
        .arg(Arg::new("id").required(true).value_name("ID"))
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory to save into (default ~/Downloads)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("Save under this name instead of the remote one"),
        )
}

pub fn upload_meta() -> CommandMeta {
    CommandBuilder::from_clap(upload_command())
        .category(CommandCategory::Transfer)
        .aliases(&["up"])
        .requires_auth()
        .build()
}

pub fn download_meta() -> CommandMeta {
    CommandBuilder::from_clap(download_command())
        .category(CommandCategory::Transfer)
        .aliases(&["get"])
        .requires_auth()
        .build()
}

// ---------------------------------------------------------------------------
// upload
// ---------------------------------------------------------------------------

/// Drive one bar per file from the batch's event stream until the sender is
/// dropped.
async fn render_events(multi: &MultiProgress, mut events: mpsc::UnboundedReceiver<UploadEvent>) {
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Started { index, name, total } => {
                bars.insert(index, progress::create_upload_progress(multi, &name, total));
            }
            UploadEvent::Progress { index, progress } => {
                if let Some(bar) = bars.get(&index) {
                    bar.set_position(progress.sent);
                }
            }
            UploadEvent::Finished { index, name, result } => {
                if let Some(bar) = bars.remove(&index) {
                    match result {
                        Ok(_) => bar.finish_with_message(format!("{name} done")),
                        Err(e) => bar.abandon_with_message(format!("{name}: {e}")),
                    }
                }
            }
        }
    }
}

fn summary_json(summary: &UploadSummary) -> serde_json::Value {
    let failures: Vec<serde_json::Value> = summary
        .failures
        .iter()
        .map(|(name, error)| serde_json::json!({ "name": name, "error": error }))
        .collect();
    serde_json::json!({
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "skipped": summary.skipped,
        "uploaded": summary.uploaded,
        "failures": failures,
    })
}

/// Report the batch and turn failures or cancellation into the command's
/// error so the exit status reflects them.
fn report_summary(summary: &UploadSummary, json: bool) -> Result<()> {
    if json {
        output::json(&summary_json(summary))?;
    } else {
        if let Some(msg) = summary.success_message() {
            output::success(&msg);
        }
        for (name, error) in &summary.failures {
            output::warning(&format!("  {name}: {error}"));
        }
        if summary.skipped > 0 {
            output::warning(&format!("Skipped {} not yet uploaded", summary.skipped));
        }
    }

    if let Some(msg) = summary.failure_message() {
        return Err(DrivemanError::Upload(msg));
    }
    if summary.skipped > 0 {
        return Err(DrivemanError::Cancelled);
    }
    Ok(())
}

pub async fn handle_upload(
    matches: &ArgMatches,
    drive: &DriveClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let parent = matches.get_one::<String>("parent").map(String::as_str);
    let json = wants_json(matches);

    let mut sources = Vec::new();
    for path in matches.get_many::<PathBuf>("paths").into_iter().flatten() {
        sources.push(UploadSource::from_path(path).await?);
    }

    // Bars would interleave with the JSON document on the terminal.
    let multi = if json {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let summary = match <[UploadSource; 1]>::try_from(sources) {
        Ok([source]) => upload_one(drive, source, parent, &multi, cancel).await,
        Err(sources) => {
            let (tx, rx) = mpsc::unbounded_channel();
            let cancel = cancel.clone();
            let batch = async move { upload_all(drive, sources, parent, &tx, &cancel).await };
            let (summary, ()) = tokio::join!(batch, render_events(&multi, rx));
            summary
        }
    };

    report_summary(&summary, json)
}

/// Single file: run it on a background task and cancel that task on shutdown.
async fn upload_one(
    drive: &DriveClient,
    source: UploadSource,
    parent: Option<&str>,
    multi: &MultiProgress,
    shutdown: &CancellationToken,
) -> UploadSummary {
    let name = source.name.clone();
    let bar = progress::create_upload_progress(multi, &name, source.len);
    let handle = drive.start_upload(source, parent.map(str::to_string));
    let mut progress = handle.progress.clone();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                handle.cancel();
                break;
            }
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                bar.set_position(progress.borrow_and_update().sent);
            }
        }
    }

    let mut summary = UploadSummary::default();
    match handle.finish().await {
        Ok(item) => {
            bar.finish_with_message(format!("{name} done"));
            summary.succeeded = 1;
            summary.uploaded.push(item);
        }
        Err(DrivemanError::Cancelled) => {
            bar.abandon_with_message(format!("{name}: cancelled"));
            summary.skipped = 1;
        }
        Err(e) => {
            tracing::warn!(file = %name, error = %e, "upload failed");
            bar.abandon_with_message(format!("{name}: {e}"));
            summary.failed = 1;
            summary.failures.push((name, e.to_string()));
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// download
// ---------------------------------------------------------------------------

pub async fn handle_download(
    matches: &ArgMatches,
    drive: &DriveClient,
    default_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let id = matches.get_one::<String>("id").map(String::as_str).unwrap_or_default();
    let dest_dir = matches
        .get_one::<PathBuf>("output")
        .map(PathBuf::as_path)
        .unwrap_or(default_dir);

    let item = drive.get_item(id).await?;
    if item.is_folder() {
        return Err(DrivemanError::Validation(format!(
            "\"{}\" is a folder; only files can be downloaded",
            item.name
        )));
    }
    let name = matches
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or(&item.name);

    let pb = progress::create_download_progress(name, item.size.unwrap_or(0));
    let result = drive.download(id, name, dest_dir, Some(&pb), cancel).await;
    pb.finish_and_clear();
    let saved = result?;

    if wants_json(matches) {
        return output::json(&serde_json::json!({
            "id": id,
            "path": saved.path,
            "bytes": saved.total_bytes,
        }));
    }
    output::success(&format!(
        "Saved {} ({})",
        saved.path.display(),
        format_file_size(saved.total_bytes)
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::{Path as UrlPath, Query};
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::drive::testing::{client, serve};
    use crate::drive::DriveItem;

    #[test]
    fn test_upload_args() {
        let m = upload_command()
            .try_get_matches_from(["upload", "a.txt", "b.txt", "-p", "F1"])
            .unwrap();
        let paths: Vec<&PathBuf> = m.get_many::<PathBuf>("paths").unwrap().collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(m.get_one::<String>("parent").unwrap(), "F1");
        assert!(upload_command().try_get_matches_from(["upload"]).is_err());
    }

    #[test]
    fn test_metas() {
        assert!(upload_meta().requires_auth);
        assert_eq!(download_meta().category, CommandCategory::Transfer);
    }

    #[test]
    fn test_report_summary_outcomes() {
        let ok = UploadSummary {
            succeeded: 2,
            ..UploadSummary::default()
        };
        assert!(report_summary(&ok, false).is_ok());

        let partial = UploadSummary {
            succeeded: 1,
            failed: 1,
            failures: vec![("b.txt".into(), "Upload failed with status 500".into())],
            ..UploadSummary::default()
        };
        let err = report_summary(&partial, false).unwrap_err();
        assert_eq!(err.to_string(), "Failed to upload 1 file");

        let cancelled = UploadSummary {
            skipped: 2,
            ..UploadSummary::default()
        };
        assert!(matches!(
            report_summary(&cancelled, true),
            Err(DrivemanError::Cancelled)
        ));
    }

    #[test]
    fn test_summary_json() {
        let summary = UploadSummary {
            succeeded: 1,
            uploaded: vec![DriveItem {
                id: "n1".into(),
                name: "a.txt".into(),
                ..DriveItem::default()
            }],
            failed: 1,
            failures: vec![("b.txt".into(), "boom".into())],
            ..UploadSummary::default()
        };
        let v = summary_json(&summary);
        assert_eq!(v["uploaded"][0]["id"], "n1");
        assert_eq!(v["failures"][0], json!({"name": "b.txt", "error": "boom"}));
    }

    // -- against a local server ---------------------------------------------

    async fn start_session(
        request_headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        if q.get("uploadType").map(String::as_str) != Some("resumable") {
            return StatusCode::BAD_REQUEST.into_response();
        }
        let host = request_headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LOCATION,
            HeaderValue::from_str(&format!("http://{host}/session/1")).unwrap(),
        );
        (StatusCode::OK, headers).into_response()
    }

    async fn put_bytes(body: axum::body::Bytes) -> (StatusCode, Json<serde_json::Value>) {
        (
            StatusCode::CREATED,
            Json(json!({"id": "new", "name": "up.txt", "size": body.len().to_string()})),
        )
    }

    async fn file(
        UrlPath(id): UrlPath<String>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let media = q.get("alt").map(String::as_str) == Some("media");
        match (id.as_str(), media) {
            ("f1", false) => Json(json!({
                "id": "f1", "name": "notes.txt", "mimeType": "text/plain", "size": "5"
            }))
            .into_response(),
            ("f1", true) => "hello".into_response(),
            ("dir", false) => Json(json!({
                "id": "dir", "name": "Stuff", "mimeType": "application/vnd.google-apps.folder"
            }))
            .into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn start() -> DriveClient {
        let router = Router::new()
            .route("/upload/drive/v3/files", post(start_session))
            .route("/session/1", put(put_bytes))
            .route("/drive/v3/files/{id}", get(file));
        client(serve(router).await)
    }

    #[tokio::test]
    async fn test_upload_handler_uploads_files() {
        let drive = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("up.txt");
        std::fs::write(&a, "payload").unwrap();

        let m = upload_command()
            .try_get_matches_from(["upload".into(), a.into_os_string()])
            .unwrap();
        handle_upload(&m, &drive, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_one_reports_created_item() {
        let drive = start().await;
        let source = UploadSource::from_bytes("up.txt", None, b"payload".to_vec());
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let summary = upload_one(&drive, source, None, &multi, &CancellationToken::new()).await;
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.uploaded[0].id, "new");
    }

    #[tokio::test]
    async fn test_upload_one_stops_on_shutdown() {
        let drive = start().await;
        let source = UploadSource::from_bytes("up.txt", None, b"payload".to_vec());
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let summary = upload_one(&drive, source, None, &multi, &shutdown).await;
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 1);
        assert!(matches!(
            report_summary(&summary, true),
            Err(DrivemanError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_upload_handler_batch_in_json_mode() {
        let drive = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.txt");
        std::fs::write(&a, "one").unwrap();
        std::fs::write(&b, "two").unwrap();

        let m = crate::cli::create_root_command()
            .subcommand(upload_command())
            .try_get_matches_from([
                "driveman".into(),
                "--json".into(),
                "upload".into(),
                a.into_os_string(),
                b.into_os_string(),
            ])
            .unwrap();
        let (_, sub) = m.subcommand().unwrap();
        handle_upload(sub, &drive, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_handler_rejects_missing_path_before_network() {
        let drive = start().await;
        let m = upload_command()
            .try_get_matches_from(["upload", "/definitely/not/here.txt"])
            .unwrap();
        assert!(handle_upload(&m, &drive, &CancellationToken::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_download_handler_saves_under_remote_name() {
        let drive = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let m = download_command().try_get_matches_from(["download", "f1"]).unwrap();
        handle_download(&m, &drive, tmp.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("notes.txt")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_download_handler_honours_output_and_name() {
        let drive = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("elsewhere");
        let m = download_command()
            .try_get_matches_from([
                "download".into(),
                "f1".into(),
                "-o".into(),
                out.clone().into_os_string(),
                "--name".into(),
                "copy.txt".into(),
            ])
            .unwrap();
        handle_download(&m, &drive, tmp.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.join("copy.txt").exists());
    }

    #[tokio::test]
    async fn test_download_handler_refuses_folders() {
        let drive = start().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let m = download_command().try_get_matches_from(["download", "dir"]).unwrap();
        let err = handle_download(&m, &drive, tmp.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DrivemanError::Validation(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
