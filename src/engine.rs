/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! The single-transfer driver: executes one payload against its
//! current mirror, start to finish. Ports `dload.c`'s
//! `curl_download_internal` control flow onto a streamed
//! `reqwest::Response` body.

use std::path::PathBuf;

use filetime::FileTime;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::events::{DownloadEvent, DownloadEventSink, Outcome};
use crate::payload::Payload;
use crate::signal::InterruptFlag;
use crate::sinks::{parse_headers, ProgressTracker};
use crate::tempfile_mgr::{self, dest_path, part_path};
use crate::transfer::configure_request;

/// Result of one completed attempt, returned to the caller so the
/// parallel driver (§4.H) can fold it into its own bookkeeping.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// New content was written and published at `dest_file_name`.
    Success { basename: String },
    /// The conditional-GET reported no change; no bytes were written.
    UpToDate,
    /// Failed, and mirror failover should be attempted (see
    /// `DownloadError::is_mirror_eligible`).
    Retryable(DownloadError),
    /// Failed in a way mirror failover would not help with.
    Fatal(DownloadError),
}

/// Execute `payload` against its current mirror. Caller owns the
/// `InterruptFlag` lifecycle (install/restore of the ctrl-c shield)
/// since a single call site may drive several attempts in sequence
/// (fetch_pkg_url's package-then-signature pair, or the parallel
/// driver's many concurrent payloads).
pub async fn run_attempt(
    payload: &mut Payload,
    cache_dir: &std::path::Path,
    client: &Client,
    interrupt: &InterruptFlag,
    sink: &dyn DownloadEventSink,
) -> AttemptOutcome {
    let host = match payload.host() {
        Ok(h) => h,
        Err(e) => return AttemptOutcome::Fatal(e),
    };

    let remote_name = payload.remote_name_or_derive().to_string();

    let (temp_path, dest_path_opt) = if !remote_name.is_empty() && remote_name != ".sig" {
        let temp = part_path(cache_dir, &remote_name);
        let dest = dest_path(cache_dir, &remote_name);
        payload.temp_file_name = Some(temp.clone());
        payload.dest_file_name = Some(dest.clone());
        (temp, Some(dest))
    } else {
        match tempfile_mgr::create_tempfile(cache_dir, payload) {
            Ok(_) => {}
            Err(e) => return AttemptOutcome::Fatal(e),
        }
        payload.unlink_on_fail = true;
        (payload.temp_file_name.clone().unwrap(), None)
    };

    if let Some(max) = payload.max_size {
        if max != 0 && max == payload.initial_size {
            tracing::debug!(remote_name = %remote_name, "part file already complete, skipping transfer");
            return AttemptOutcome::UpToDate;
        }
    }

    let request = configure_request(
        client.get(&payload.file_url),
        payload,
        dest_path_opt.as_deref(),
        Some(&temp_path),
    );

    if !payload.signature {
        sink.on_event(&remote_name, DownloadEvent::Init { optional: payload.errors_ok });
    }

    let (result, bytes_this_attempt) = execute(payload, &temp_path, request, interrupt, sink, &host).await;

    if !payload.signature {
        let outcome = match &result {
            AttemptOutcome::Success { .. } => Outcome::Success,
            AttemptOutcome::UpToDate => Outcome::UpToDate,
            AttemptOutcome::Retryable(_) | AttemptOutcome::Fatal(_) => Outcome::Failed,
        };
        sink.on_event(
            &remote_name,
            DownloadEvent::Completed {
                total: bytes_this_attempt,
                outcome,
            },
        );
    }

    result
}

/// Returns the attempt's outcome paired with the bytes actually
/// downloaded *this attempt* (resume's pre-existing bytes excluded),
/// matching `dload.c`'s `CURLINFO_SIZE_DOWNLOAD`-derived `bytes_dl`
/// reported on `ALPM_DOWNLOAD_COMPLETED`.
async fn execute(
    payload: &mut Payload,
    temp_path: &std::path::Path,
    request: reqwest::RequestBuilder,
    interrupt: &InterruptFlag,
    sink: &dyn DownloadEventSink,
    host: &str,
) -> (AttemptOutcome, u64) {
    let remote_name = payload.remote_name.clone().unwrap_or_default();

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_connect() => {
            return (
                AttemptOutcome::Retryable(DownloadError::ServerBadUrl {
                    url: payload.file_url.clone(),
                    reason: e.to_string(),
                }),
                0,
            );
        }
        Err(e) => {
            return (classify_transport_error(payload, temp_path, &remote_name, &e), 0);
        }
    };

    let status = response.status();
    payload.resp_code = Some(status.as_u16());

    if status.as_u16() == 304 {
        let _ = std::fs::remove_file(temp_path);
        return (AttemptOutcome::UpToDate, 0);
    }

    if status.as_u16() >= 400 {
        payload.unlink_on_fail = true;
        let message = format!("The requested URL returned error: {}", status.as_u16());
        if payload.errors_ok {
            tracing::debug!(remote_name = %remote_name, %host, %message, "non-fatal retrieve failure");
            return (
                AttemptOutcome::Fatal(DownloadError::Retrieve {
                    remote_name,
                    host: host.to_string(),
                    message,
                }),
                0,
            );
        }
        tracing::warn!(remote_name = %remote_name, %host, %message, "retrieve failed");
        return (
            AttemptOutcome::Retryable(DownloadError::Retrieve {
                remote_name,
                host: host.to_string(),
                message,
            }),
            0,
        );
    }

    let header_info = parse_headers(response.headers());
    payload.content_disp_name = header_info.content_disp_name.or_else(|| payload.content_disp_name.take());

    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok());

    let effective_url = response.url().to_string();

    let file = match tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(matches!(payload.temp_open_mode, crate::payload::OpenMode::Resume))
        .truncate(matches!(payload.temp_open_mode, crate::payload::OpenMode::Fresh))
        .open(temp_path)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            return (
                AttemptOutcome::Fatal(DownloadError::System {
                    path: temp_path.display().to_string(),
                    source: e,
                }),
                0,
            );
        }
    };

    let content_length = response.content_length();
    let mut tracker = ProgressTracker::from_payload(payload, interrupt, sink);

    let bytes_written = match stream_to_file(response, file, &mut tracker, content_length).await {
        Ok(n) => n,
        Err((e, written)) => {
            payload.prev_progress = tracker.prev_progress;
            return (finalize_stream_error(payload, temp_path, &remote_name, e, interrupt), written);
        }
    };
    payload.prev_progress = tracker.prev_progress;

    if let Some(expected) = content_length {
        if expected != bytes_written {
            tracing::error!(remote_name = %remote_name, bytes_written, expected, "appears to be truncated");
            return (
                AttemptOutcome::Retryable(DownloadError::Retrieve {
                    remote_name,
                    host: host.to_string(),
                    message: format!("appears to be truncated: {bytes_written}/{expected} bytes"),
                }),
                bytes_written,
            );
        }
    }

    let final_dest = resolve_dest_path(payload, &effective_url);

    if let Some(mtime) = last_modified {
        let ft = FileTime::from_system_time(mtime);
        let _ = filetime::set_file_mtime(temp_path, ft);
    }

    if let Err(e) = std::fs::rename(temp_path, &final_dest) {
        tracing::error!(path = %temp_path.display(), error = %e, "rename to destination failed");
        return (
            AttemptOutcome::Fatal(DownloadError::System {
                path: final_dest.display().to_string(),
                source: e,
            }),
            bytes_written,
        );
    }

    (
        AttemptOutcome::Success {
            basename: final_dest.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string(),
        },
        bytes_written,
    )
}

/// On error, the `u64` is the partial byte count already written this
/// attempt (for the completion event's `total`), not a resumable offset.
async fn stream_to_file(
    response: reqwest::Response,
    mut file: tokio::fs::File,
    tracker: &mut ProgressTracker<'_>,
    content_length: Option<u64>,
) -> Result<u64, (DownloadError, u64)> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            (
                DownloadError::Transfer {
                    remote_name: tracker.remote_name.clone(),
                    message: e.to_string(),
                },
                written,
            )
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| {
                (
                    DownloadError::System {
                        path: tracker.remote_name.clone(),
                        source: e,
                    },
                    written,
                )
            })?;
        written += chunk.len() as u64;

        tracker
            .on_progress(written, content_length.unwrap_or(written))
            .map_err(|e| (e, written))?;
    }

    file.flush().await.map_err(|e| {
        (
            DownloadError::System {
                path: tracker.remote_name.clone(),
                source: e,
            },
            written,
        )
    })?;

    Ok(written)
}

fn finalize_stream_error(
    payload: &mut Payload,
    temp_path: &std::path::Path,
    remote_name: &str,
    error: DownloadError,
    interrupt: &InterruptFlag,
) -> AttemptOutcome {
    if let DownloadError::Interrupted = error {
        return AttemptOutcome::Fatal(error);
    }

    if matches!(error, DownloadError::Transfer { .. }) {
        // over-max-filesize always discards the partial data, mirroring
        // curl_download_internal's explicit unlink_on_fail on that path;
        // any other transfer error only discards an empty temp file.
        if interrupt.is_over_max_filesize() {
            payload.unlink_on_fail = true;
        } else if let Ok(meta) = std::fs::metadata(temp_path) {
            if meta.len() == 0 {
                payload.unlink_on_fail = true;
            }
        }
        if !payload.errors_ok {
            tracing::warn!(remote_name, %error, "transfer failed");
        }
        return AttemptOutcome::Retryable(error);
    }

    AttemptOutcome::Fatal(error)
}

fn classify_transport_error(
    payload: &mut Payload,
    temp_path: &std::path::Path,
    remote_name: &str,
    error: &reqwest::Error,
) -> AttemptOutcome {
    if let Ok(meta) = std::fs::metadata(temp_path) {
        if meta.len() == 0 {
            payload.unlink_on_fail = true;
        }
    }
    AttemptOutcome::Retryable(DownloadError::Transfer {
        remote_name: remote_name.to_string(),
        message: error.to_string(),
    })
}

fn resolve_dest_path(payload: &Payload, effective_url: &str) -> PathBuf {
    let Some(dest) = &payload.dest_file_name else {
        // random tempfile path: trust_remote_name decides the final name below
        let parent = payload.temp_file_name.as_ref().and_then(|p| p.parent()).unwrap_or_else(|| std::path::Path::new("."));
        return choose_trusted_name(payload, effective_url, parent);
    };

    if !payload.trust_remote_name {
        return dest.clone();
    }

    let parent = dest.parent().unwrap_or_else(|| std::path::Path::new("."));
    choose_trusted_name(payload, effective_url, parent)
}

fn choose_trusted_name(payload: &Payload, effective_url: &str, parent: &std::path::Path) -> PathBuf {
    if let Some(name) = &payload.content_disp_name {
        return parent.join(name);
    }

    let effective_tail = crate::url_util::filename_of(effective_url);
    if effective_tail.len() > 1 {
        let current_tail = payload
            .dest_file_name
            .as_ref()
            .and_then(|d| d.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if effective_tail != current_tail {
            return parent.join(effective_tail);
        }
    }

    payload.dest_file_name.clone().unwrap_or_else(|| parent.join(effective_tail))
}
