/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! The parallel driver: bounded concurrency across many payloads,
//! each retried against its own mirror list independently. Ports
//! `dload.c`'s `curl_multi_download_internal` scheduling loop onto a
//! `tokio::task::JoinSet` + `tokio::sync::Semaphore`, the same shape
//! the teacher's `downloader/engine.rs::download_all` uses for
//! fan-out, adapted so each task owns its own mirror-retry loop
//! instead of a shared multiplex handle.

use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::engine::{self, AttemptOutcome};
use crate::error::DownloadError;
use crate::events::DownloadEventSink;
use crate::payload::Payload;
use crate::signal::InterruptFlag;
use crate::tempfile_mgr::cleanup_if_marked;

/// Final disposition of one payload after all of its mirrors have
/// been exhausted (or one succeeded).
#[derive(Debug)]
pub enum PayloadResult {
    Success { basename: String },
    UpToDate,
    /// Every mirror failed and the payload was not optional.
    Failed(DownloadError),
    /// Every mirror failed, but `errors_ok` downgrades this to a
    /// loop-termination success (`dload.c`'s return code −2).
    OptionalFailed(DownloadError),
}

/// Drive `payloads` to completion with at most `concurrency` transfers
/// active at once. Each payload retries through its own mirror list
/// independently of the others; a non-optional payload's exhaustion
/// does not cancel payloads already in flight.
pub async fn run_many(
    payloads: Vec<Payload>,
    cache_dir: &std::path::Path,
    client: Client,
    concurrency: usize,
    interrupt: InterruptFlag,
    sink: Arc<dyn DownloadEventSink>,
) -> Vec<PayloadResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let cache_dir = Arc::new(cache_dir.to_path_buf());
    let mut join_set: JoinSet<PayloadResult> = JoinSet::new();

    for payload in payloads {
        let semaphore = semaphore.clone();
        let cache_dir = cache_dir.clone();
        let client = client.clone();
        let interrupt = interrupt.clone();
        let sink = sink.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            run_payload_with_failover(payload, &cache_dir, &client, &interrupt, sink.as_ref()).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_err) => {
                tracing::error!(error = %join_err, "download task panicked");
                results.push(PayloadResult::Failed(DownloadError::Memory(join_err.to_string())));
            }
        }
    }

    results
}

async fn run_payload_with_failover(
    mut payload: Payload,
    cache_dir: &std::path::Path,
    client: &Client,
    interrupt: &InterruptFlag,
    sink: &dyn DownloadEventSink,
) -> PayloadResult {
    loop {
        let outcome = engine::run_attempt(&mut payload, cache_dir, client, interrupt, sink).await;

        match outcome {
            AttemptOutcome::Success { basename } => return PayloadResult::Success { basename },
            AttemptOutcome::UpToDate => return PayloadResult::UpToDate,
            AttemptOutcome::Fatal(err) => return terminal(&payload, err),
            AttemptOutcome::Retryable(err) => {
                if interrupt.is_set() {
                    return terminal(&payload, DownloadError::Interrupted);
                }
                if !payload.advance_mirror() {
                    tracing::debug!(remote_name = ?payload.remote_name, "no more servers to retry");
                    return terminal(&payload, err);
                }
                if let Err(e) = retry_rotate(&mut payload) {
                    return terminal(&payload, e);
                }
            }
        }
    }
}

/// A payload that's been given up on for good: clean up its temp file
/// if it was marked for removal, then fold the error into the result.
fn terminal(payload: &Payload, err: DownloadError) -> PayloadResult {
    cleanup_if_marked(payload);
    if payload.errors_ok {
        PayloadResult::OptionalFailed(err)
    } else {
        PayloadResult::Failed(err)
    }
}

/// `curl_multi_retry_next_server`'s truncate-then-rewind: a payload
/// marked `unlink_on_fail` keeps its temp file across mirrors but its
/// partial data is discarded, since resume offsets from one mirror
/// are meaningless against another.
fn retry_rotate(payload: &mut Payload) -> Result<(), DownloadError> {
    if payload.unlink_on_fail {
        if let Some(temp_path) = &payload.temp_file_name {
            truncate_and_rewind(temp_path)?;
        }
    }
    payload.initial_size = 0;
    payload.prev_progress = 0;
    payload.unlink_on_fail = false;
    payload.resp_code = None;
    Ok(())
}

fn truncate_and_rewind(path: &PathBuf) -> Result<(), DownloadError> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DownloadError::System {
            path: path.display().to_string(),
            source: e,
        })?;
    file.flush().map_err(|e| DownloadError::System {
        path: path.display().to_string(),
        source: e,
    })?;
    file.set_len(0).map_err(|e| DownloadError::System {
        path: path.display().to_string(),
        source: e,
    })?;
    file.seek(SeekFrom::Start(0)).map_err(|e| DownloadError::System {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}
