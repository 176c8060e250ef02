/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Download engine for pacboost: fetch package files and detached
//! signatures from ordered mirror lists into a local cache directory,
//! with resume, freshness checks, parallel transfers, mirror failover,
//! and graceful interrupt handling.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod parallel;
pub mod payload;
pub mod signal;
pub mod sinks;
pub mod tempfile_mgr;
pub mod transfer;
pub mod url_util;

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;

pub use config::{Config, SignaturePolicy};
pub use error::{DownloadError, DownloadResult};
pub use events::{DownloadEvent, DownloadEventSink, NullSink, Outcome};
pub use fetch::{fetch_pkg_url, FetchedPackage};
pub use parallel::PayloadResult;
pub use payload::Payload;
pub use signal::InterruptFlag;

/// User-supplied override for the whole engine (§4.J's "fetch
/// callback"): when installed, it fully replaces `download_one` /
/// `download_many`'s built-in HTTP path. Returns `Ok(true)` if the
/// file was freshly downloaded, `Ok(false)` if it was already
/// up-to-date.
pub trait FetchCallback: Send + Sync {
    fn fetch(&self, file_url: &str, cache_dir: &Path, force: bool) -> DownloadResult<bool>;
}

/// Download one payload, driving a Ctrl-C shield for the duration of
/// the call. Equivalent to `dload.c`'s `_alpm_download` for a single
/// server list. If `fetch_cb` is installed, it fully replaces the
/// built-in engine for this call.
pub async fn download_one(
    payload: Payload,
    cache_dir: &Path,
    client: &Client,
    sink: Arc<dyn DownloadEventSink>,
    fetch_cb: Option<&dyn FetchCallback>,
) -> PayloadResult {
    if let Some(cb) = fetch_cb {
        return run_via_callback(cb, &payload, cache_dir);
    }

    let file_path = payload.file_path.clone();
    let interrupt = InterruptFlag::new();
    let shield = signal::install_shield(interrupt.clone());

    let outcome = parallel::run_many(vec![payload], cache_dir, client.clone(), 1, interrupt, sink).await;

    shield.abort();
    outcome
        .into_iter()
        .next()
        .unwrap_or(PayloadResult::Failed(DownloadError::ServerNone(file_path)))
}

/// Download many payloads with bounded concurrency, mirror failover
/// per payload, and a single shared Ctrl-C shield for the whole
/// batch. Equivalent to `dload.c`'s `_alpm_multi_download`. With
/// `fetch_cb` installed, runs a sequential per-payload mirror loop
/// through the callback instead, accepting the first mirror that
/// reports success.
pub async fn download_many(
    payloads: Vec<Payload>,
    cache_dir: &Path,
    client: &Client,
    concurrency: usize,
    sink: Arc<dyn DownloadEventSink>,
    fetch_cb: Option<&dyn FetchCallback>,
) -> Vec<PayloadResult> {
    if let Some(cb) = fetch_cb {
        return payloads.iter().map(|p| run_via_callback(cb, p, cache_dir)).collect();
    }

    let interrupt = InterruptFlag::new();
    let shield = signal::install_shield(interrupt.clone());

    let results = parallel::run_many(payloads, cache_dir, client.clone(), concurrency, interrupt, sink).await;

    shield.abort();
    results
}

/// Try each of `payload`'s mirrors through `cb` in order, accepting
/// the first one that doesn't error.
fn run_via_callback(cb: &dyn FetchCallback, payload: &Payload, cache_dir: &Path) -> PayloadResult {
    let mut last_err = None;
    for server in &payload.servers {
        let url = format!("{}/{}", server.trim_end_matches('/'), payload.file_path.trim_start_matches('/'));
        match cb.fetch(&url, cache_dir, payload.force) {
            Ok(true) => {
                return PayloadResult::Success {
                    basename: crate::url_util::filename_of(&url).to_string(),
                }
            }
            Ok(false) => return PayloadResult::UpToDate,
            Err(e) => last_err = Some(e),
        }
    }
    let err = last_err.unwrap_or_else(|| DownloadError::ServerNone(payload.file_path.clone()));
    if payload.errors_ok {
        PayloadResult::OptionalFailed(err)
    } else {
        PayloadResult::Failed(err)
    }
}
