/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! High-level entry point: fetch a package URL (and, per policy, its
//! detached signature) into the cache. Ports `dload.c`'s
//! `alpm_fetch_pkgurl`.

use std::sync::Arc;

use reqwest::Client;

use crate::cache::{filecache_find, filecache_setup};
use crate::config::SignaturePolicy;
use crate::engine::{self, AttemptOutcome};
use crate::error::{DownloadError, DownloadResult};
use crate::events::DownloadEventSink;
use crate::payload::Payload;
use crate::signal::InterruptFlag;

/// Outcome of `fetch_pkg_url`: the basename now present in the cache,
/// plus whether a signature was also retrieved.
#[derive(Debug)]
pub struct FetchedPackage {
    pub basename: String,
    pub signature_fetched: bool,
}

/// Resolve `url` into the cache directory. If an artifact with the
/// URL's basename already exists in the cache, no network access is
/// made for the package itself. Otherwise the package is downloaded
/// with `allow_resume = true, trust_remote_name = true`; if
/// `sig_policy.required`, a `.sig` sibling is then fetched with
/// `force = true, max_size = 16 KiB`, non-fatal per
/// `sig_policy.optional`.
pub async fn fetch_pkg_url(
    url: &str,
    cache_dir: &std::path::Path,
    client: &Client,
    sig_policy: SignaturePolicy,
    interrupt: &InterruptFlag,
    sink: Arc<dyn DownloadEventSink>,
) -> DownloadResult<FetchedPackage> {
    filecache_setup(cache_dir)?;

    let basename = crate::url_util::filename_of(url).to_string();
    if filecache_find(cache_dir, &basename).is_some() {
        tracing::debug!(basename = %basename, "package already present in cache");
        return Ok(FetchedPackage {
            basename,
            signature_fetched: false,
        });
    }

    let mut payload = Payload::new_from_url(url)?;
    payload.allow_resume = true;
    payload.trust_remote_name = true;

    let outcome = engine::run_attempt(&mut payload, cache_dir, client, interrupt, sink.as_ref()).await;
    let basename = match outcome {
        AttemptOutcome::Success { basename } => basename,
        AttemptOutcome::UpToDate => payload.remote_name.clone().unwrap_or(basename),
        AttemptOutcome::Retryable(e) | AttemptOutcome::Fatal(e) => {
            crate::tempfile_mgr::cleanup_if_marked(&payload);
            return Err(e);
        }
    };

    if !sig_policy.required {
        return Ok(FetchedPackage {
            basename,
            signature_fetched: false,
        });
    }

    let sig_url = format!("{}.sig", payload.file_url);
    let mut sig_payload = Payload::new_from_url(&sig_url)?;
    sig_payload.force = true;
    sig_payload.signature = true;
    sig_payload.max_size = Some(16 * 1024);
    sig_payload.errors_ok = sig_policy.optional;

    let sig_outcome = engine::run_attempt(&mut sig_payload, cache_dir, client, interrupt, sink.as_ref()).await;
    match sig_outcome {
        AttemptOutcome::Success { .. } | AttemptOutcome::UpToDate => Ok(FetchedPackage {
            basename,
            signature_fetched: true,
        }),
        AttemptOutcome::Fatal(e) | AttemptOutcome::Retryable(e) if sig_policy.optional => {
            crate::tempfile_mgr::cleanup_if_marked(&sig_payload);
            tracing::warn!(url = %sig_url, error = %e, "signature fetch failed, continuing without it");
            Ok(FetchedPackage {
                basename,
                signature_fetched: false,
            })
        }
        AttemptOutcome::Fatal(e) | AttemptOutcome::Retryable(e) => {
            crate::tempfile_mgr::cleanup_if_marked(&sig_payload);
            Err(e)
        }
    }
}

impl Payload {
    /// Split `url` into a single-server payload: everything up to the
    /// last `/` becomes the sole "mirror", the tail becomes
    /// `file_path`. Used when the caller hands over one fully-formed
    /// URL rather than a mirror list.
    pub fn new_from_url(url: &str) -> DownloadResult<Self> {
        let idx = url.rfind('/').ok_or_else(|| DownloadError::ServerBadUrl {
            url: url.to_string(),
            reason: "no path component".to_string(),
        })?;
        let (server, tail) = url.split_at(idx);
        let file_path = tail.trim_start_matches('/').to_string();
        Ok(Payload::new(file_path, vec![server.to_string()]))
    }
}
