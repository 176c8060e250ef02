/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! The per-download work item and its lifecycle.

use std::path::PathBuf;

use crate::error::DownloadError;

/// Whether a tempfile attempt starts from scratch or appends to an
/// existing `.part` file. Mirrors `dload.c`'s `tempfile_openmode`
/// ("wb" / "ab"), spelled as an enum instead of a mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Fresh,
    Resume,
}

/// A single download work-item: one final artifact, N candidate mirrors.
///
/// Mutated only by the driver running it (see `engine` / `parallel`)
/// during its own attempt, and finalized (rename + event) by that
/// driver. See `reset` / `reset_for_retry` for the two supported
/// lifecycle transitions back to a clean/retryable state.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Absolute URL to fetch: current server prefixed onto `file_path`.
    pub file_url: String,
    /// Path component relative to a mirror root; used to rebuild
    /// `file_url` whenever `servers` advances.
    pub file_path: String,
    /// Ordered, non-empty candidate mirror base URLs. The mirror at
    /// `mirror_index` is the one currently in use.
    pub servers: Vec<String>,
    pub mirror_index: usize,

    /// Display/event name. Derived from the URL tail if never set.
    pub remote_name: Option<String>,
    /// Absolute path of the in-progress `.part` (or random tempfile).
    pub temp_file_name: Option<PathBuf>,
    /// Absolute path of the final artifact; may be rewritten by
    /// `trust_remote_name` logic.
    pub dest_file_name: Option<PathBuf>,
    /// Filename extracted from `Content-Disposition`, if any.
    pub content_disp_name: Option<String>,

    pub temp_open_mode: OpenMode,
    /// Bytes already present locally at the start of this attempt.
    pub initial_size: u64,
    /// Last reported cumulative size, for deduping progress events.
    pub prev_progress: u64,
    /// Hard upper bound on total bytes. `None` = unlimited.
    pub max_size: Option<u64>,
    /// Last observed HTTP response code.
    pub resp_code: Option<u16>,

    pub allow_resume: bool,
    pub force: bool,
    pub trust_remote_name: bool,
    pub errors_ok: bool,
    pub signature: bool,
    pub unlink_on_fail: bool,
}

impl Payload {
    /// Build a fresh payload for `file_path` against `servers`.
    ///
    /// # Panics
    /// Panics if `servers` is empty — a payload always has at least
    /// one candidate mirror (§3 invariant: `servers` non-empty).
    pub fn new(file_path: impl Into<String>, servers: Vec<String>) -> Self {
        assert!(!servers.is_empty(), "payload must have at least one server");
        let file_path = file_path.into();
        let file_url = build_file_url(&servers[0], &file_path);
        Self {
            file_url,
            file_path,
            servers,
            mirror_index: 0,
            remote_name: None,
            temp_file_name: None,
            dest_file_name: None,
            content_disp_name: None,
            temp_open_mode: OpenMode::Fresh,
            initial_size: 0,
            prev_progress: 0,
            max_size: None,
            resp_code: None,
            allow_resume: false,
            force: false,
            trust_remote_name: false,
            errors_ok: false,
            signature: false,
            unlink_on_fail: false,
        }
    }

    /// Current mirror base URL.
    pub fn current_server(&self) -> &str {
        &self.servers[self.mirror_index]
    }

    /// Advance the cursor to the next untried mirror and rebuild
    /// `file_url`. Returns `false` (and leaves state untouched) once
    /// the list is exhausted — mirrors `dload.c`'s
    /// `curl_multi_retry_next_server` cursor walk (§3 invariant 4: a
    /// payload never retries the same mirror twice).
    pub fn advance_mirror(&mut self) -> bool {
        if self.mirror_index + 1 >= self.servers.len() {
            return false;
        }
        self.mirror_index += 1;
        self.file_url = build_file_url(self.current_server(), &self.file_path);
        true
    }

    pub fn remote_name_or_derive(&mut self) -> &str {
        if self.remote_name.is_none() {
            self.remote_name = Some(crate::url_util::filename_of(&self.file_url).to_string());
        }
        self.remote_name.as_deref().unwrap()
    }

    /// `_alpm_dload_payload_reset`: fully clear per-attempt state.
    pub fn reset(&mut self) {
        self.remote_name = None;
        self.temp_file_name = None;
        self.dest_file_name = None;
        self.content_disp_name = None;
        self.resp_code = None;
        self.initial_size = 0;
        self.prev_progress = 0;
        self.unlink_on_fail = false;
        self.temp_open_mode = OpenMode::Fresh;
    }

    /// `_alpm_dload_payload_reset_for_retry`: preserve accumulated
    /// `initial_size` (folding in `prev_progress`) across a retry of
    /// the *same logical payload* (e.g. package then signature in
    /// `fetch_pkg_url`), rather than zeroing everything.
    pub fn reset_for_retry(&mut self) {
        self.initial_size += self.prev_progress;
        self.prev_progress = 0;
        self.unlink_on_fail = false;
    }

    pub fn host(&self) -> Result<String, DownloadError> {
        crate::url_util::host_of(&self.file_url)
    }
}

fn build_file_url(server: &str, file_path: &str) -> String {
    format!("{}/{}", server.trim_end_matches('/'), file_path.trim_start_matches('/'))
}
