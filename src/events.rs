/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! Download progress/completion events, delivered to an optional
//! caller-supplied callback. Mirrors `dload.c`'s
//! `alpm_download_event_*` structs and `handle->dlcb` invocations.

/// Outcome reported on `DownloadEvent::Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    UpToDate,
    Failed,
}

/// One event in a payload's INIT -> PROGRESS* -> COMPLETED sequence.
/// No ordering is promised across payloads; within a payload, INIT
/// always precedes any PROGRESS, which always precede COMPLETED.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// `optional` mirrors `payload.errors_ok`; only emitted by the
    /// parallel driver (the single driver reports a zeroed value, so
    /// callers relying only on this field should treat `false` as
    /// "not known to be optional").
    Init { optional: bool },
    Progress { downloaded: u64, total: u64 },
    Completed { total: u64, outcome: Outcome },
}

/// Callback invoked from inside progress/header/completion code paths.
/// Because the scheduler is single-threaded (see §5 of the spec),
/// this is not required to be thread-safe, but embedders driving the
/// engine from multiple tasks concurrently must synchronize their own
/// callback state.
pub trait DownloadEventSink: Send + Sync {
    fn on_event(&self, remote_name: &str, event: DownloadEvent);
}

/// A sink that discards every event; the default when the caller
/// doesn't care about progress reporting.
pub struct NullSink;

impl DownloadEventSink for NullSink {
    fn on_event(&self, _remote_name: &str, _event: DownloadEvent) {}
}

impl<F> DownloadEventSink for F
where
    F: Fn(&str, DownloadEvent) + Send + Sync,
{
    fn on_event(&self, remote_name: &str, event: DownloadEvent) {
        self(remote_name, event)
    }
}
