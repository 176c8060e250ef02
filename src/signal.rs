/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! Cooperative cancellation, standing in for `dload.c`'s
//! `dload_interrupted` global plus its SIGINT/SIGPIPE shielding.
//!
//! `dload.c` installs a SIGINT handler around the whole libcurl
//! multi-loop and restores the previous disposition (or re-raises)
//! once the loop exits. Nothing here runs on a signal handler's
//! stack — instead, a background task owns `tokio::signal::ctrl_c()`
//! and flips an atomic flag that every progress tick polls, which is
//! the async-native equivalent of the same shielding discipline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NONE: u8 = 0;
const SIGINT: u8 = 1;
const OVER_MAXFILESIZE: u8 = 2;

/// Shared, cheaply cloneable interrupt flag. One instance is created
/// per top-level download call (single or parallel) and handed to
/// every progress tracker it spawns.
#[derive(Debug, Clone)]
pub struct InterruptFlag(Arc<AtomicU8>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(NONE)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst) != NONE
    }

    pub fn is_over_max_filesize(&self) -> bool {
        self.0.load(Ordering::SeqCst) == OVER_MAXFILESIZE
    }

    pub fn is_sigint(&self) -> bool {
        self.0.load(Ordering::SeqCst) == SIGINT
    }

    pub fn set_sigint(&self) {
        self.0.store(SIGINT, Ordering::SeqCst);
    }

    pub fn set_over_max_filesize(&self) {
        self.0.store(OVER_MAXFILESIZE, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(NONE, Ordering::SeqCst);
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that waits for Ctrl-C and sets `flag` once. The
/// returned handle should be aborted once the driven download
/// completes, so a later Ctrl-C isn't silently swallowed by a
/// finished transfer's shield.
pub fn install_shield(flag: InterruptFlag) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt, aborting in-flight transfers");
            flag.set_sigint();
        }
    })
}
