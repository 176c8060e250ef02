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

//! Error types for the download engine.

use thiserror::Error;

/// Error type surfaced by download-engine operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Allocation / internal bookkeeping failure.
    #[error("memory error: {0}")]
    Memory(String),

    /// URL could not be parsed, or its host could not be resolved.
    #[error("invalid or unresolvable URL '{url}': {reason}")]
    ServerBadUrl { url: String, reason: String },

    /// A payload has no candidate mirrors left.
    #[error("no servers configured for '{0}'")]
    ServerNone(String),

    /// HTTP/FTP response >= 400, or a size mismatch on completion.
    #[error("failed retrieving '{remote_name}' from {host}: {message}")]
    Retrieve {
        remote_name: String,
        host: String,
        message: String,
    },

    /// Generic transfer-library failure (network error, stall, abort).
    #[error("transfer failed for '{remote_name}': {message}")]
    Transfer { remote_name: String, message: String },

    /// Filesystem operation failure (tempfile create, rename, truncate).
    #[error("filesystem error on '{path}': {source}")]
    System {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No engine available (build without the transfer-library capability)
    /// and no user fetch-callback installed.
    #[error("no download backend available for '{0}'")]
    ExternalDownload(String),

    /// The operation was interrupted by the user (SIGINT).
    #[error("download interrupted")]
    Interrupted,
}

impl DownloadError {
    /// Mirrors `dload.c`'s failover decision: should the driver advance
    /// the mirror cursor and retry rather than giving up on this payload?
    pub fn is_mirror_eligible(&self) -> bool {
        matches!(
            self,
            DownloadError::ServerBadUrl { .. } | DownloadError::Retrieve { .. } | DownloadError::Transfer { .. }
        )
    }
}

pub type DownloadResult<T> = std::result::Result<T, DownloadError>;
