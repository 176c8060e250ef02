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

//! The cache directory as an opaque collaborator: existence checks
//! only, no content-addressed dedup or LRU eviction (that machinery
//! belongs to a package-management layer this crate doesn't own).

use std::path::{Path, PathBuf};

use crate::error::DownloadError;

/// Ensure `cache_dir` exists, creating it (and its parents) if not.
pub fn filecache_setup(cache_dir: &Path) -> Result<(), DownloadError> {
    std::fs::create_dir_all(cache_dir).map_err(|e| DownloadError::System {
        path: cache_dir.display().to_string(),
        source: e,
    })
}

/// Look up `basename` in `cache_dir`; `Some(path)` if it already
/// exists there.
pub fn filecache_find(cache_dir: &Path, basename: &str) -> Option<PathBuf> {
    let candidate = cache_dir.join(basename);
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("pkg");
        filecache_setup(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn find_reports_existing_and_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.db"), b"x").unwrap();

        assert_eq!(filecache_find(dir.path(), "core.db"), Some(dir.path().join("core.db")));
        assert_eq!(filecache_find(dir.path(), "missing.db"), None);
    }
}
