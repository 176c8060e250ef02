/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! Creation of anonymous, resume-incapable temp files for payloads
//! whose URL carries no usable filename (e.g. `.sig` side-channel
//! fetches with a missing remote name).

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DownloadError;
use crate::payload::Payload;

/// Create `<cache_dir>/alpmtmp.XXXXXX` with exclusive creation, chmod
/// it to `0666 & ~umask`, and update `payload.temp_file_name` /
/// `payload.remote_name` to the created path's tail. Mirrors
/// `dload.c`'s `create_tempfile`.
pub fn create_tempfile(cache_dir: &Path, payload: &mut Payload) -> Result<tokio::fs::File, DownloadError> {
    let named = tempfile::Builder::new()
        .prefix("alpmtmp.")
        .rand_bytes(6)
        .suffix("")
        .tempfile_in(cache_dir)
        .map_err(|e| to_system_err(cache_dir, e))?;

    apply_umasked_mode(&named)?;

    let (file, path) = named.keep().map_err(|e| DownloadError::System {
        path: cache_dir.display().to_string(),
        source: e.error,
    })?;

    payload.remote_name = Some(
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string(),
    );
    payload.temp_file_name = Some(path);

    tokio_file_from_std(file)
}

fn tokio_file_from_std(file: std::fs::File) -> Result<tokio::fs::File, DownloadError> {
    Ok(tokio::fs::File::from_std(file))
}

#[cfg(unix)]
fn apply_umasked_mode(named: &NamedTempFile) -> Result<(), DownloadError> {
    use std::os::unix::fs::PermissionsExt;

    // SAFETY: umask(2) is reentrant-safe to call from a single thread; we
    // immediately restore it. Mirrors dload.c's `_getumask`.
    let mask = unsafe {
        let m = libc::umask(0);
        libc::umask(m);
        m
    };
    let mode = 0o666 & !(mask as u32);
    named
        .as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))
        .map_err(|e| DownloadError::System {
            path: named.path().display().to_string(),
            source: e,
        })
}

#[cfg(not(unix))]
fn apply_umasked_mode(_named: &NamedTempFile) -> Result<(), DownloadError> {
    Ok(())
}

fn to_system_err(cache_dir: &Path, e: std::io::Error) -> DownloadError {
    DownloadError::System {
        path: cache_dir.display().to_string(),
        source: e,
    }
}

/// Absolute path for the `.part` file of a payload with a known
/// remote name: `<cache_dir>/<remote_name>.part`.
pub fn part_path(cache_dir: &Path, remote_name: &str) -> PathBuf {
    cache_dir.join(format!("{remote_name}.part"))
}

/// Absolute destination path: `<cache_dir>/<remote_name>`.
pub fn dest_path(cache_dir: &Path, remote_name: &str) -> PathBuf {
    cache_dir.join(remote_name)
}

/// Remove a payload's temp file if it was marked `unlink_on_fail`,
/// matching `curl_download_internal`'s `unlink(payload->tempfile_path)`
/// once a payload is given up on for good (as opposed to rotated to
/// the next mirror, which truncates instead).
pub fn cleanup_if_marked(payload: &crate::payload::Payload) {
    if !payload.unlink_on_fail {
        return;
    }
    if let Some(path) = &payload.temp_file_name {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_exclusive_file_under_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = Payload::new("x", vec!["https://m".to_string()]);
        create_tempfile(dir.path(), &mut payload).unwrap();

        let path = payload.temp_file_name.clone().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("alpmtmp."));
        assert!(path.exists());
        assert_eq!(payload.remote_name.as_deref(), path.file_name().and_then(|n| n.to_str()));
    }

    #[cfg(unix)]
    #[test]
    fn applies_umasked_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut payload = Payload::new("x", vec!["https://m".to_string()]);
        create_tempfile(dir.path(), &mut payload).unwrap();

        let path = payload.temp_file_name.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let mask = unsafe {
            let m = libc::umask(0);
            libc::umask(m);
            m
        };
        assert_eq!(mode, 0o666 & !(mask as u32));
    }

    #[test]
    fn part_and_dest_paths() {
        let dir = PathBuf::from("/var/cache/pacman/pkg");
        assert_eq!(part_path(&dir, "core.db"), dir.join("core.db.part"));
        assert_eq!(dest_path(&dir, "core.db"), dir.join("core.db"));
    }
}
