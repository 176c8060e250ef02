/*
 * pacboost - High-performance Arch Linux package manager frontend.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 */

//! Request configuration for a single transfer attempt. Ports
//! `dload.c`'s `curl_set_handle_opts`: connect timeout, low-speed
//! floor, max-size hint, and the resume/freshness decision, onto a
//! `reqwest::RequestBuilder`.

use std::path::Path;
use std::time::{Duration, SystemTime};

use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE, RANGE};
use reqwest::{Client, ClientBuilder, RequestBuilder};

use crate::payload::{OpenMode, Payload};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LOW_SPEED_LIMIT_BYTES_PER_SEC: u64 = 1;
const LOW_SPEED_TIME: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// Build the shared client used for every transfer attempt. Mirrors
/// the once-per-handle curl easy-handle setup in spirit: the timeouts
/// and redirect policy here apply uniformly, while per-attempt state
/// (URL, resume offset, conditional headers) is layered on per
/// request in `configure_request`.
pub fn build_client(disable_low_speed_timeout: bool) -> reqwest::Result<Client> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

    if !disable_low_speed_timeout {
        // reqwest has no native low-speed-abort primitive; engine.rs
        // enforces the equivalent floor by timing progress ticks
        // against `LOW_SPEED_TIME`, so only the idle-connection
        // timeout mirrors the same budget here.
        builder = builder.timeout(LOW_SPEED_TIME * 6);
    }

    builder.build()
}

pub fn low_speed_limit() -> u64 {
    LOW_SPEED_LIMIT_BYTES_PER_SEC
}

pub fn low_speed_time() -> Duration {
    LOW_SPEED_TIME
}

/// Apply resume/freshness decisions to `request` and update `payload`
/// in place (`temp_open_mode`, `initial_size`). Exactly one of the two
/// branches below can fire per `dload.c`'s `if / else if` structure —
/// a destination that already exists always wins over a stale partial
/// download.
pub fn configure_request(
    mut request: RequestBuilder,
    payload: &mut Payload,
    dest_path: Option<&Path>,
    temp_path: Option<&Path>,
) -> RequestBuilder {
    if let Some(user_agent) = std::env::var("HTTP_USER_AGENT").ok() {
        request = request.header(reqwest::header::USER_AGENT, user_agent);
    }

    let dest_mtime = (!payload.allow_resume && !payload.force)
        .then(|| dest_path)
        .flatten()
        .and_then(|p| std::fs::metadata(p).ok())
        .and_then(|m| m.modified().ok());

    if let Some(mtime) = dest_mtime {
        if let Some(header) = http_date(mtime) {
            request = request.header(IF_MODIFIED_SINCE, header);
        }
    } else if payload.allow_resume {
        if let Some(size) = temp_path.and_then(|p| std::fs::metadata(p).ok()).map(|m| m.len()) {
            payload.temp_open_mode = OpenMode::Resume;
            payload.initial_size = size;
            request = request.header(RANGE, format!("bytes={size}-"));
        }
    }

    request
}

fn http_date(time: SystemTime) -> Option<HeaderValue> {
    let since_epoch = time.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + since_epoch)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_sets_range_header_and_temp_open_mode() {
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("core.db.part");
        std::fs::write(&temp_path, b"0123456789").unwrap();

        let mut payload = Payload::new("core.db", vec!["https://a".to_string()]);
        payload.allow_resume = true;

        let client = Client::new();
        let req = configure_request(client.get("https://a/core.db"), &mut payload, None, Some(&temp_path));

        assert_eq!(payload.initial_size, 10);
        assert_eq!(payload.temp_open_mode, OpenMode::Resume);
        let built = req.build().unwrap();
        assert_eq!(built.headers().get(RANGE).unwrap(), "bytes=10-");
    }

    #[test]
    fn freshness_check_wins_over_resume_when_destination_exists() {
        let dir = tempfile::tempdir().unwrap();
        let dest_path = dir.path().join("core.db");
        let temp_path = dir.path().join("core.db.part");
        std::fs::write(&dest_path, b"stale").unwrap();
        std::fs::write(&temp_path, b"partial").unwrap();

        let mut payload = Payload::new("core.db", vec!["https://a".to_string()]);
        payload.allow_resume = true;

        let client = Client::new();
        let req = configure_request(
            client.get("https://a/core.db"),
            &mut payload,
            Some(&dest_path),
            Some(&temp_path),
        );

        assert_eq!(payload.initial_size, 0);
        let built = req.build().unwrap();
        assert!(built.headers().contains_key(IF_MODIFIED_SINCE));
        assert!(!built.headers().contains_key(RANGE));
    }

    #[test]
    fn force_skips_freshness_check_even_with_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest_path = dir.path().join("core.db");
        std::fs::write(&dest_path, b"stale").unwrap();

        let mut payload = Payload::new("core.db", vec!["https://a".to_string()]);
        payload.force = true;

        let client = Client::new();
        let req = configure_request(client.get("https://a/core.db"), &mut payload, Some(&dest_path), None);
        let built = req.build().unwrap();
        assert!(!built.headers().contains_key(IF_MODIFIED_SINCE));
    }
}
