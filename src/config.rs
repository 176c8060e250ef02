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

//! Configuration management with validation and defaults, trimmed to
//! the fields the download engine itself owns.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Signature verification policy, mirroring `dload.c`'s
/// `ALPM_SIG_PACKAGE` / `ALPM_SIG_PACKAGE_OPTIONAL` handle bits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SignaturePolicy {
    /// Attempt to fetch a detached `.sig` alongside every package.
    pub required: bool,
    /// A missing or failed signature fetch is non-fatal.
    pub optional: bool,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            required: false,
            optional: true,
        }
    }
}

/// Download-engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of payloads driven concurrently.
    pub download_concurrency: usize,

    /// Per-connection idle timeout, in seconds.
    pub request_timeout_secs: u64,

    /// Disable the low-speed stall timeout entirely.
    pub disable_dl_timeout: bool,

    /// Cache directory artifacts are downloaded into.
    pub cache_dir: PathBuf,

    /// Signature fetch policy applied by `fetch_pkg_url`.
    pub signature: SignaturePolicy,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_concurrency: 4,
            request_timeout_secs: 300,
            disable_dl_timeout: false,
            cache_dir: PathBuf::from("/var/cache/pacman/pkg"),
            signature: SignaturePolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. `/etc/pacboost/pacboost.toml` (system-wide)
    /// 2. `~/.config/pacboost/config.toml` (user)
    /// 3. Environment variables (`PACBOOST_*`)
    pub fn load() -> Self {
        let mut config = Config::default();

        let system_config = Path::new("/etc/pacboost/pacboost.toml");
        if system_config.exists() {
            if let Ok(content) = fs::read_to_string(system_config) {
                if let Ok(parsed) = toml::from_str::<Config>(&content) {
                    config = config.merge(parsed);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("pacboost").join("config.toml");
            if user_config.exists() {
                if let Ok(content) = fs::read_to_string(user_config) {
                    if let Ok(parsed) = toml::from_str::<Config>(&content) {
                        config = config.merge(parsed);
                    }
                }
            }
        }

        config.apply_env_overrides()
    }

    /// Merge another config into this one (other takes precedence for non-default values)
    fn merge(mut self, other: Config) -> Self {
        let default = Config::default();

        if other.download_concurrency != default.download_concurrency {
            self.download_concurrency = other.download_concurrency;
        }
        if other.request_timeout_secs != default.request_timeout_secs {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        if other.disable_dl_timeout != default.disable_dl_timeout {
            self.disable_dl_timeout = other.disable_dl_timeout;
        }
        if other.cache_dir != default.cache_dir {
            self.cache_dir = other.cache_dir;
        }
        if other.log_level != default.log_level {
            self.log_level = other.log_level;
        }
        self.signature = other.signature;

        self
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PACBOOST_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.download_concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("PACBOOST_CACHE_DIR") {
            self.cache_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PACBOOST_LOG_LEVEL") {
            self.log_level = val;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.download_concurrency == 0 {
            return Err("download_concurrency must be at least 1".to_string());
        }
        if self.download_concurrency > 64 {
            return Err("download_concurrency must be at most 64".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = Config::default();
        assert_eq!(config.download_concurrency, 4);
        assert!(config.signature.optional);
        assert!(!config.signature.required);
    }

    #[test]
    fn validation_rejects_zero_and_excessive_concurrency() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.download_concurrency = 0;
        assert!(config.validate().is_err());

        config.download_concurrency = 100;
        assert!(config.validate().is_err());
    }
}
