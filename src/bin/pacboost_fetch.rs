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

//! Thin demo binary exercising the download engine end to end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pacboost::{
    download_many, events::Outcome, logging, Config, DownloadEvent, DownloadEventSink, Payload, PayloadResult,
};

const VERSION: &str = "2.1.2";

#[derive(Parser)]
#[command(name = "pacboost-fetch")]
#[command(version = VERSION)]
#[command(about = "Fetch package files from a mirror list into a local cache directory.")]
struct Cli {
    /// Relative path to fetch from each mirror (e.g. core/os/x86_64/core.db)
    file_path: String,

    /// Mirror base URLs, tried in order
    #[arg(short = 'm', long = "mirror", required = true)]
    mirrors: Vec<String>,

    /// Destination cache directory
    #[arg(short = 'c', long, default_value = "/var/cache/pacman/pkg")]
    cache_dir: PathBuf,

    /// Maximum concurrent transfers
    #[arg(short = 'j', long, default_value_t = 4)]
    jobs: usize,

    /// Require and fail hard on a missing/failed detached signature
    #[arg(long)]
    require_signature: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

struct CliSink {
    bars: std::sync::Mutex<std::collections::HashMap<String, ProgressBar>>,
    multi: MultiProgress,
}

impl DownloadEventSink for CliSink {
    fn on_event(&self, remote_name: &str, event: DownloadEvent) {
        let mut bars = self.bars.lock().unwrap();
        match event {
            DownloadEvent::Init { .. } => {
                let pb = self.multi.add(ProgressBar::new(0));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("   {spinner:.blue} {msg} [{bar:25.blue/cyan}] {bytes}/{total_bytes}")
                        .unwrap()
                        .progress_chars("=>-"),
                );
                pb.set_message(remote_name.to_string());
                bars.insert(remote_name.to_string(), pb);
            }
            DownloadEvent::Progress { downloaded, total } => {
                if let Some(pb) = bars.get(remote_name) {
                    pb.set_length(total);
                    pb.set_position(downloaded);
                }
            }
            DownloadEvent::Completed { outcome, .. } => {
                if let Some(pb) = bars.remove(remote_name) {
                    match outcome {
                        Outcome::Success => pb.finish_with_message(format!("{} done", remote_name)),
                        Outcome::UpToDate => pb.finish_with_message(format!("{} up to date", remote_name)),
                        Outcome::Failed => pb.finish_with_message(format!("{} failed", remote_name)),
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(&cli.log_level);

    let mut config = Config::default();
    config.download_concurrency = cli.jobs;
    config.cache_dir = cli.cache_dir.clone();
    config.signature.required = cli.require_signature;
    config.validate().map_err(|e| anyhow!(e))?;

    std::fs::create_dir_all(&config.cache_dir)?;

    let client = reqwest::Client::new();
    let multi = MultiProgress::new();
    let sink: Arc<dyn DownloadEventSink> = Arc::new(CliSink {
        bars: std::sync::Mutex::new(std::collections::HashMap::new()),
        multi,
    });

    let payload = Payload::new(cli.file_path, cli.mirrors);
    let results = download_many(vec![payload], &config.cache_dir, &client, config.download_concurrency, sink, None).await;

    let mut failed = false;
    for result in &results {
        match result {
            PayloadResult::Success { basename } => {
                println!("{} {} downloaded", style("::").cyan().bold(), basename);
            }
            PayloadResult::UpToDate => {
                println!("{} already up to date", style("::").cyan().bold());
            }
            PayloadResult::Failed(e) => {
                eprintln!("{} {}", style("error:").red().bold(), e);
                failed = true;
            }
            PayloadResult::OptionalFailed(e) => {
                println!("{} optional fetch failed: {}", style("::").yellow().bold(), e);
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
