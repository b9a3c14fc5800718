use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use orange_queue::plugins::http::cli::HttpCliPlugin;
use orange_queue::{DownloadQueue, DownloadStatus, DriverContext, ItemId, QueueConfig, QueueEvent};
use sanitize_filename::sanitize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use url::Url;

fn build_cli(http: &HttpCliPlugin) -> Command {
    let download = Command::new("download")
        .about("Download one or more links")
        .arg(
            Arg::new("links")
                .help("Links to download")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output directory")
                .default_value("./downloads")
                .num_args(1),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .help("Max simultaneous downloads")
                .default_value("3")
                .num_args(1),
        );

    Command::new("orange-queue")
        .about("Resumable download queue with bounded concurrency")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(http.augment_download_command(download))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let http = HttpCliPlugin::new();
    let matches = build_cli(&http).get_matches();

    match matches.subcommand() {
        Some(("download", m)) => download(m, &http).await,
        _ => Ok(()),
    }
}

async fn download(m: &ArgMatches, http: &HttpCliPlugin) -> anyhow::Result<()> {
    let out_dir: PathBuf = m.get_one::<String>("out_dir").context("--out-dir")?.into();
    let concurrency: usize = m.get_one::<String>("concurrency").context("--concurrency")?.parse()?;
    let links: Vec<String> = m.get_many::<String>("links").context("links")?.cloned().collect();

    let mut ctx = DriverContext::default();
    http.apply_download_matches(m, &mut ctx)?;

    let queue = DownloadQueue::with_defaults(QueueConfig::with_max_concurrent(concurrency), ctx)?;
    let ui = tokio::spawn(render(queue.subscribe()));

    let adder = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for link in links {
                let path = out_dir.join(file_name_for(&link));
                if let Err(e) = queue.add(link.as_str(), path).await {
                    tracing::error!(link = %link, error = %e, "could not queue link");
                }
            }
        })
    };

    let mut tick = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                queue.shutdown().await;
                break;
            }
            _ = tick.tick() => {
                if adder.is_finished() && queue.get_status().await.iter().all(|s| s.is_terminal()) {
                    queue.shutdown().await;
                    break;
                }
            }
        }
    }
    adder.abort();
    ui.abort();

    println!();
    println!("Summary:");
    for s in queue.get_status().await {
        let total = s.total_bytes.map(fmt_bytes).unwrap_or_else(|| "?".to_string());
        println!(
            "- {} status={} {} / {} path={} url={}",
            s.id,
            s.status,
            fmt_bytes(s.bytes_read),
            total,
            s.file_path.display(),
            s.url,
        );
        if let Some(e) = &s.last_error {
            println!("  error: {}", e);
        }
    }
    Ok(())
}

async fn render(mut rx: broadcast::Receiver<QueueEvent>) {
    let mp = MultiProgress::new();
    let sty_spin = ProgressStyle::with_template("{spinner:.green} {prefix} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("|/-\\ ");
    let sty_bar = ProgressStyle::with_template(
        "{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta}) {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut bars: HashMap<ItemId, ProgressBar> = HashMap::new();

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match evt {
            QueueEvent::ItemAdded { item_id, file_path, .. } => {
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(sty_spin.clone());
                pb.set_prefix(format!("[{}]", display_name(&file_path)));
                pb.enable_steady_tick(Duration::from_millis(120));
                pb.set_message("queued");
                bars.insert(item_id, pb);
            }
            QueueEvent::StatusChanged { item_id, status } => {
                let Some(pb) = bars.get(&item_id) else { continue };
                match status {
                    DownloadStatus::Completed => pb.finish_with_message("done"),
                    DownloadStatus::Canceled => pb.abandon_with_message("canceled"),
                    DownloadStatus::Error => pb.abandon_with_message("failed"),
                    s => pb.set_message(s.to_string()),
                }
            }
            QueueEvent::Progress { item_id, bytes_read, total_bytes } => {
                let Some(pb) = bars.get(&item_id) else { continue };
                if let Some(t) = total_bytes {
                    if pb.length() != Some(t) {
                        pb.set_style(sty_bar.clone());
                        pb.set_length(t);
                    }
                    pb.set_position(bytes_read.min(t));
                } else {
                    pb.set_message(fmt_bytes(bytes_read));
                }
            }
            QueueEvent::Failed { item_id, error } => {
                let _ = mp.println(format!("[ERR] {}: {}", item_id, error));
            }
        }
    }
}

fn file_name_for(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|u| u.path_segments().and_then(|s| s.last()).map(str::to_string))
        .filter(|s| !s.is_empty())
        .map(|s| sanitize(s))
        .unwrap_or_else(|| "download.bin".to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
