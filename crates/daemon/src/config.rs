use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

const DEFAULT_BIND: &str = "127.0.0.1:7777";
const DEFAULT_JOB_RETENTION_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind: SocketAddr,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Keep cache directories and partial outputs for every job.
    pub debug: bool,
    pub log_level: LevelFilter,
    /// How long finished jobs stay queryable.
    pub job_retention: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind = lookup("CUTLINE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("CUTLINE_BIND is not a socket address: {}", bind))?;

        let debug = match lookup("CUTLINE_DEBUG") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("CUTLINE_DEBUG is not a boolean: {}", value))?,
            None => false,
        };

        let log_level = match lookup("CUTLINE_LOG") {
            Some(value) => value
                .parse::<LevelFilter>()
                .with_context(|| format!("CUTLINE_LOG is not a log level: {}", value))?,
            None => LevelFilter::INFO,
        };

        let job_retention = match lookup("CUTLINE_JOB_RETENTION_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("CUTLINE_JOB_RETENTION_SECS is not a number of seconds: {}", value))?,
            None => DEFAULT_JOB_RETENTION_SECS,
        };

        Ok(DaemonConfig {
            bind,
            cache_dir: lookup("CUTLINE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".cache/cutline")),
            output_dir: lookup("CUTLINE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            ffmpeg: lookup("CUTLINE_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe: lookup("CUTLINE_FFPROBE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffprobe")),
            debug,
            log_level,
            job_retention: Duration::from_secs(job_retention),
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
