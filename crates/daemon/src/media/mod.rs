pub mod ffmpeg;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::RenderResult;

pub use ffmpeg::FfmpegTool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub has_audio: bool,
}

/// The external media tool: runs compiled argument lists and probes files.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Run one argument list to completion. `on_frame` receives the processed-frame count as it grows.
    async fn run(
        &self,
        args: &[String],
        on_frame: &(dyn Fn(u64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> RenderResult<()>;

    async fn probe(&self, path: &Path) -> RenderResult<MediaInfo>;
}

/// Stable file-name stem for a remote source.
pub fn cache_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
