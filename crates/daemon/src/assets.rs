use std::path::{Path, PathBuf};

use engine::{NodeKind, Timeline};
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::media::{cache_key, MediaTool};

/// Turns the paths a timeline references into local files.
#[derive(Clone)]
pub struct AssetResolver {
    cache_dir: PathBuf,
    client: reqwest::Client,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Extension of a URL's path, query and fragment ignored.
fn remote_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}

impl AssetResolver {
    pub fn new(cache_dir: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        AssetResolver {
            cache_dir: cache_dir.into(),
            client,
        }
    }

    /// Cache location for a remote source.
    pub fn download_path(&self, url: &str) -> PathBuf {
        let mut name = cache_key(url);
        if let Some(ext) = remote_extension(url) {
            name.push('.');
            name.push_str(ext);
        }
        self.cache_dir.join(name)
    }

    pub async fn resolve(&self, source: &str) -> RenderResult<String> {
        if is_remote(source) {
            let path = self.download(source).await?;
            return Ok(path.to_string_lossy().into_owned());
        }
        match tokio::fs::try_exists(source).await {
            Ok(true) => Ok(source.to_string()),
            Ok(false) => Err(RenderError::missing_asset(source, "file not found")),
            Err(err) => Err(RenderError::missing_asset(source, err)),
        }
    }

    async fn download(&self, url: &str) -> RenderResult<PathBuf> {
        let path = self.download_path(url);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(url, path = %path.display(), "reusing cached download");
            return Ok(path);
        }

        info!(url, "downloading asset");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| RenderError::missing_asset(url, err))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| RenderError::missing_asset(url, err))?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let partial = path.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(path)
    }

    /// Resolve every asset of `timeline` in place, then measure images that carry no size.
    pub async fn resolve_timeline(&self, timeline: &mut Timeline, tool: &dyn MediaTool) -> RenderResult<()> {
        for path in timeline.asset_paths_mut() {
            *path = self.resolve(path).await?;
        }

        for scene in &mut timeline.scenes {
            for node in &mut scene.nodes {
                let NodeKind::Image { path } = &node.kind else {
                    continue;
                };
                if node.frame.w > 0.0 && node.frame.h > 0.0 {
                    continue;
                }
                let info = tool.probe(Path::new(path)).await?;
                debug!(path = %path, width = info.width, height = info.height, "measured image");
                node.settle_size(info.width as f64, info.height as f64);
            }
        }
        Ok(())
    }
}
