mod task;
mod unit;

use std::path::PathBuf;
use std::sync::Arc;

use engine::Timeline;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{RenderError, RenderResult};
use crate::media::MediaTool;
use crate::progress::ProgressBoard;

pub use task::{render_unit, UnitContext};
pub use unit::RenderUnit;

/// Starts renders. One per daemon.
#[derive(Clone)]
pub struct Renderer {
    tool: Arc<dyn MediaTool>,
    client: reqwest::Client,
    cache_root: PathBuf,
    debug: bool,
}

impl Renderer {
    pub fn new(tool: Arc<dyn MediaTool>, cache_root: impl Into<PathBuf>, debug: bool) -> Self {
        Renderer {
            tool,
            client: reqwest::Client::new(),
            cache_root: cache_root.into(),
            debug,
        }
    }

    /// Unit tree for `timeline` under the cache directory named by `key`.
    pub fn unit(&self, key: &str, timeline: Timeline, output: impl Into<PathBuf>) -> RenderUnit {
        RenderUnit::build(key, timeline, self.cache_root.join(key), output)
    }

    /// Spawn the render of `timeline` into `output`.
    pub fn render(&self, key: &str, timeline: Timeline, output: impl Into<PathBuf>, debug: bool) -> RenderHandle {
        let unit = self.unit(key, timeline, output);
        let board = ProgressBoard::new();
        for id in unit.ids() {
            board.register(&id);
        }
        let progress = board.subscribe();
        let cancel = CancellationToken::new();
        let ctx = UnitContext {
            tool: self.tool.clone(),
            client: self.client.clone(),
            board,
            debug: self.debug || debug,
        };
        let task = tokio::spawn(render_unit(unit, ctx, cancel.clone()));
        RenderHandle {
            progress,
            cancel,
            task,
        }
    }
}

/// A running render: progress updates, cancellation, and exactly one terminal result.
pub struct RenderHandle {
    progress: watch::Receiver<f64>,
    cancel: CancellationToken,
    task: JoinHandle<RenderResult<PathBuf>>,
}

impl RenderHandle {
    /// Overall fraction in `[0, 1]`, never decreasing.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Cancelling the token stops this render and every nested unit.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> RenderResult<PathBuf> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RenderError::Cancelled),
            Err(err) => Err(RenderError::Internal(format!("render task failed: {}", err))),
        }
    }
}
