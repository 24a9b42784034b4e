use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine::{compile, Finish, Layout, RenderCommand};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::unit::RenderUnit;
use crate::assets::AssetResolver;
use crate::error::{RenderError, RenderResult};
use crate::media::MediaTool;
use crate::progress::ProgressBoard;

/// What every unit of one render shares.
#[derive(Clone)]
pub struct UnitContext {
    pub tool: Arc<dyn MediaTool>,
    pub client: reqwest::Client,
    pub board: ProgressBoard,
    pub debug: bool,
}

/// Render `unit` and its children, children first. Returns the unit's output path.
///
/// On failure or cancellation the unit's cache directory and partial output are removed unless
/// `debug` is set. Nested units live under their parent's cache directory, so the parent's teardown
/// also covers children that were dropped mid-render.
pub fn render_unit(unit: RenderUnit, ctx: UnitContext, cancel: CancellationToken) -> BoxFuture<'static, RenderResult<PathBuf>> {
    async move {
        let id = unit.id.clone();
        let cache_dir = unit.cache_dir.clone();
        let output = unit.output.clone();
        let debug = ctx.debug || unit.timeline.settings.debug;

        let result = tokio::select! {
            result = run_unit(unit, &ctx, &cancel) => result,
            _ = cancel.cancelled() => Err(RenderError::Cancelled),
        };

        match &result {
            Ok(path) => {
                info!(unit = %id, output = %path.display(), "unit rendered");
                if !debug {
                    remove_dir(&cache_dir).await;
                }
            }
            Err(err) => {
                if err.is_cancelled() {
                    warn!(unit = %id, "unit cancelled");
                } else {
                    warn!(unit = %id, error = %err, "unit failed");
                }
                if !debug {
                    remove_dir(&cache_dir).await;
                    remove_file(&output).await;
                }
            }
        }
        result
    }
    .boxed()
}

async fn run_unit(mut unit: RenderUnit, ctx: &UnitContext, cancel: &CancellationToken) -> RenderResult<PathBuf> {
    tokio::fs::create_dir_all(&unit.cache_dir).await?;
    if let Some(parent) = unit.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    ctx.board.register(&unit.id);
    info!(unit = %unit.id, scenes = unit.timeline.scenes.len(), children = unit.children.len(), "rendering unit");

    let children = std::mem::take(&mut unit.children);
    let placements: Vec<(usize, usize)> = children.iter().map(|c| (c.scene, c.node)).collect();
    let outputs = try_join_all(
        children
            .into_iter()
            .map(|child| render_unit(child.unit, ctx.clone(), cancel.child_token())),
    )
    .await?;
    for ((scene, node), path) in placements.into_iter().zip(outputs) {
        unit.attach_output(scene, node, &path);
    }

    let resolver = AssetResolver::new(&unit.cache_dir, ctx.client.clone());
    resolver.resolve_timeline(&mut unit.timeline, ctx.tool.as_ref()).await?;

    let layout = Layout::new(&unit.cache_dir, &unit.output);
    let (timeline, plan) = compile(&unit.timeline, &layout)?;
    for file in &plan.files {
        tokio::fs::write(&file.path, &file.contents).await?;
    }

    let total = plan.total_frames.max(1) as f64;
    let mut done = 0u64;
    let fps = timeline.settings.fps as f64;
    for (program, command) in plan.scenes.iter().zip(plan.scene_commands(&timeline)) {
        run_command(ctx, &unit.id, &command, done, total, cancel).await?;
        done += (program.duration * fps).round() as u64;
    }

    match &plan.finish {
        Finish::Relocate { from, to } => relocate(from, to).await?,
        Finish::Program(_) => {
            if let Some(command) = plan.final_command(&timeline) {
                run_command(ctx, &unit.id, &command, done, total, cancel).await?;
            }
        }
    }
    ctx.board.report(&unit.id, 1.0);
    Ok(unit.output)
}

async fn run_command(
    ctx: &UnitContext,
    unit: &str,
    command: &RenderCommand,
    done: u64,
    total: f64,
    cancel: &CancellationToken,
) -> RenderResult<()> {
    debug!(unit, output = %command.output_path.display(), "running program");
    let board = &ctx.board;
    let on_frame = |frame: u64| board.report(unit, (done + frame) as f64 / total);
    ctx.tool.run(&command.ffmpeg_args, &on_frame, cancel).await
}

/// Move the artifact into place, copying when a rename crosses filesystems.
async fn relocate(from: &Path, to: &Path) -> RenderResult<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

async fn remove_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), "removed cache directory"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove cache directory"),
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove partial output"),
    }
}
