use axum::Router;
use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::jobs::JobManager;
use crate::render::Renderer;

pub mod compile;
pub mod renders;

/// Shared handles every route needs.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub renderer: Arc<Renderer>,
    pub config: Arc<DaemonConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/renders", renders::router(state.clone()))
        .merge(compile::router(state))
}
