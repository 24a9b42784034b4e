use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use engine::Timeline;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::jobs::{Job, JobEvent};

#[derive(Deserialize)]
pub struct RenderRequest {
    template: serde_json::Value,
    output: Option<PathBuf>,
    #[serde(default)]
    debug: bool,
}

#[derive(Serialize)]
pub struct RenderResponse {
    job_id: i64,
    output: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_render))
        .route("/:id", get(get_render))
        .route("/:id/events", get(events))
        .route("/:id/cancel", post(cancel_render))
        .with_state(state)
}

/// POST /renders - load the template and start rendering it in the background
async fn create_render(
    State(state): State<AppState>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, StatusCode> {
    let timeline = Timeline::from_template_value(req.template).map_err(|err| {
        warn!(error = %err, "rejected template");
        StatusCode::BAD_REQUEST
    })?;

    let key = Uuid::new_v4().to_string();
    let output = req
        .output
        .unwrap_or_else(|| state.config.output_dir.join(format!("{}.mp4", key)));

    let job_id = state.jobs.create_job(output.clone());
    let handle = state.renderer.render(&key, timeline, &output, req.debug);
    state.jobs.attach(job_id, handle);
    info!(job_id, key = %key, output = %output.display(), "render started");

    Ok(Json(RenderResponse { job_id, output }))
}

async fn get_render(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, StatusCode> {
    state.jobs.get_job(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_render(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    if state.jobs.get_job(id).is_none() {
        return StatusCode::NOT_FOUND;
    }
    if state.jobs.cancel_job(id) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    }
}

fn to_event(event: &JobEvent) -> Event {
    Event::default()
        .event("progress")
        .json_data(event)
        .unwrap_or_else(|_| Event::default().comment("unserializable event"))
}

/// GET /renders/:id/events - SSE stream of one job, closed after its terminal event
async fn events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let rx = state.jobs.subscribe();
    let job = state.jobs.get_job(id).ok_or(StatusCode::NOT_FOUND)?;
    let snapshot = JobEvent {
        job_id: job.id,
        status: job.status,
        progress: job.progress,
        error: job.error.clone(),
    };
    let finished = job.status.is_terminal();

    let updates = stream::unfold((rx, finished), move |(mut rx, finished)| async move {
        if finished {
            return None;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.job_id == id => {
                    let finished = event.status.is_terminal();
                    return Some((Ok::<_, Infallible>(to_event(&event)), (rx, finished)));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let stream = stream::once(async move { Ok::<_, Infallible>(to_event(&snapshot)) }).chain(updates);
    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
