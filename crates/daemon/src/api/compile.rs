use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use engine::{compile, render_command, EngineResult, Finish, Layout, Program, Strategy, Timeline};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

use super::AppState;
use crate::render::RenderUnit;

#[derive(Deserialize)]
pub struct CompileRequest {
    template: serde_json::Value,
}

#[derive(Serialize)]
pub struct PlannedProgram {
    output: PathBuf,
    graph: Option<String>,
    args: Vec<String>,
}

impl PlannedProgram {
    fn new(program: &Program, timeline: &Timeline) -> Self {
        let command = render_command(program, &timeline.settings);
        PlannedProgram {
            output: command.output_path,
            graph: program.filter_complex(),
            args: command.ffmpeg_args,
        }
    }
}

#[derive(Serialize)]
pub struct PlannedFile {
    path: PathBuf,
    contents: String,
}

/// A compiled unit. Nested compositions appear as children, rendered before their parent.
#[derive(Serialize)]
pub struct PlanResponse {
    unit: String,
    output: PathBuf,
    strategy: Strategy,
    duration: f64,
    total_frames: u64,
    files: Vec<PlannedFile>,
    scenes: Vec<PlannedProgram>,
    /// `None` when the single scene artifact is moved into place.
    finish: Option<PlannedProgram>,
    children: Vec<PlanResponse>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/compile", post(compile_template))
        .with_state(state)
}

/// POST /compile - compile a template into its programs without running anything
async fn compile_template(
    State(state): State<AppState>,
    Json(req): Json<CompileRequest>,
) -> Result<Json<PlanResponse>, StatusCode> {
    let timeline = Timeline::from_template_value(req.template).map_err(|err| {
        warn!(error = %err, "rejected template");
        StatusCode::BAD_REQUEST
    })?;

    let key = format!("plan-{}", Uuid::new_v4());
    let output = state.config.output_dir.join(format!("{}.mp4", key));
    let unit = state.renderer.unit(&key, timeline, output);
    let plan = plan_unit(unit).map_err(|err| {
        warn!(error = %err, "template does not compile");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;
    Ok(Json(plan))
}

fn plan_unit(mut unit: RenderUnit) -> EngineResult<PlanResponse> {
    unit.attach_planned_outputs();
    let children = std::mem::take(&mut unit.children)
        .into_iter()
        .map(|child| plan_unit(child.unit))
        .collect::<EngineResult<Vec<_>>>()?;

    let layout = Layout::new(&unit.cache_dir, &unit.output);
    let (timeline, plan) = compile(&unit.timeline, &layout)?;
    let finish = match &plan.finish {
        Finish::Program(program) => Some(PlannedProgram::new(program, &timeline)),
        Finish::Relocate { .. } => None,
    };

    Ok(PlanResponse {
        unit: unit.id,
        output: unit.output,
        strategy: plan.strategy,
        duration: plan.duration,
        total_frames: plan.total_frames,
        files: plan
            .files
            .into_iter()
            .map(|f| PlannedFile {
                path: f.path,
                contents: f.contents,
            })
            .collect(),
        scenes: plan
            .scenes
            .iter()
            .map(|program| PlannedProgram::new(program, &timeline))
            .collect(),
        finish,
        children,
    })
}
