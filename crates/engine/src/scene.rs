use std::path::PathBuf;

use tracing::debug;

use crate::command::{Input, Program};
use crate::error::{EngineError, EngineResult};
use crate::graph::{num, Context};
use crate::nodes::{build_chain, Stage};
use crate::timeline::{Background, ProjectSettings, Scene};

const DEFAULT_BACKGROUND: &str = "black";

/// The first input of every scene program: a colour source or a looped, scaled image.
fn background(program: &mut Program, scene: &Scene, stage: &Stage) -> Context {
    match &scene.background {
        Some(Background::Image(path)) => {
            let idx = program.add_input(Input::looped_image(path.clone(), stage.duration, stage.fps));
            let ctx = program.graph.apply(
                Context::from_input(idx, 'v'),
                format!("scale={}:{}", stage.width, stage.height),
                "bg",
            );
            program.graph.apply(ctx, "setsar=1", "bg")
        }
        Some(Background::Color(color)) => color_source(program, color, stage),
        None => color_source(program, DEFAULT_BACKGROUND, stage),
    }
}

fn color_source(program: &mut Program, color: &str, stage: &Stage) -> Context {
    let idx = program.add_input(Input::lavfi(format!(
        "color=c={}:s={}x{}:d={}:r={}",
        color,
        stage.width,
        stage.height,
        num(stage.duration),
        stage.fps
    )));
    Context::from_input(idx, 'v')
}

/// Compile one scene into a silent program rendering `output`.
pub fn compile_scene(
    scene: &Scene,
    index: usize,
    settings: &ProjectSettings,
    output: PathBuf,
) -> EngineResult<Program> {
    if scene.duration <= 0.0 {
        return Err(EngineError::validation(format!(
            "scene {} has non-positive duration {}",
            index, scene.duration
        )));
    }
    let stage = Stage {
        width: settings.width,
        height: settings.height,
        fps: settings.fps,
        duration: scene.duration,
    };

    let mut program = Program::new(output, scene.duration);
    let mut ctx = background(&mut program, scene, &stage);
    for node in &scene.nodes {
        ctx = build_chain(&mut program, ctx, node, &stage)?;
    }
    let ctx = program.graph.apply(ctx, "format=yuv420p", "scene");
    program.video = Some(ctx.input().to_string());
    program.validate()?;

    debug!(
        scene = index,
        nodes = scene.nodes.len(),
        graph = %program.graph.render(),
        "compiled scene"
    );
    Ok(program)
}
