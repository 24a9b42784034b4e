use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::mix;
use crate::command::{render_command, Input, Program, RenderCommand};
use crate::error::{EngineError, EngineResult};
use crate::graph::Context;
use crate::scene::compile_scene;
use crate::subtitle;
use crate::timeline::{ms_to_secs, SpeedMode, Timeline};
use crate::transition::{splice, SpliceInput, TransitionPicker};

/// How scene artifacts become the final file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One scene in high-speed mode: its artifact is moved into place.
    FastPath,
    /// Every scene carries a transition: split/trim/xfade/concat graph.
    Crossfade,
    /// Concat demuxer over a manifest of scene artifacts.
    Sequence,
}

pub fn select_strategy(timeline: &Timeline) -> Strategy {
    let scenes = &timeline.scenes;
    if scenes.len() == 1 && timeline.settings.speed == SpeedMode::High {
        Strategy::FastPath
    } else if scenes.len() > 1 && scenes.iter().all(|s| s.transition.is_some()) {
        Strategy::Crossfade
    } else {
        Strategy::Sequence
    }
}

/// Where intermediate and final files live.
#[derive(Debug, Clone)]
pub struct Layout {
    pub cache_dir: PathBuf,
    pub output: PathBuf,
}

impl Layout {
    pub fn new(cache_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Layout {
            cache_dir: cache_dir.into(),
            output: output.into(),
        }
    }

    pub fn scene_path(&self, index: usize) -> PathBuf {
        self.cache_dir.join(format!("scene-{}.mp4", index))
    }

    pub fn subtitle_path(&self, index: usize) -> PathBuf {
        self.cache_dir.join(format!("subtitle-{}.srt", index))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("scenes.txt")
    }
}

/// A text file the driver must write before running any program.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub enum Finish {
    Relocate { from: PathBuf, to: PathBuf },
    Program(Program),
}

/// Everything needed to produce one output: files to write, scene programs, and the final step.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub strategy: Strategy,
    pub files: Vec<GeneratedFile>,
    pub scenes: Vec<Program>,
    pub finish: Finish,
    pub duration: f64,
    /// Frames the driver should expect across all programs.
    pub total_frames: u64,
}

impl RenderPlan {
    pub fn scene_commands(&self, timeline: &Timeline) -> Vec<RenderCommand> {
        self.scenes
            .iter()
            .map(|program| render_command(program, &timeline.settings))
            .collect()
    }

    pub fn final_command(&self, timeline: &Timeline) -> Option<RenderCommand> {
        match &self.finish {
            Finish::Program(program) => Some(render_command(program, &timeline.settings)),
            Finish::Relocate { .. } => None,
        }
    }
}

/// `file '<path>'` per scene, newline terminated.
pub fn manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// Attach subtitle blocks, producing the SRT files they need.
fn prepare(timeline: &Timeline, layout: &Layout) -> (Timeline, Vec<GeneratedFile>) {
    let mut prepared = timeline.clone();
    let mut files = Vec::new();
    for (i, scene) in prepared.scenes.iter_mut().enumerate() {
        let path = layout.subtitle_path(i);
        if let Some(srt) = subtitle::attach(scene, &path.to_string_lossy()) {
            files.push(GeneratedFile {
                path,
                contents: srt,
            });
        }
    }
    (prepared, files)
}

/// Compile a timeline into a render plan. Pure: nothing is written or executed.
///
/// Nested compositions must already carry their rendered output path.
pub fn compile(timeline: &Timeline, layout: &Layout) -> EngineResult<(Timeline, RenderPlan)> {
    if timeline.scenes.is_empty() {
        return Err(EngineError::validation("timeline has no scenes"));
    }
    let (timeline, mut files) = prepare(timeline, layout);
    let strategy = select_strategy(&timeline);
    info!(?strategy, scenes = timeline.scenes.len(), "selected assembly strategy");

    let scenes = timeline
        .scenes
        .iter()
        .enumerate()
        .map(|(i, scene)| compile_scene(scene, i, &timeline.settings, layout.scene_path(i)))
        .collect::<EngineResult<Vec<_>>>()?;
    let scene_paths: Vec<PathBuf> = (0..scenes.len()).map(|i| layout.scene_path(i)).collect();

    let (finish, duration) = match strategy {
        Strategy::FastPath => {
            let from = scene_paths[0].clone();
            let duration = timeline.scenes[0].duration;
            (
                Finish::Relocate {
                    from,
                    to: layout.output.clone(),
                },
                duration,
            )
        }
        Strategy::Crossfade => {
            let program = crossfade_program(&timeline, &scene_paths, &layout.output)?;
            let duration = program.duration;
            (Finish::Program(program), duration)
        }
        Strategy::Sequence => {
            let manifest_path = layout.manifest_path();
            files.push(GeneratedFile {
                path: manifest_path.clone(),
                contents: manifest(&scene_paths),
            });
            let program = sequence_program(&timeline, &manifest_path, &layout.output)?;
            let duration = program.duration;
            (Finish::Program(program), duration)
        }
    };

    let frames = timeline.total_frames();
    let total_frames = match finish {
        Finish::Program(_) => frames * 2,
        Finish::Relocate { .. } => frames,
    };
    let plan = RenderPlan {
        strategy,
        files,
        scenes,
        finish,
        duration,
        total_frames,
    };
    Ok((timeline, plan))
}

fn crossfade_program(timeline: &Timeline, scene_paths: &[PathBuf], output: &Path) -> EngineResult<Program> {
    let mut picker = TransitionPicker::new(timeline.settings.seed.unwrap_or_default());
    let mut program = Program::new(output, 0.0);
    let mut inputs = Vec::with_capacity(scene_paths.len());
    for (scene, path) in timeline.scenes.iter().zip(scene_paths) {
        let spec = scene
            .transition
            .as_ref()
            .ok_or_else(|| EngineError::validation("crossfade scene without a transition"))?;
        let idx = program.add_input(Input::file(path.to_string_lossy().to_string()));
        let name = picker.resolve(&spec.name)?;
        inputs.push(SpliceInput::new(
            Context::from_input(idx, 'v'),
            scene.duration,
            name,
            spec,
        ));
    }

    let (video, total_ms) = splice(&mut program.graph, inputs)?;
    program.duration = ms_to_secs(total_ms);

    let tracks = timeline.collect_audio_tracks(&timeline.crossfade_offsets());
    let streams = mix(&mut program, Some(video), &tracks, timeline.settings.raw_audio_mix)?;
    program.video = streams.video.map(|c| c.input().to_string());
    program.audio = streams.audio.map(|c| c.input().to_string());
    program.validate()?;
    Ok(program)
}

fn sequence_program(timeline: &Timeline, manifest_path: &Path, output: &Path) -> EngineResult<Program> {
    let duration = ms_to_secs(timeline.scenes_duration_ms());
    let mut program = Program::new(output, duration);
    program.add_input(Input::concat_manifest(manifest_path.to_string_lossy().to_string()));

    let tracks = timeline.collect_audio_tracks(&timeline.scene_offsets());
    let streams = mix(&mut program, None, &tracks, timeline.settings.raw_audio_mix)?;
    program.video = Some(
        streams
            .video
            .map(|c| c.input().to_string())
            .unwrap_or_else(|| "0:v".to_string()),
    );
    program.audio = streams.audio.map(|c| c.input().to_string());
    program.validate()?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{AudioTrack, Cue, ProjectSettings, Scene, SubtitleBlock};

    fn layout() -> Layout {
        Layout::new("/tmp/cache", "/tmp/out/final.mp4")
    }

    fn timeline(scenes: Vec<Scene>) -> Timeline {
        let mut timeline = Timeline::new(ProjectSettings::new(640, 360, 25));
        timeline.scenes = scenes;
        timeline
    }

    #[test]
    fn strategy_selection() {
        let mut single = timeline(vec![Scene::new(3.0)]);
        assert_eq!(select_strategy(&single), Strategy::Sequence);
        single.settings.speed = SpeedMode::High;
        assert_eq!(select_strategy(&single), Strategy::FastPath);

        let faded = timeline(vec![
            Scene::new(5.0).with_transition("fade", 1.0),
            Scene::new(4.0).with_transition("fade", 1.0),
        ]);
        assert_eq!(select_strategy(&faded), Strategy::Crossfade);

        let partial = timeline(vec![Scene::new(5.0).with_transition("fade", 1.0), Scene::new(4.0)]);
        assert_eq!(select_strategy(&partial), Strategy::Sequence);
    }

    #[test]
    fn fast_path_relocates_the_only_scene() {
        let mut t = timeline(vec![Scene::new(3.0)]);
        t.settings.speed = SpeedMode::High;
        let (_, plan) = compile(&t, &layout()).unwrap();
        assert_eq!(plan.strategy, Strategy::FastPath);
        assert!(plan.final_command(&t).is_none());
        match plan.finish {
            Finish::Relocate { from, to } => {
                assert_eq!(from, PathBuf::from("/tmp/cache/scene-0.mp4"));
                assert_eq!(to, PathBuf::from("/tmp/out/final.mp4"));
            }
            Finish::Program(_) => panic!("expected relocation"),
        }
    }

    #[test]
    fn sequence_writes_a_manifest() {
        let t = timeline(vec![Scene::new(2.0), Scene::new(3.0)]);
        let (_, plan) = compile(&t, &layout()).unwrap();
        assert_eq!(plan.strategy, Strategy::Sequence);
        assert_eq!(plan.duration, 5.0);
        assert_eq!(plan.files.len(), 1);
        assert_eq!(
            plan.files[0].contents,
            "file '/tmp/cache/scene-0.mp4'\nfile '/tmp/cache/scene-1.mp4'\n"
        );
        let Finish::Program(program) = &plan.finish else {
            panic!("expected a program");
        };
        assert!(program.graph.is_empty());
        assert_eq!(program.video.as_deref(), Some("0:v"));
        assert_eq!(program.inputs[0].options, vec!["-f", "concat", "-safe", "0"]);
    }

    #[test]
    fn sequence_with_audio_mixes_after_the_manifest() {
        let mut t = timeline(vec![Scene::new(2.0), Scene::new(3.0)]);
        t.audios.push(AudioTrack::new("bgm.mp3"));
        let (_, plan) = compile(&t, &layout()).unwrap();
        let Finish::Program(program) = &plan.finish else {
            panic!("expected a program");
        };
        assert_eq!(program.inputs.len(), 2);
        assert!(program.graph.render().contains("[0:v][mix"));
        assert!(program.audio.is_some());
    }

    #[test]
    fn crossfade_plan_joins_scene_artifacts() {
        let t = timeline(vec![
            Scene::new(5.0).with_transition("fade", 1.0),
            Scene::new(4.0).with_transition("fade", 1.0),
        ]);
        let (_, plan) = compile(&t, &layout()).unwrap();
        assert_eq!(plan.strategy, Strategy::Crossfade);
        assert_eq!(plan.duration, 8.0);
        assert_eq!(plan.scenes.len(), 2);
        assert_eq!(plan.total_frames, 2 * 225);
        let command = plan.final_command(&t).unwrap();
        assert!(command.ffmpeg_args.contains(&"/tmp/cache/scene-1.mp4".to_string()));
    }

    #[test]
    fn unknown_transition_fails_compilation() {
        let t = timeline(vec![
            Scene::new(5.0).with_transition("fade", 1.0),
            Scene::new(4.0).with_transition("swirl", 1.0),
        ]);
        assert!(matches!(
            compile(&t, &layout()),
            Err(EngineError::UnknownTransition(_))
        ));
    }

    #[test]
    fn subtitles_become_files_and_nodes() {
        let mut scene = Scene::new(3.0);
        scene.subtitle = Some(SubtitleBlock {
            cues: vec![Cue {
                begin_time: 0,
                end_time: 2000,
                text: "hello".into(),
            }],
            frame: Default::default(),
            style: Default::default(),
            vertical: false,
            audio: None,
            duration: None,
            font_path: None,
        });
        let t = timeline(vec![scene, Scene::new(2.0)]);
        let (prepared, plan) = compile(&t, &layout()).unwrap();
        assert_eq!(plan.files[0].path, PathBuf::from("/tmp/cache/subtitle-0.srt"));
        assert!(prepared.scenes[0].subtitle.is_none());
        assert!(plan.scenes[0]
            .graph
            .render()
            .contains("subtitles=/tmp/cache/subtitle-0.srt"));
    }

    #[test]
    fn empty_timeline_is_rejected() {
        assert!(compile(&timeline(Vec::new()), &layout()).is_err());
    }
}
