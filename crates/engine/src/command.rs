use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::EngineResult;
use crate::graph::{is_input_specifier, num, FilterGraph};
use crate::timeline::ProjectSettings;

/// One `-i` source together with the input options that precede it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Input {
    pub options: Vec<String>,
    pub source: String,
}

impl Input {
    pub fn file(path: impl Into<String>) -> Self {
        Input {
            options: Vec::new(),
            source: path.into(),
        }
    }

    /// A still image repeated for `duration` seconds.
    pub fn looped_image(path: impl Into<String>, duration: f64, fps: u32) -> Self {
        Input {
            options: vec![
                "-loop".into(),
                "1".into(),
                "-framerate".into(),
                fps.to_string(),
                "-t".into(),
                num(duration),
            ],
            source: path.into(),
        }
    }

    pub fn clip(path: impl Into<String>, from: Option<f64>, to: Option<f64>) -> Self {
        let mut options = Vec::new();
        if let Some(from) = from.filter(|f| *f > 0.0) {
            options.push("-ss".into());
            options.push(num(from));
        }
        if let Some(to) = to {
            options.push("-to".into());
            options.push(num(to));
        }
        Input {
            options,
            source: path.into(),
        }
    }

    pub fn lavfi(graph: impl Into<String>) -> Self {
        Input {
            options: vec!["-f".into(), "lavfi".into()],
            source: graph.into(),
        }
    }

    pub fn concat_manifest(path: impl Into<String>) -> Self {
        Input {
            options: vec!["-f".into(), "concat".into(), "-safe".into(), "0".into()],
            source: path.into(),
        }
    }

    pub fn audio(path: impl Into<String>, looped: bool, range: Option<(f64, f64)>) -> Self {
        let mut options = Vec::new();
        if looped {
            options.push("-stream_loop".into());
            options.push("-1".into());
        }
        if let Some((ss, to)) = range {
            options.push("-ss".into());
            options.push(num(ss));
            options.push("-to".into());
            options.push(num(to));
        }
        Input {
            options,
            source: path.into(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = self.options.clone();
        args.push("-i".into());
        args.push(self.source.clone());
        args
    }
}

/// One invocation of the external tool: ordered inputs, a filter graph over them, and what to map out.
#[derive(Debug, Clone)]
pub struct Program {
    pub inputs: Vec<Input>,
    pub graph: FilterGraph,
    /// Final video label, or an input specifier such as `0:v` when no graph is needed.
    pub video: Option<String>,
    pub audio: Option<String>,
    pub duration: f64,
    pub output: PathBuf,
}

impl Program {
    pub fn new(output: impl Into<PathBuf>, duration: f64) -> Self {
        Program {
            inputs: Vec::new(),
            graph: FilterGraph::new(),
            video: None,
            audio: None,
            duration,
            output: output.into(),
        }
    }

    /// Append an input and return its positional index.
    pub fn add_input(&mut self, input: Input) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    pub fn filter_complex(&self) -> Option<String> {
        if self.graph.is_empty() {
            None
        } else {
            Some(self.graph.render())
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.graph.validate(self.inputs.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    pub output_path: PathBuf,
}

fn map_arg(label: &str) -> String {
    if is_input_specifier(label) {
        label.to_string()
    } else {
        format!("[{}]", label)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Full argument list for one program, default output options included.
pub fn render_command(program: &Program, settings: &ProjectSettings) -> RenderCommand {
    let mut args: Vec<String> = vec!["-hide_banner".into()];
    if let Some(threads) = settings.threads {
        args.push("-threads".into());
        args.push(threads.to_string());
    }
    for input in &program.inputs {
        args.extend(input.args());
    }

    if let Some(graph) = program.filter_complex() {
        args.push("-filter_complex".into());
        args.push(graph);
    }
    if let Some(video) = &program.video {
        args.push("-map".into());
        args.push(map_arg(video));
    }
    if let Some(audio) = &program.audio {
        args.push("-map".into());
        args.push(map_arg(audio));
    }

    args.extend(
        [
            "-map_metadata",
            "-1",
            "-map_chapters",
            "-1",
            "-c:v",
            "libx264",
            "-profile:v",
            "main",
            "-preset",
            "medium",
            "-crf",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(settings.crf.to_string());
    args.extend(
        ["-movflags", "faststart", "-pix_fmt", "yuv420p", "-r"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(settings.fps.to_string());

    if program.audio.is_some() {
        args.push("-c:a".into());
        args.push("aac".into());
    } else {
        args.push("-an".into());
    }
    args.push("-t".into());
    args.push(num(program.duration));
    args.extend(
        ["-progress", "pipe:1", "-nostats", "-y"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(path_arg(&program.output));

    debug!(output = %program.output.display(), args = ?args, "assembled ffmpeg arguments");

    RenderCommand {
        ffmpeg_args: args,
        output_path: program.output.clone(),
    }
}
