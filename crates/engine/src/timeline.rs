use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const MS_PER_SECOND: i64 = 1000;

/// Seconds to whole milliseconds. All duration arithmetic happens in ms so sums stay exact.
pub fn secs_to_ms(secs: f64) -> i64 {
    (secs * MS_PER_SECOND as f64).round() as i64
}

pub fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / MS_PER_SECOND as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u8,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub speed: SpeedMode,
    /// Mix audio without amix's output-level normalization.
    #[serde(default)]
    pub raw_audio_mix: bool,
    /// Seed for resolving "random" transitions.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Keep cache directories and partial outputs after a render.
    #[serde(default)]
    pub debug: bool,
}

fn default_fps() -> u32 {
    25
}

fn default_crf() -> u8 {
    23
}

impl ProjectSettings {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        ProjectSettings {
            width,
            height,
            fps,
            crf: default_crf(),
            threads: None,
            speed: SpeedMode::Normal,
            raw_audio_mix: false,
            seed: None,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowType {
    #[default]
    In,
    Out,
}

/// What an animation drives. `from`/`to` units depend on the variant:
/// pixels for `Move`, 0..1 alpha for `Fade`, scale factor for `Zoom`, degrees for `Rotate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Motion {
    Move { from: Point, to: Point },
    Fade { from: f64, to: f64 },
    Zoom { from: f64, to: f64 },
    Rotate { from: f64, to: f64 },
    /// Visibility window only.
    Effect {
        #[serde(default)]
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    #[serde(flatten)]
    pub motion: Motion,
    #[serde(default)]
    pub show: ShowType,
    #[serde(default)]
    pub start: f64,
    pub duration: f64,
}

impl Animation {
    pub fn new(motion: Motion, show: ShowType, start: f64, duration: f64) -> Self {
        Animation {
            motion,
            show,
            start,
            duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub border_width: Option<f64>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub font_file: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub line_spacing: Option<f64>,
    #[serde(default)]
    pub char_spacing: Option<f64>,
    #[serde(default)]
    pub shadow: Option<Shadow>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikeout: bool,
    #[serde(default)]
    pub scale: Option<f64>,
}

fn default_font_size() -> f64 {
    24.0
}

fn default_text_color() -> String {
    "black".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle {
            font_size: default_font_size(),
            color: default_text_color(),
            background_color: None,
            border_width: None,
            border_color: None,
            font_file: None,
            font_family: None,
            line_spacing: None,
            char_spacing: None,
            shadow: None,
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            scale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: String,
    /// Offset in seconds; scene-relative until the assembler makes it absolute.
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub ss: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub fade_in: Option<f64>,
    #[serde(default)]
    pub fade_out: Option<f64>,
    #[serde(default, rename = "loop")]
    pub looped: bool,
}

impl AudioTrack {
    pub fn new(path: impl Into<String>) -> Self {
        AudioTrack {
            path: path.into(),
            start: 0.0,
            ss: None,
            to: None,
            volume: None,
            fade_in: None,
            fade_out: None,
            looped: false,
        }
    }

    /// Both trim bounds, when set and consistent.
    pub fn trim_range(&self) -> EngineResult<Option<(f64, f64)>> {
        match (self.ss, self.to) {
            (Some(ss), Some(to)) if ss >= 0.0 && ss < to => Ok(Some((ss, to))),
            (Some(ss), Some(to)) => Err(EngineError::MalformedAudioRange { ss, to }),
            (Some(ss), None) => Err(EngineError::MalformedAudioRange { ss, to: -1.0 }),
            (None, Some(to)) => Err(EngineError::MalformedAudioRange { ss: -1.0, to }),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub name: String,
    #[serde(default = "default_transition_duration")]
    pub duration: f64,
}

fn default_transition_duration() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Background {
    Color(String),
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Milliseconds.
    pub begin_time: i64,
    pub end_time: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleBlock {
    pub cues: Vec<Cue>,
    #[serde(default)]
    pub frame: Rect,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default)]
    pub vertical: bool,
    /// Narration track played under the cues.
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub font_path: Option<String>,
}

/// One element on the stage. Which filters it contributes is decided by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Image {
        path: String,
    },
    Video {
        path: String,
        #[serde(default)]
        cut_from: Option<f64>,
        #[serde(default)]
        cut_to: Option<f64>,
        #[serde(default)]
        muted: bool,
    },
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    Subtitle {
        path: String,
        #[serde(default)]
        style: TextStyle,
        #[serde(default)]
        vertical: bool,
    },
    Audio {
        track: AudioTrack,
    },
    /// A nested timeline rendered as its own unit; `output` is filled in once it has been rendered.
    Composition {
        timeline: Box<Timeline>,
        #[serde(default)]
        output: Option<String>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Image { .. } => "image",
            NodeKind::Video { .. } => "video",
            NodeKind::Text { .. } => "text",
            NodeKind::Subtitle { .. } => "subtitle",
            NodeKind::Audio { .. } => "audio",
            NodeKind::Composition { .. } => "composition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub frame: Rect,
    /// Degrees, clockwise.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub opacity: Option<f64>,
    /// Scene-relative appearance time; defaults to the earliest animation start.
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub pre_filters: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub animations: Vec<Animation>,
}

impl Node {
    pub fn new(kind: NodeKind, frame: Rect) -> Self {
        Node {
            kind,
            frame,
            rotation: 0.0,
            opacity: None,
            start: None,
            end: None,
            pre_filters: Vec::new(),
            filters: Vec::new(),
            animations: Vec::new(),
        }
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animations.push(animation);
        self
    }

    pub fn add_pre_filter(&mut self, filter: impl Into<String>) {
        self.pre_filters.push(filter.into());
    }

    /// Give a zero-sized node its measured size. The frame's x/y are read as the node's centre.
    pub fn settle_size(&mut self, w: f64, h: f64) {
        if self.frame.w > 0.0 && self.frame.h > 0.0 {
            return;
        }
        self.frame = Rect {
            x: self.frame.x - w / 2.0,
            y: self.frame.y - h / 2.0,
            w,
            h,
        };
    }

    /// Window during which the node is composited, clamped to the scene.
    pub fn visible_window(&self, scene_duration: f64) -> (f64, f64) {
        let appear = self.start.unwrap_or_else(|| {
            self.animations
                .iter()
                .map(|a| a.start)
                .fold(f64::INFINITY, f64::min)
        });
        let appear = if appear.is_finite() { appear.max(0.0) } else { 0.0 };

        let disappear = self.end.unwrap_or_else(|| {
            self.animations
                .iter()
                .filter(|a| a.show == ShowType::Out)
                .map(Animation::end)
                .fold(scene_duration, f64::min)
        });
        (appear, disappear.min(scene_duration).max(appear))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub duration: f64,
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(default)]
    pub transition: Option<TransitionSpec>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub subtitle: Option<SubtitleBlock>,
    #[serde(default)]
    pub audios: Vec<AudioTrack>,
    /// Gain applied on top of every track the scene owns.
    #[serde(default)]
    pub audio_volume: Option<f64>,
}

impl Scene {
    pub fn new(duration: f64) -> Self {
        Scene {
            duration,
            background: None,
            transition: None,
            nodes: Vec::new(),
            subtitle: None,
            audios: Vec::new(),
            audio_volume: None,
        }
    }

    pub fn with_transition(mut self, name: impl Into<String>, duration: f64) -> Self {
        self.transition = Some(TransitionSpec {
            name: name.into(),
            duration,
        });
        self
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn duration_ms(&self) -> i64 {
        secs_to_ms(self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub settings: ProjectSettings,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Tracks placed on the absolute timeline (background music).
    #[serde(default)]
    pub audios: Vec<AudioTrack>,
}

impl Timeline {
    pub fn new(settings: ProjectSettings) -> Self {
        Timeline {
            settings,
            scenes: Vec::new(),
            audios: Vec::new(),
        }
    }

    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    /// Sum of scene durations, before transitions overlap them.
    pub fn scenes_duration_ms(&self) -> i64 {
        self.scenes.iter().map(Scene::duration_ms).sum()
    }

    /// Frame estimate used to turn processed-frame counts into a fraction.
    pub fn total_frames(&self) -> u64 {
        let secs = ms_to_secs(self.scenes_duration_ms());
        (secs * self.settings.fps as f64).round().max(0.0) as u64
    }

    /// Start offset of every scene on the plain (non-overlapping) timeline.
    pub fn scene_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.scenes.len());
        let mut acc = 0;
        for scene in &self.scenes {
            offsets.push(ms_to_secs(acc));
            acc += scene.duration_ms();
        }
        offsets
    }

    /// Mutable references to every external file the timeline reads, nested compositions excluded.
    pub fn asset_paths_mut(&mut self) -> Vec<&mut String> {
        let mut paths: Vec<&mut String> = self.audios.iter_mut().map(|a| &mut a.path).collect();
        for scene in &mut self.scenes {
            if let Some(Background::Image(path)) = &mut scene.background {
                paths.push(path);
            }
            for track in &mut scene.audios {
                paths.push(&mut track.path);
            }
            if let Some(block) = &mut scene.subtitle {
                if let Some(audio) = &mut block.audio {
                    paths.push(audio);
                }
                if let Some(font) = &mut block.font_path {
                    paths.push(font);
                }
            }
            for node in &mut scene.nodes {
                match &mut node.kind {
                    NodeKind::Image { path } | NodeKind::Video { path, .. } => paths.push(path),
                    NodeKind::Audio { track } => paths.push(&mut track.path),
                    NodeKind::Text { style, .. } | NodeKind::Subtitle { style, .. } => {
                        if let Some(font) = &mut style.font_file {
                            paths.push(font);
                        }
                    }
                    NodeKind::Composition { .. } => {}
                }
            }
        }
        paths
    }

    /// Scene start offsets once each boundary's transition overlaps the previous scene.
    pub fn crossfade_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.scenes.len());
        let mut acc = 0;
        for (i, scene) in self.scenes.iter().enumerate() {
            if i > 0 {
                acc -= scene
                    .transition
                    .as_ref()
                    .map(|t| secs_to_ms(t.duration))
                    .unwrap_or(0);
            }
            offsets.push(ms_to_secs(acc.max(0)));
            acc += scene.duration_ms();
        }
        offsets
    }

    /// Every audio source on the absolute timeline: global tracks, scene tracks, audio nodes,
    /// and the sound of non-muted video nodes, with scene `i` starting at `offsets[i]`.
    /// Scene tracks without a trim range get `[0, scene.duration]`.
    pub fn collect_audio_tracks(&self, offsets: &[f64]) -> Vec<PlacedTrack> {
        let mut tracks: Vec<PlacedTrack> = self
            .audios
            .iter()
            .cloned()
            .map(|track| PlacedTrack {
                track,
                scene_duration: None,
            })
            .collect();

        for (scene, offset) in self.scenes.iter().zip(offsets.iter().copied()) {
            let scene_tracks = scene.audios.iter().cloned().chain(scene.nodes.iter().filter_map(
                |node| match &node.kind {
                    NodeKind::Audio { track } => Some(track.clone()),
                    NodeKind::Video {
                        path,
                        cut_from,
                        cut_to,
                        muted: false,
                    } => {
                        let mut track = AudioTrack::new(path.clone());
                        track.start = node.start.unwrap_or(0.0);
                        let from = cut_from.unwrap_or(0.0);
                        track.ss = Some(from);
                        track.to = Some(cut_to.unwrap_or(from + scene.duration));
                        Some(track)
                    }
                    _ => None,
                },
            ));
            for mut track in scene_tracks {
                track.start += offset;
                if let Some(gain) = scene.audio_volume {
                    track.volume = Some(track.volume.unwrap_or(1.0) * gain);
                }
                if track.ss.is_none() && track.to.is_none() {
                    track.ss = Some(0.0);
                    track.to = Some(scene.duration);
                }
                tracks.push(PlacedTrack {
                    track,
                    scene_duration: Some(scene.duration),
                });
            }
        }
        tracks
    }
}

/// An audio track positioned on the absolute timeline, with the length of the scene that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTrack {
    pub track: AudioTrack,
    pub scene_duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProjectSettings {
        ProjectSettings::new(1280, 720, 25)
    }

    #[test]
    fn timelines_compare_by_value() {
        let mut a = Timeline::new(settings());
        a.add_scene(Scene::new(2.0));
        let mut b = a.clone();
        assert_eq!(a, b);
        b.settings.crf = a.settings.crf + 1;
        assert_ne!(a, b);
    }

    #[test]
    fn scene_offsets_accumulate_in_ms() {
        let mut timeline = Timeline::new(settings());
        timeline.add_scene(Scene::new(1.1));
        timeline.add_scene(Scene::new(2.2));
        timeline.add_scene(Scene::new(3.3));
        assert_eq!(timeline.scene_offsets(), vec![0.0, 1.1, 3.3]);
        assert_eq!(timeline.scenes_duration_ms(), 6600);
        assert_eq!(timeline.total_frames(), 165);
    }

    #[test]
    fn crossfade_offsets_subtract_transitions() {
        let mut timeline = Timeline::new(settings());
        timeline.add_scene(Scene::new(5.0).with_transition("fade", 1.0));
        timeline.add_scene(Scene::new(4.0).with_transition("fade", 1.0));
        timeline.add_scene(Scene::new(3.0).with_transition("wipeleft", 0.5));
        assert_eq!(timeline.crossfade_offsets(), vec![0.0, 4.0, 7.5]);
    }

    #[test]
    fn trim_range_rejects_inverted_bounds() {
        let mut track = AudioTrack::new("a.mp3");
        assert!(track.trim_range().unwrap().is_none());
        track.ss = Some(4.0);
        track.to = Some(2.0);
        assert!(matches!(
            track.trim_range(),
            Err(EngineError::MalformedAudioRange { .. })
        ));
        track.to = Some(6.0);
        assert_eq!(track.trim_range().unwrap(), Some((4.0, 6.0)));
    }

    #[test]
    fn scene_audio_is_offset_and_default_filled() {
        let mut timeline = Timeline::new(settings());
        timeline.add_scene(Scene::new(5.0));
        let mut second = Scene::new(4.0);
        let mut voice = AudioTrack::new("voice.mp3");
        voice.start = 1.0;
        second.audios.push(voice);
        timeline.add_scene(second);

        let tracks = timeline.collect_audio_tracks(&timeline.scene_offsets());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track.start, 6.0);
        assert_eq!(tracks[0].scene_duration, Some(4.0));
        assert_eq!(
            (tracks[0].track.ss, tracks[0].track.to),
            (Some(0.0), Some(4.0))
        );
    }

    #[test]
    fn unmuted_video_contributes_audio() {
        let mut timeline = Timeline::new(settings());
        let mut scene = Scene::new(3.0);
        scene.add_node(Node::new(
            NodeKind::Video {
                path: "clip.mp4".into(),
                cut_from: Some(1.0),
                cut_to: Some(3.0),
                muted: false,
            },
            Rect::new(0.0, 0.0, 640.0, 360.0),
        ));
        scene.add_node(Node::new(
            NodeKind::Video {
                path: "silent.mp4".into(),
                cut_from: None,
                cut_to: None,
                muted: true,
            },
            Rect::default(),
        ));
        timeline.add_scene(scene);

        let tracks = timeline.collect_audio_tracks(&timeline.scene_offsets());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track.path, "clip.mp4");
        assert_eq!(
            (tracks[0].track.ss, tracks[0].track.to),
            (Some(1.0), Some(3.0))
        );
    }

    #[test]
    fn scene_gain_scales_owned_tracks() {
        let mut timeline = Timeline::new(settings());
        let mut scene = Scene::new(2.0);
        scene.audio_volume = Some(0.5);
        let mut track = AudioTrack::new("fx.mp3");
        track.volume = Some(0.8);
        scene.audios.push(track);
        scene.audios.push(AudioTrack::new("plain.mp3"));
        timeline.add_scene(scene);
        timeline.audios.push(AudioTrack::new("bgm.mp3"));

        let tracks = timeline.collect_audio_tracks(&timeline.scene_offsets());
        let volumes: Vec<_> = tracks.iter().map(|t| t.track.volume).collect();
        assert_eq!(volumes, vec![None, Some(0.4), Some(0.5)]);
    }

    #[test]
    fn asset_paths_cover_media_and_audio() {
        let mut timeline = Timeline::new(settings());
        timeline.audios.push(AudioTrack::new("bgm.mp3"));
        let mut scene = Scene::new(2.0);
        scene.background = Some(Background::Image("bg.png".into()));
        scene.add_node(Node::new(
            NodeKind::Image {
                path: "a.png".into(),
            },
            Rect::default(),
        ));
        scene.add_node(Node::new(
            NodeKind::Text {
                text: "hi".into(),
                style: TextStyle::default(),
            },
            Rect::default(),
        ));
        timeline.add_scene(scene);

        for path in timeline.asset_paths_mut() {
            *path = format!("/cache/{}", path);
        }
        assert_eq!(timeline.audios[0].path, "/cache/bgm.mp3");
        assert_eq!(
            timeline.scenes[0].background,
            Some(Background::Image("/cache/bg.png".into()))
        );
        assert!(matches!(
            &timeline.scenes[0].nodes[0].kind,
            NodeKind::Image { path } if path == "/cache/a.png"
        ));
    }

    #[test]
    fn settle_size_centres_on_anchor() {
        let mut node = Node::new(
            NodeKind::Image {
                path: "a.png".into(),
            },
            Rect::new(640.0, 360.0, 0.0, 0.0),
        );
        node.settle_size(200.0, 100.0);
        assert_eq!(node.frame, Rect::new(540.0, 310.0, 200.0, 100.0));
        node.settle_size(10.0, 10.0);
        assert_eq!(node.frame.w, 200.0);
    }

    #[test]
    fn visible_window_defaults_to_animations() {
        let node = Node::new(
            NodeKind::Image {
                path: "a.png".into(),
            },
            Rect::default(),
        )
        .with_animation(Animation::new(
            Motion::Fade { from: 0.0, to: 1.0 },
            ShowType::In,
            1.0,
            0.5,
        ))
        .with_animation(Animation::new(
            Motion::Fade { from: 1.0, to: 0.0 },
            ShowType::Out,
            3.0,
            1.0,
        ));
        assert_eq!(node.visible_window(10.0), (1.0, 4.0));
    }

    #[test]
    fn node_kind_deserializes_from_type_tag() {
        let node: Node = serde_json::from_value(serde_json::json!({
            "type": "text",
            "text": "hello",
            "frame": {"x": 1.0, "y": 2.0, "w": 3.0, "h": 4.0},
        }))
        .unwrap();
        assert_eq!(node.kind.name(), "text");
        assert_eq!(node.frame.h, 4.0);
    }
}
