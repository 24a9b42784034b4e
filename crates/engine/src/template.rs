use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::animation::preset;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{fit_filters, ResizeMode};
use crate::graph::num;
use crate::timeline::{
    ms_to_secs, Animation, AudioTrack, Background, Cue, Motion, Node, NodeKind, Point, ProjectSettings, Rect,
    Scene, Shadow, ShowType, SpeedMode, SubtitleBlock, TextStyle, Timeline, TransitionSpec,
};

const START_FADE: f64 = 0.3;
const BACKGROUND_FADE: f64 = 0.5;

/// The JSON document accepted by the render API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub clips: Vec<Value>,
    #[serde(default)]
    pub audio_file_path: Option<String>,
    #[serde(default = "full_volume")]
    pub background_audio_volume: f64,
    #[serde(default = "full_volume")]
    pub clips_audio_volume: f64,
    #[serde(default)]
    pub loop_audio: bool,
    #[serde(default)]
    pub speed: SpeedMode,
    #[serde(default)]
    pub normalize_audio: bool,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub crf: Option<u8>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub debug: bool,
    /// Merged under every clip; clip values win.
    #[serde(default)]
    pub default: Value,
}

fn default_fps() -> u32 {
    25
}

fn full_volume() -> f64 {
    100.0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClipTemplate {
    duration: f64,
    transition: Option<TransitionTemplate>,
    background: Option<String>,
    layers: Vec<Value>,
    /// Defaults merged under every layer of the clip.
    layer: Value,
    subtitle: Option<SubtitleTemplate>,
    audios: Vec<AudioTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
struct TransitionTemplate {
    name: String,
    #[serde(default = "default_transition")]
    duration: f64,
}

fn default_transition() -> f64 {
    0.5
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AudioTemplate {
    path: String,
    start: f64,
    ss: Option<f64>,
    to: Option<f64>,
    volume: Option<f64>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
    #[serde(rename = "loop")]
    looped: bool,
}

impl AudioTemplate {
    fn into_track(self) -> AudioTrack {
        AudioTrack {
            path: self.path,
            start: self.start,
            ss: self.ss,
            to: self.to,
            volume: self.volume,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            looped: self.looped,
        }
    }
}

/// Text styling in the canvas-editor vocabulary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StyleTemplate {
    fill: Option<String>,
    color: Option<String>,
    font_size: Option<f64>,
    font_family: Option<String>,
    background_color: Option<String>,
    stroke: Option<String>,
    stroke_width: Option<f64>,
    line_height: Option<f64>,
    char_spacing: Option<f64>,
    font_weight: Option<String>,
    font_style: Option<String>,
    underline: bool,
    linethrough: bool,
    shadow: Option<ShadowTemplate>,
    scale_x: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ShadowTemplate {
    offset_x: f64,
    offset_y: f64,
    color: Option<String>,
}

impl StyleTemplate {
    fn into_style(self, font_file: Option<String>) -> TextStyle {
        let defaults = TextStyle::default();
        TextStyle {
            font_size: self.font_size.unwrap_or(defaults.font_size),
            color: self.fill.or(self.color).unwrap_or(defaults.color),
            background_color: self.background_color,
            border_width: self.stroke_width,
            border_color: self.stroke,
            font_file,
            font_family: self.font_family,
            line_spacing: self.line_height,
            char_spacing: self.char_spacing,
            shadow: self.shadow.map(|s| Shadow {
                x: s.offset_x,
                y: s.offset_y,
                color: s.color,
            }),
            bold: self.font_weight.as_deref() == Some("bold"),
            italic: self.font_style.as_deref() == Some("italic"),
            underline: self.underline,
            strikeout: self.linethrough,
            scale: self.scale_x,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubtitleTemplate {
    texts: Vec<Cue>,
    object: SubtitleObject,
    audio: Option<String>,
    duration: Option<f64>,
    font_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubtitleObject {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    vertical: bool,
    #[serde(flatten)]
    style: StyleTemplate,
}

#[derive(Debug, Clone, Deserialize)]
struct EffectTemplate {
    #[serde(rename = "type")]
    name: String,
    #[serde(default = "default_effect_time")]
    time: f64,
}

fn default_effect_time() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LayerTemplate {
    #[serde(rename = "type")]
    kind: String,
    left: Option<f64>,
    top: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    origin_x: Option<String>,
    origin_y: Option<String>,
    path: Option<String>,
    resize_mode: Option<ResizeMode>,
    zoom_direction: Option<String>,
    cut_from: Option<f64>,
    cut_to: Option<f64>,
    silent: bool,
    text: Option<String>,
    font_path: Option<String>,
    angle: f64,
    opacity: Option<f64>,
    effect: Option<EffectTemplate>,
    start: Option<f64>,
    end: Option<f64>,
    overlay_background: Option<String>,
    clips: Vec<Value>,
    ss: Option<f64>,
    to: Option<f64>,
    volume: Option<f64>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
    #[serde(rename = "loop")]
    looped: bool,
    #[serde(flatten)]
    style: StyleTemplate,
}

impl LayerTemplate {
    fn centred(&self) -> bool {
        self.origin_x.as_deref() == Some("center") && self.origin_y.as_deref() == Some("center")
    }

    /// Pixel box of the layer. Without a size the box is zero-sized and x/y mark its centre.
    fn frame(&self, stage: (f64, f64)) -> Rect {
        let (sw, sh) = stage;
        let (Some(fw), Some(fh)) = (self.width, self.height) else {
            let x = self.left.map(|l| l * sw).unwrap_or(sw / 2.0);
            let y = self.top.map(|t| t * sh).unwrap_or(sh / 2.0);
            return Rect::new(x, y, 0.0, 0.0);
        };
        let (left, top) = (self.left.unwrap_or(0.0), self.top.unwrap_or(0.0));
        let (x, y) = if self.centred() {
            ((left - fw / 2.0) * sw, (top - fh / 2.0) * sh)
        } else {
            (left * sw, top * sh)
        };
        Rect::new(x, y, fw * sw, fh * sh)
    }
}

/// Merge `over` onto `base`; objects merge key by key, anything else is replaced.
fn merge(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            let mut merged: Map<String, Value> = base.clone();
            for (key, value) in over {
                let next = match merged.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, Value::Null) => base.clone(),
        _ => over.clone(),
    }
}

impl Template {
    pub fn parse(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn settings(&self) -> ProjectSettings {
        let mut settings = ProjectSettings::new(self.width, self.height, self.fps);
        settings.speed = self.speed;
        settings.raw_audio_mix = self.normalize_audio;
        settings.threads = self.threads;
        settings.seed = self.seed;
        settings.debug = self.debug;
        if let Some(crf) = self.crf {
            settings.crf = crf;
        }
        settings
    }

    /// Build the typed timeline. Asset paths are copied as written.
    pub fn to_timeline(&self) -> EngineResult<Timeline> {
        let settings = self.settings();
        let mix_volume = self.clips_audio_volume / 100.0;
        let mut timeline = Timeline::new(settings.clone());
        for clip in &self.clips {
            let clip = merge(&self.default, clip);
            let scene = build_scene(clip, &settings, Some(mix_volume))?;
            timeline.add_scene(scene);
        }
        if let Some(path) = &self.audio_file_path {
            let mut track = AudioTrack::new(path.clone());
            track.volume = Some(self.background_audio_volume / 100.0);
            track.fade_in = Some(BACKGROUND_FADE);
            track.fade_out = Some(BACKGROUND_FADE);
            track.looped = self.loop_audio;
            timeline.audios.push(track);
        }
        debug!(
            scenes = timeline.scenes.len(),
            duration = timeline.scenes_duration_ms(),
            "loaded template"
        );
        Ok(timeline)
    }
}

impl Timeline {
    pub fn from_template_str(json: &str) -> EngineResult<Self> {
        Template::parse(json)?.to_timeline()
    }

    pub fn from_template_value(value: Value) -> EngineResult<Self> {
        let template: Template = serde_json::from_value(value)?;
        template.to_timeline()
    }
}

fn build_scene(clip: Value, settings: &ProjectSettings, mix_volume: Option<f64>) -> EngineResult<Scene> {
    let clip: ClipTemplate = serde_json::from_value(clip)?;
    let stage = (settings.width as f64, settings.height as f64);

    let mut scene = Scene::new(clip.duration);
    scene.transition = clip.transition.map(|t| TransitionSpec {
        name: t.name,
        duration: t.duration,
    });
    scene.background = clip.background.map(|bg| {
        if bg.starts_with('#') {
            Background::Color(bg)
        } else {
            Background::Image(bg)
        }
    });
    scene.audios = clip.audios.into_iter().map(AudioTemplate::into_track).collect();
    scene.audio_volume = mix_volume.filter(|v| (*v - 1.0).abs() > f64::EPSILON);

    let mut composed = 0.0;
    for raw in &clip.layers {
        let layer: LayerTemplate = serde_json::from_value(merge(&clip.layer, raw))?;
        for node in build_layer(layer, settings, stage, clip.duration)? {
            if let NodeKind::Composition { timeline, .. } = &node.kind {
                composed += ms_to_secs(timeline.scenes_duration_ms());
            }
            scene.add_node(node);
        }
    }
    if composed > 0.0 {
        scene.duration = composed;
    }

    if let Some(subtitle) = clip.subtitle.filter(|s| !s.texts.is_empty()) {
        scene.subtitle = Some(subtitle_block(subtitle, stage));
    }
    Ok(scene)
}

fn subtitle_block(subtitle: SubtitleTemplate, stage: (f64, f64)) -> SubtitleBlock {
    let object = subtitle.object;
    let (sw, sh) = stage;
    let frame = Rect::new(
        (object.left - object.width / 2.0) * sw,
        (object.top - object.height / 2.0) * sh,
        object.width * sw,
        object.height * sh,
    );
    SubtitleBlock {
        cues: subtitle.texts,
        frame,
        style: object.style.into_style(None),
        vertical: object.vertical,
        audio: subtitle.audio,
        duration: subtitle.duration,
        font_path: subtitle.font_path,
    }
}

/// One template layer becomes one node, plus a backdrop node when the layer asks for one.
fn build_layer(
    layer: LayerTemplate,
    settings: &ProjectSettings,
    stage: (f64, f64),
    scene_duration: f64,
) -> EngineResult<Vec<Node>> {
    let frame = layer.frame(stage);
    let mut nodes = Vec::new();

    if let Some(backdrop) = &layer.overlay_background {
        let (w, h) = (frame.w.max(0.0), frame.h.max(0.0));
        let mut node = Node::new(
            NodeKind::Image {
                path: backdrop.clone(),
            },
            Rect::new((stage.0 - w) / 2.0, (stage.1 - h) / 2.0, w, h),
        );
        if w > 0.0 && h > 0.0 {
            node.add_pre_filter(format!("scale={}:{}", num(w.round()), num(h.round())));
        }
        nodes.push(node);
    }

    let mut node = match layer.kind.as_str() {
        "image" => {
            let path = require_path(&layer)?;
            image_layer(&layer, path, frame, stage, scene_duration, &mut nodes)
        }
        "video" => {
            let path = require_path(&layer)?;
            let mut node = Node::new(
                NodeKind::Video {
                    path,
                    cut_from: layer.cut_from,
                    cut_to: layer.cut_to,
                    muted: layer.silent,
                },
                frame,
            );
            if let Some(to) = layer.cut_to {
                let start = layer.start.unwrap_or(0.0);
                node.end = Some(start + to - layer.cut_from.unwrap_or(0.0));
            }
            node
        }
        "text" => {
            let text = layer.text.clone().unwrap_or_default();
            let style = layer.style.clone().into_style(layer.font_path.clone());
            Node::new(NodeKind::Text { text, style }, frame)
        }
        "audio" => {
            let path = require_path(&layer)?;
            let track = AudioTrack {
                path,
                start: layer.start.unwrap_or(0.0),
                ss: layer.ss,
                to: layer.to,
                volume: layer.volume,
                fade_in: layer.fade_in,
                fade_out: layer.fade_out,
                looped: layer.looped,
            };
            nodes.push(Node::new(NodeKind::Audio { track }, Rect::default()));
            return Ok(nodes);
        }
        "composition" | "slide-panel" => {
            if layer.clips.is_empty() {
                return Ok(nodes);
            }
            let mut sub = settings.clone();
            sub.width = frame.w.round().max(1.0) as u32;
            sub.height = frame.h.round().max(1.0) as u32;
            let mut timeline = Timeline::new(sub.clone());
            for clip in &layer.clips {
                timeline.add_scene(build_scene(clip.clone(), &sub, None)?);
            }
            Node::new(
                NodeKind::Composition {
                    timeline: Box::new(timeline),
                    output: None,
                },
                frame,
            )
        }
        other => return Err(EngineError::unsupported(other)),
    };

    node.rotation = layer.angle;
    node.opacity = layer.opacity;
    apply_timing(&mut node, &layer, stage);
    nodes.push(node);
    Ok(nodes)
}

fn require_path(layer: &LayerTemplate) -> EngineResult<String> {
    layer
        .path
        .clone()
        .ok_or_else(|| EngineError::missing_asset(format!("{} layer without a path", layer.kind)))
}

/// Image fit plus Ken-Burns motion. A blurred cover-fitted copy is pushed to `extra` for contain-blur.
fn image_layer(
    layer: &LayerTemplate,
    path: String,
    frame: Rect,
    stage: (f64, f64),
    scene_duration: f64,
    extra: &mut Vec<Node>,
) -> Node {
    let sized = frame.w > 0.0 && frame.h > 0.0;
    let mut frame = frame;
    let mut pre_filters = Vec::new();

    if let Some(mode) = layer.resize_mode {
        if !sized || mode == ResizeMode::Stretch {
            frame = Rect::new(0.0, 0.0, stage.0, stage.1);
        }
        if mode == ResizeMode::ContainBlur {
            let mut blur = Node::new(NodeKind::Image { path: path.clone() }, frame);
            for filter in fit_filters(ResizeMode::Cover, frame.w, frame.h) {
                blur.add_pre_filter(filter);
            }
            blur.add_pre_filter("boxblur=25:25");
            blur.opacity = Some(0.5);
            extra.push(blur);
        }
        pre_filters = fit_filters(mode, frame.w, frame.h);
    }

    let mut node = Node::new(NodeKind::Image { path }, frame);
    node.pre_filters = pre_filters;

    if let Some(direction) = layer.zoom_direction.as_deref() {
        let peak = (scene_duration * 2.0 / 6.0).clamp(1.5, 2.0);
        let zoom = |from: f64, to: f64| {
            Animation::new(Motion::Zoom { from, to }, ShowType::In, 0.0, scene_duration)
        };
        match direction {
            "in" => node.animations.push(zoom(1.0, peak)),
            "out" => node.animations.push(zoom(peak, 1.0)),
            "left" | "right" => {
                let travel = frame.w * (peak - 1.0) / 2.0;
                let sign = if direction == "left" { -1.0 } else { 1.0 };
                node.animations.push(zoom(peak, peak));
                node.animations.push(Animation::new(
                    Motion::Move {
                        from: Point {
                            x: frame.x - sign * travel,
                            y: frame.y,
                        },
                        to: Point {
                            x: frame.x + sign * travel,
                            y: frame.y,
                        },
                    },
                    ShowType::In,
                    0.0,
                    scene_duration,
                ));
            }
            _ => {}
        }
    }
    node
}

/// `effect` + `start`/`end` become animation presets and a visibility window.
fn apply_timing(node: &mut Node, layer: &LayerTemplate, stage: (f64, f64)) {
    let start = layer.start.unwrap_or(0.0);
    if layer.start.is_some() {
        node.start = Some(start);
    }
    match &layer.effect {
        Some(effect) => {
            let anims = preset(&effect.name, start, effect.time, node.frame, stage);
            node.animations.extend(anims);
        }
        None if layer.start.is_some() => {
            node.animations
                .extend(preset("fadeIn", start, START_FADE, node.frame, stage));
        }
        None => {}
    }
    if let Some(end) = layer.end {
        node.end = Some(end);
    }
}
