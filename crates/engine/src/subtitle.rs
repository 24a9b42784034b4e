use crate::geometry::{px_to_points, stage_dpi};
use crate::graph::num;
use crate::timeline::{AudioTrack, Cue, Node, NodeKind, Rect, Scene, TextStyle};

const NARRATION_FADE: f64 = 0.5;

/// `HH:MM:SS,mmm`
pub fn srt_timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let (hours, rest) = (ms / 3_600_000, ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

pub fn render_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(cue.begin_time),
            srt_timestamp(cue.end_time),
            cue.text
        ));
    }
    out
}

/// `#rrggbb` or a handful of named colours to ASS `&H00BBGGRR&`. Anything else passes through.
pub fn ass_color(color: &str) -> String {
    let hex = match color.to_ascii_lowercase().as_str() {
        "black" => "#000000".to_string(),
        "white" => "#ffffff".to_string(),
        "red" => "#ff0000".to_string(),
        "green" => "#00ff00".to_string(),
        "blue" => "#0000ff".to_string(),
        "yellow" => "#ffff00".to_string(),
        _ => color.to_string(),
    };
    let digits = hex.trim_start_matches('#');
    if !hex.starts_with('#') || digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return color.to_string();
    }
    let (r, g, b) = (&digits[0..2], &digits[2..4], &digits[4..6]);
    format!("&H00{}{}{}&", b, g, r).to_uppercase()
}

/// `force_style` value for a subtitle burned into a `stage`-sized frame. Pixel sizes are
/// converted to points through the stage DPI estimate.
pub fn force_style(style: &TextStyle, frame: Rect, vertical: bool, stage: (u32, u32)) -> String {
    let dpi = stage_dpi(stage.0, stage.1);
    let pt = |px: f64| num(px_to_points(px, dpi));
    let flag = |on: bool| if on { "-1" } else { "0" };

    let (angle, alignment, margin_l, margin_v) = if vertical {
        (90, 7, pt(frame.x), "0".to_string())
    } else {
        (0, 2, "0".to_string(), pt(stage.1 as f64 - (frame.y + frame.h)))
    };

    let mut fields: Vec<(&str, String)> = Vec::new();
    if let Some(spacing) = style.char_spacing {
        fields.push(("Spacing", pt(spacing / 1000.0 * style.font_size)));
    }
    fields.push(("Angle", angle.to_string()));
    if let Some(scale) = style.scale {
        fields.push(("ScaleX", num(scale)));
        fields.push(("ScaleY", num(scale)));
    }
    fields.push(("Bold", flag(style.bold).to_string()));
    fields.push(("Italic", flag(style.italic).to_string()));
    fields.push(("Underline", flag(style.underline).to_string()));
    fields.push(("Strikeout", flag(style.strikeout).to_string()));
    fields.push(("BorderStyle", "1".to_string()));
    let shadow = style
        .shadow
        .as_ref()
        .map(|s| if s.x != 0.0 { s.x } else { s.y })
        .unwrap_or(0.0);
    fields.push(("Shadow", pt(shadow)));
    fields.push(("Alignment", alignment.to_string()));
    if let Some(border) = &style.border_color {
        fields.push(("OutlineColour", ass_color(border)));
    }
    fields.push(("Outline", pt(style.border_width.unwrap_or(0.0))));
    fields.push(("PrimaryColour", ass_color(&style.color)));
    let back = style
        .shadow
        .as_ref()
        .and_then(|s| s.color.as_ref())
        .or(style.background_color.as_ref());
    if let Some(back) = back {
        fields.push(("BackColour", ass_color(back)));
    }
    if let Some(family) = &style.font_family {
        fields.push(("Fontname", family.clone()));
    }
    fields.push(("Fontsize", pt(style.font_size)));
    fields.push(("MarginL", margin_l));
    fields.push(("MarginV", margin_v));

    fields
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a path for use as a filter option value.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "/").replace(':', "\\:").replace('\'', "\\'")
}

pub fn subtitles_filter(path: &str, style: &TextStyle, frame: Rect, vertical: bool, stage: (u32, u32)) -> String {
    let mut filter = format!(
        "subtitles={}:force_style='{}'",
        escape_filter_path(path),
        force_style(style, frame, vertical, stage)
    );
    if let Some(font) = &style.font_file {
        let dir = std::path::Path::new(font)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        if !dir.is_empty() {
            filter.push_str(&format!(":fontsdir={}", escape_filter_path(&dir)));
        }
    }
    filter
}

/// Turn a scene's subtitle block into a subtitle node reading `srt_path`, plus a narration track.
/// Returns the SRT text to write at `srt_path`; `None` when the scene has no block.
pub fn attach(scene: &mut Scene, srt_path: &str) -> Option<String> {
    let block = scene.subtitle.take()?;
    if let Some(duration) = block.duration {
        scene.duration = duration;
    }
    if let Some(audio) = &block.audio {
        let mut narration = AudioTrack::new(audio.clone());
        narration.fade_in = Some(NARRATION_FADE);
        narration.fade_out = Some(NARRATION_FADE);
        scene.audios.push(narration);
    }

    let mut style = block.style.clone();
    if style.font_file.is_none() {
        style.font_file = block.font_path.clone();
    }
    scene.add_node(Node::new(
        NodeKind::Subtitle {
            path: srt_path.to_string(),
            style,
            vertical: block.vertical,
        },
        block.frame,
    ));
    Some(render_srt(&block.cues))
}
