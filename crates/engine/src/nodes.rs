use crate::animation::{resolve, ResolvedAnimation};
use crate::command::{Input, Program};
use crate::error::{EngineError, EngineResult};
use crate::geometry::rotated_bounding_box;
use crate::graph::{num, Context};
use crate::subtitle::subtitles_filter;
use crate::timeline::{Node, NodeKind, Rect, TextStyle};

/// What a node is composited onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Scene duration in seconds.
    pub duration: f64,
}

impl Stage {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Quote an option value when it would otherwise break the filter chain.
fn opt(value: String) -> String {
    if value.contains(',') {
        format!("'{}'", value)
    } else {
        value
    }
}

/// Backslash-escape `value` for one tokenizer pass that stops at any of `specials`.
fn escape_level(value: &str, specials: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' || specials.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// An unquoted option value that survives both the option parser and the filtergraph parser.
pub fn escape_option(value: &str) -> String {
    escape_level(&escape_level(value, ":"), "[],;")
}

/// drawtext `text=` value: expansion escapes for `%`, then both parser levels.
pub fn escape_text(text: &str) -> String {
    escape_option(&escape_level(text, "%"))
}

/// Append `node`'s filter chain to `program` and return the context holding the composited scene.
/// Audio nodes and empty text leave the context untouched.
pub fn build_chain(program: &mut Program, ctx: Context, node: &Node, stage: &Stage) -> EngineResult<Context> {
    match &node.kind {
        NodeKind::Audio { .. } => Ok(ctx),
        NodeKind::Text { text, .. } if text.trim().is_empty() => Ok(ctx),
        NodeKind::Subtitle {
            path,
            style,
            vertical,
        } => {
            let filter = subtitles_filter(path, style, node.frame, *vertical, stage.size());
            Ok(program.graph.apply(ctx, filter, "sub"))
        }
        NodeKind::Text { text, style } => {
            let resolved = resolve(node);
            let (w, h) = text_canvas(node, stage);
            let canvas = program.graph.source(
                format!(
                    "color=c=black@0:s={}x{}:d={}:r={}",
                    w,
                    h,
                    num(stage.duration),
                    stage.fps
                ),
                "txt",
            );
            let canvas = program.graph.apply(canvas, "format=rgba", "txt");
            let drawn = program
                .graph
                .apply(canvas, drawtext(text, style, node, &resolved), "txt");
            Ok(composite(program, ctx, drawn, node, &resolved, stage, true))
        }
        NodeKind::Image { path } => {
            let idx = program.add_input(Input::looped_image(path.clone(), stage.duration, stage.fps));
            let resolved = resolve(node);
            Ok(composite(
                program,
                ctx,
                Context::from_input(idx, 'v'),
                node,
                &resolved,
                stage,
                false,
            ))
        }
        NodeKind::Video {
            path,
            cut_from,
            cut_to,
            ..
        } => {
            let idx = program.add_input(Input::clip(path.clone(), *cut_from, *cut_to));
            let resolved = resolve(node);
            let source = delay(program, Context::from_input(idx, 'v'), node);
            Ok(composite(program, ctx, source, node, &resolved, stage, false))
        }
        NodeKind::Composition { output, .. } => {
            let path = output.as_ref().ok_or_else(|| {
                EngineError::missing_asset("nested composition has not been rendered")
            })?;
            let idx = program.add_input(Input::file(path.clone()));
            let resolved = resolve(node);
            let source = delay(program, Context::from_input(idx, 'v'), node);
            Ok(composite(program, ctx, source, node, &resolved, stage, false))
        }
    }
}

fn text_canvas(node: &Node, stage: &Stage) -> (u32, u32) {
    let w = if node.frame.w > 0.0 {
        node.frame.w.round() as u32
    } else {
        stage.width
    };
    let h = if node.frame.h > 0.0 {
        node.frame.h.round() as u32
    } else {
        stage.height
    };
    (w.max(1), h.max(1))
}

/// Shift a clip so it starts playing when the node appears.
fn delay(program: &mut Program, source: Context, node: &Node) -> Context {
    match node.start {
        Some(start) if start > 0.0 => {
            program
                .graph
                .apply(source, format!("setpts=PTS-STARTPTS+{}/TB", num(start)), "v")
        }
        _ => source,
    }
}

fn drawtext(text: &str, style: &TextStyle, node: &Node, resolved: &ResolvedAnimation) -> String {
    let mut options: Vec<(&str, String)> = Vec::new();
    if let Some(spacing) = style.line_spacing {
        options.push(("line_spacing", num(spacing)));
    }
    if let Some(color) = &style.border_color {
        options.push(("bordercolor", color.clone()));
    }
    if let Some(width) = style.border_width {
        options.push(("borderw", num(width)));
    }
    options.push(("fontcolor", style.color.clone()));
    if let Some(font) = &style.font_file {
        options.push(("fontfile", escape_option(font)));
    }
    options.push(("fontsize", num(style.font_size)));
    if let Some(color) = &style.background_color {
        options.push(("box", "1".to_string()));
        options.push(("boxcolor", color.clone()));
    }
    if let Some(shadow) = &style.shadow {
        if let Some(color) = &shadow.color {
            options.push(("shadowcolor", color.clone()));
        }
        options.push(("shadowx", num(shadow.x)));
        options.push(("shadowy", num(shadow.y)));
    }
    options.push(("text", escape_text(text)));
    if let Some(alpha) = &resolved.alpha {
        options.push(("alpha", alpha.expr("t")));
    } else if let Some(opacity) = node.opacity {
        options.push(("alpha", num(opacity)));
    }
    options.push(("x", "0".to_string()));
    options.push(("y", "0".to_string()));

    let body = options
        .into_iter()
        .map(|(key, value)| match key {
            "text" | "fontfile" => format!("{}={}", key, value),
            _ => format!("{}={}", key, opt(value)),
        })
        .collect::<Vec<_>>()
        .join(":");
    format!("drawtext={}", body)
}

/// pre-filters, animation filters, custom filters, then the overlay onto `scene`.
fn composite(
    program: &mut Program,
    scene: Context,
    source: Context,
    node: &Node,
    resolved: &ResolvedAnimation,
    stage: &Stage,
    alpha_in_source: bool,
) -> Context {
    let graph = &mut program.graph;
    let frame = resolved.frame;
    let mut ctx = source;
    let mut rgba = alpha_in_source;

    // 1. geometry
    let is_media = !matches!(node.kind, NodeKind::Text { .. });
    if node.pre_filters.is_empty() && is_media && node.frame.w > 0.0 && node.frame.h > 0.0 {
        ctx = graph.apply(
            ctx,
            format!("scale={}:{}", num(node.frame.w.round()), num(node.frame.h.round())),
            "v",
        );
    }
    for filter in &node.pre_filters {
        ctx = graph.apply(ctx, filter.clone(), "v");
    }
    if !alpha_in_source && resolved.alpha.is_none() {
        if let Some(opacity) = node.opacity.filter(|o| *o < 1.0) {
            ctx = graph.apply(ctx, "format=rgba", "v");
            ctx = graph.apply(ctx, format!("colorchannelmixer=aa={}", num(opacity)), "v");
            rgba = true;
        }
    }
    let rotated = if node.rotation != 0.0 && resolved.angle.is_none() {
        let bbox = rotated_bounding_box(frame, node.rotation);
        if !rgba {
            ctx = graph.apply(ctx, "format=rgba", "v");
            rgba = true;
        }
        ctx = graph.apply(
            ctx,
            format!(
                "rotate={}*PI/180:ow={}:oh={}:c=none",
                num(node.rotation),
                num(bbox.w.round()),
                num(bbox.h.round())
            ),
            "v",
        );
        Some(bbox)
    } else {
        None
    };

    // 2. animation
    if let Some(scale) = &resolved.scale {
        let factor = scale.expr("t");
        ctx = graph.apply(
            ctx,
            format!("scale=w='iw*({})':h='ih*({})':eval=frame", factor, factor),
            "v",
        );
    }
    if let Some(angle) = &resolved.angle {
        if !rgba {
            ctx = graph.apply(ctx, "format=rgba", "v");
            rgba = true;
        }
        ctx = graph.apply(
            ctx,
            format!(
                "rotate='({})*PI/180':ow='hypot(iw,ih)':oh=ow:c=none",
                angle.expr("t")
            ),
            "v",
        );
    }
    if let (Some(alpha), false) = (&resolved.alpha, alpha_in_source) {
        if !rgba {
            ctx = graph.apply(ctx, "format=rgba", "v");
        }
        ctx = graph.apply(
            ctx,
            format!(
                "geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='alpha(X,Y)*({})'",
                alpha.expr("T")
            ),
            "v",
        );
    }

    // 3. custom
    for filter in &node.filters {
        ctx = graph.apply(ctx, filter.clone(), "v");
    }

    // 4. position
    let (x, y) = overlay_position(frame, resolved, rotated);
    let (appear, disappear) = node.visible_window(stage.duration);
    let overlay = format!(
        "overlay=x={}:y={}:enable='between(t,{},{})'",
        opt(x),
        opt(y),
        num(appear),
        num(disappear)
    );
    graph.join(vec![scene, ctx], overlay, "ov")
}

/// Overlay coordinates. Moving nodes use the resolved expressions; nodes whose rendered size
/// changes are anchored on their box centre through the overlay's own `w`/`h`.
fn overlay_position(
    frame: Rect,
    resolved: &ResolvedAnimation,
    rotated: Option<Rect>,
) -> (String, String) {
    let base_x = resolved
        .x
        .map(|i| format!("({})", i.expr("t")))
        .unwrap_or_else(|| num(frame.x));
    let base_y = resolved
        .y
        .map(|i| format!("({})", i.expr("t")))
        .unwrap_or_else(|| num(frame.y));
    let dynamic = resolved.x.is_some();

    if resolved.resizes() {
        return (
            format!("{}+{}-w/2", base_x, num(frame.w / 2.0)),
            format!("{}+{}-h/2", base_y, num(frame.h / 2.0)),
        );
    }
    match rotated {
        Some(bbox) if dynamic => (
            format!("{}-{}", base_x, num((bbox.w - frame.w) / 2.0)),
            format!("{}-{}", base_y, num((bbox.h - frame.h) / 2.0)),
        ),
        Some(bbox) => (num(bbox.x), num(bbox.y)),
        None => (base_x, base_y),
    }
}
