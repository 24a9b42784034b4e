use serde::{Deserialize, Serialize};

use crate::graph::num;
use crate::timeline::Rect;

/// Axis-aligned box of `rect` after rotating it by `degrees` about its top-left corner,
/// recentred on the original centre.
pub fn rotated_bounding_box(rect: Rect, degrees: f64) -> Rect {
    if degrees % 360.0 == 0.0 {
        return rect;
    }
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let corners = [(0.0, 0.0), (rect.w, 0.0), (rect.w, rect.h), (0.0, rect.h)];

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (cx, cy) in corners {
        let rx = cx * cos - cy * sin;
        let ry = cx * sin + cy * cos;
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }

    let w = max_x - min_x;
    let h = max_y - min_y;
    Rect {
        x: rect.x - (w - rect.w) / 2.0,
        y: rect.y - (h - rect.h) / 2.0,
        w,
        h,
    }
}

/// Rough screen DPI derived from the stage diagonal.
pub fn stage_dpi(width: u32, height: u32) -> f64 {
    let (w, h) = (width as f64, height as f64);
    (w * w + h * h).sqrt() / 4.8
}

pub fn px_to_points(px: f64, dpi: f64) -> f64 {
    if dpi <= 0.0 {
        return px;
    }
    px / dpi * 72.0
}

/// How a media element is fitted into its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    #[default]
    Contain,
    Cover,
    Stretch,
    ContainBlur,
}

/// Scale/crop/pad filters that fit a stream into a `w`x`h` box. One filter per entry.
pub fn fit_filters(mode: ResizeMode, w: f64, h: f64) -> Vec<String> {
    let (w, h) = (num(w.round()), num(h.round()));
    match mode {
        ResizeMode::Stretch => vec![format!("scale={}:{}", w, h)],
        ResizeMode::Cover => vec![
            format!("scale={}:{}:force_original_aspect_ratio=increase", w, h),
            format!("crop={}:{}", w, h),
        ],
        // contain-blur pads with transparency like contain; the blurred backdrop is left to the scene background.
        ResizeMode::Contain | ResizeMode::ContainBlur => vec![
            format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h),
            "format=rgba".to_string(),
            format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black@0", w, h),
        ],
    }
}
