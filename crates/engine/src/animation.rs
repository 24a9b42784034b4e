use crate::graph::num;
use crate::timeline::{Animation, Motion, Node, Point, Rect, ShowType};

/// A clamped linear ramp from `from` to `to` over `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub from: f64,
    pub to: f64,
    pub start: f64,
    pub end: f64,
}

impl Interpolation {
    pub fn new(from: f64, to: f64, start: f64, duration: f64) -> Self {
        Interpolation {
            from,
            to,
            start,
            end: start + duration.max(0.0),
        }
    }

    /// Expression over the time variable `var` (`t` for overlay/drawtext, `T` for geq).
    pub fn expr(&self, var: &str) -> String {
        let (from, to, start, end) = (num(self.from), num(self.to), num(self.start), num(self.end));
        let span = self.end - self.start;
        if span <= 0.0 || self.from == self.to {
            return format!("if(lt({var},{start}),{from},{to})");
        }
        format!(
            "if(lt({var},{start}),{from},if(gt({var},{end}),{to},{from}+({delta})*({var}-{start})/{span}))",
            delta = num(self.to - self.from),
            span = num(span),
        )
    }
}

/// Parameter expressions for one node, one slot per attribute. A later declaration replaces the
/// slot wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedAnimation {
    pub x: Option<Interpolation>,
    pub y: Option<Interpolation>,
    pub alpha: Option<Interpolation>,
    pub scale: Option<Interpolation>,
    pub angle: Option<Interpolation>,
    /// Node box after every move has finished.
    pub frame: Rect,
    /// Alpha after every fade has finished.
    pub opacity: Option<f64>,
}

impl ResolvedAnimation {
    pub fn is_static(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.alpha.is_none()
            && self.scale.is_none()
            && self.angle.is_none()
    }

    /// Whether the rendered size changes over time.
    pub fn resizes(&self) -> bool {
        self.scale.is_some() || self.angle.is_some()
    }
}

pub fn resolve(node: &Node) -> ResolvedAnimation {
    let mut resolved = ResolvedAnimation {
        frame: node.frame,
        opacity: node.opacity,
        ..Default::default()
    };

    for animation in &node.animations {
        let Animation {
            motion,
            start,
            duration,
            ..
        } = animation;
        match motion {
            Motion::Move { from, to } => {
                resolved.x = Some(Interpolation::new(from.x, to.x, *start, *duration));
                resolved.y = Some(Interpolation::new(from.y, to.y, *start, *duration));
                resolved.frame.x = to.x;
                resolved.frame.y = to.y;
            }
            Motion::Fade { from, to } => {
                resolved.alpha = Some(Interpolation::new(*from, *to, *start, *duration));
                resolved.opacity = Some(*to);
            }
            Motion::Zoom { from, to } => {
                resolved.scale = Some(Interpolation::new(*from, *to, *start, *duration));
            }
            Motion::Rotate { from, to } => {
                resolved.angle = Some(Interpolation::new(*from, *to, *start, *duration));
            }
            Motion::Effect { .. } => {}
        }
    }
    resolved
}

/// Expand a named effect into animation declarations. Unknown names only open a visibility window.
pub fn preset(name: &str, start: f64, duration: f64, frame: Rect, stage: (f64, f64)) -> Vec<Animation> {
    let (stage_w, stage_h) = stage;
    let at = Point {
        x: frame.x,
        y: frame.y,
    };
    let inward = |motion| Animation::new(motion, ShowType::In, start, duration);
    let outward = |motion| Animation::new(motion, ShowType::Out, start, duration);
    let fade_in = || inward(Motion::Fade { from: 0.0, to: 1.0 });
    let fade_out = || outward(Motion::Fade { from: 1.0, to: 0.0 });
    let shifted = |x: f64, y: f64| Point { x, y };

    match name {
        "fadeIn" => vec![fade_in()],
        "fadeOut" => vec![fade_out()],
        "zoomIn" => vec![inward(Motion::Zoom { from: 0.5, to: 1.0 }), fade_in()],
        "zoomOut" => vec![outward(Motion::Zoom { from: 1.0, to: 0.5 }), fade_out()],
        "zoomingIn" => vec![inward(Motion::Zoom { from: 1.0, to: 1.2 })],
        "zoomingOut" => vec![inward(Motion::Zoom { from: 1.2, to: 1.0 })],
        "moveInLeft" => vec![inward(Motion::Move {
            from: shifted(-frame.w, at.y),
            to: at,
        })],
        "moveInRight" => vec![inward(Motion::Move {
            from: shifted(stage_w, at.y),
            to: at,
        })],
        "moveInUp" => vec![inward(Motion::Move {
            from: shifted(at.x, stage_h),
            to: at,
        })],
        "moveInDown" => vec![inward(Motion::Move {
            from: shifted(at.x, -frame.h),
            to: at,
        })],
        "moveOutLeft" => vec![outward(Motion::Move {
            from: at,
            to: shifted(-frame.w, at.y),
        })],
        "moveOutRight" => vec![outward(Motion::Move {
            from: at,
            to: shifted(stage_w, at.y),
        })],
        "moveOutUp" => vec![outward(Motion::Move {
            from: at,
            to: shifted(at.x, -frame.h),
        })],
        "moveOutDown" => vec![outward(Motion::Move {
            from: at,
            to: shifted(at.x, stage_h),
        })],
        "rotateIn" => vec![
            inward(Motion::Rotate {
                from: -180.0,
                to: 0.0,
            }),
            fade_in(),
        ],
        "rotateOut" => vec![
            outward(Motion::Rotate {
                from: 0.0,
                to: 180.0,
            }),
            fade_out(),
        ],
        other => {
            let show = if other.contains("Out") {
                ShowType::Out
            } else {
                ShowType::In
            };
            vec![Animation::new(
                Motion::Effect {
                    name: other.to_string(),
                },
                show,
                start,
                duration,
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::NodeKind;

    fn image(frame: Rect) -> Node {
        Node::new(
            NodeKind::Image {
                path: "a.png".into(),
            },
            frame,
        )
    }

    #[test]
    fn interpolation_is_clamped_outside_window() {
        let expr = Interpolation::new(0.0, 100.0, 1.0, 2.0).expr("t");
        assert_eq!(expr, "if(lt(t,1),0,if(gt(t,3),100,0+(100)*(t-1)/2))");
    }

    #[test]
    fn constant_interpolation_collapses() {
        let expr = Interpolation::new(5.0, 5.0, 1.0, 2.0).expr("t");
        assert_eq!(expr, "if(lt(t,1),5,5)");
    }

    #[test]
    fn last_declaration_wins_per_attribute() {
        let node = image(Rect::new(0.0, 0.0, 10.0, 10.0))
            .with_animation(Animation::new(
                Motion::Move {
                    from: Point { x: 0.0, y: 0.0 },
                    to: Point { x: 50.0, y: 50.0 },
                },
                ShowType::In,
                0.0,
                2.0,
            ))
            .with_animation(Animation::new(
                Motion::Fade { from: 0.0, to: 1.0 },
                ShowType::In,
                0.0,
                1.0,
            ))
            .with_animation(Animation::new(
                Motion::Move {
                    from: Point { x: 10.0, y: 20.0 },
                    to: Point { x: 30.0, y: 40.0 },
                },
                ShowType::In,
                1.0,
                2.0,
            ));

        let resolved = resolve(&node);
        assert_eq!(resolved.x, Some(Interpolation::new(10.0, 30.0, 1.0, 2.0)));
        assert_eq!(resolved.y, Some(Interpolation::new(20.0, 40.0, 1.0, 2.0)));
        // fade is a different attribute and survives
        assert_eq!(resolved.alpha, Some(Interpolation::new(0.0, 1.0, 0.0, 1.0)));
        assert_eq!((resolved.frame.x, resolved.frame.y), (30.0, 40.0));
        assert_eq!(resolved.opacity, Some(1.0));
    }

    #[test]
    fn presets_expand_to_declarations() {
        let frame = Rect::new(100.0, 50.0, 200.0, 100.0);
        let anims = preset("moveInLeft", 0.5, 1.0, frame, (1280.0, 720.0));
        assert_eq!(anims.len(), 1);
        assert_eq!(
            anims[0].motion,
            Motion::Move {
                from: Point { x: -200.0, y: 50.0 },
                to: Point { x: 100.0, y: 50.0 },
            }
        );

        let out = preset("fadeOut", 4.0, 1.0, frame, (1280.0, 720.0));
        assert_eq!(out[0].show, ShowType::Out);

        let unknown = preset("sparkleOut", 1.0, 1.0, frame, (1280.0, 720.0));
        assert!(matches!(unknown[0].motion, Motion::Effect { .. }));
        assert_eq!(unknown[0].show, ShowType::Out);
    }
}
