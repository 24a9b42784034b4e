use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::graph::{num, Context, FilterGraph};
use crate::timeline::{ms_to_secs, secs_to_ms, TransitionSpec};

/// Transition names understood by the `xfade` filter.
pub const CATALOGUE: &[&str] = &[
    "fade",
    "fadeblack",
    "fadewhite",
    "fadegrays",
    "dissolve",
    "distance",
    "pixelize",
    "radial",
    "wipeleft",
    "wiperight",
    "wipeup",
    "wipedown",
    "wipetl",
    "wipetr",
    "wipebl",
    "wipebr",
    "slideleft",
    "slideright",
    "slideup",
    "slidedown",
    "smoothleft",
    "smoothright",
    "smoothup",
    "smoothdown",
    "circlecrop",
    "rectcrop",
    "circleopen",
    "circleclose",
    "vertopen",
    "vertclose",
    "horzopen",
    "horzclose",
    "diagtl",
    "diagtr",
    "diagbl",
    "diagbr",
    "hlslice",
    "hrslice",
    "vuslice",
    "vdslice",
    "hblur",
    "squeezeh",
    "squeezev",
    "zoomin",
];

pub const RANDOM: &str = "random";

/// Picks concrete transitions for "random" descriptors. Seeded, so a compile is reproducible.
pub struct TransitionPicker {
    rng: StdRng,
}

impl TransitionPicker {
    pub fn new(seed: u64) -> Self {
        TransitionPicker {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn resolve(&mut self, name: &str) -> EngineResult<&'static str> {
        if name.eq_ignore_ascii_case(RANDOM) {
            let index = self.rng.random_range(0..CATALOGUE.len());
            return Ok(CATALOGUE[index]);
        }
        lookup(name)
    }
}

pub fn lookup(name: &str) -> EngineResult<&'static str> {
    CATALOGUE
        .iter()
        .find(|entry| entry.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| EngineError::UnknownTransition(name.to_string()))
}

/// One scene's stream going into the splicer. `transition` is the scene's own descriptor,
/// already resolved to a catalogue entry.
#[derive(Debug, Clone)]
pub struct SpliceInput {
    pub input: Context,
    pub duration_ms: i64,
    pub transition: &'static str,
    pub transition_ms: i64,
}

impl SpliceInput {
    pub fn new(input: Context, duration: f64, transition: &'static str, spec: &TransitionSpec) -> Self {
        SpliceInput {
            input,
            duration_ms: secs_to_ms(duration),
            transition,
            transition_ms: secs_to_ms(spec.duration),
        }
    }
}

/// Σ durations minus every transition but the first scene's.
pub fn spliced_duration_ms(inputs: &[SpliceInput]) -> i64 {
    let scenes: i64 = inputs.iter().map(|s| s.duration_ms).sum();
    let overlaps: i64 = inputs.iter().skip(1).map(|s| s.transition_ms).sum();
    scenes - overlaps
}

/// Join every scene with the transition carried by the later scene of each pair.
///
/// Each scene is split in two: a body `[0, cut)` and a tail `[cut, duration)` where `cut` leaves
/// exactly the next boundary's transition length in the tail (the last scene uses its own).
/// Boundary `i` crossfades `tail(i-1)` into `body(i)`; the result is concatenated as
/// `body(0), trans(1), .., trans(n-1), tail(n-1)`.
///
/// Returns the label of the joined stream and its duration in milliseconds.
pub fn splice(graph: &mut FilterGraph, inputs: Vec<SpliceInput>) -> EngineResult<(Context, i64)> {
    let n = inputs.len();
    if n < 2 {
        return Err(EngineError::validation(
            "a crossfade needs at least two scenes",
        ));
    }
    let total = spliced_duration_ms(&inputs);

    let mut bodies = Vec::with_capacity(n);
    let mut tails = Vec::with_capacity(n);
    for (i, scene) in inputs.iter().enumerate() {
        if scene.duration_ms < scene.transition_ms {
            return Err(EngineError::InvalidTransitionDuration {
                scene: i,
                duration: ms_to_secs(scene.duration_ms),
                transition: ms_to_secs(scene.transition_ms),
            });
        }
        let outgoing = inputs
            .get(i + 1)
            .map(|next| next.transition_ms)
            .unwrap_or(scene.transition_ms);
        let cut = scene.duration_ms - outgoing;
        // A zero-length body cannot be trimmed.
        if cut <= 0 {
            return Err(EngineError::InvalidTransitionDuration {
                scene: i,
                duration: ms_to_secs(scene.duration_ms),
                transition: ms_to_secs(outgoing),
            });
        }

        let (cut_s, end_s) = (num(ms_to_secs(cut)), num(ms_to_secs(scene.duration_ms)));
        let mut copies = graph.split(scene.input.clone(), 2).into_iter();
        let (Some(a), Some(b)) = (copies.next(), copies.next()) else {
            return Err(EngineError::invalid_graph("split produced fewer than two outputs"));
        };
        bodies.push(graph.apply(a, format!("trim=0:{}", cut_s), "trim"));
        let tail = graph.apply(b, format!("trim={}:{}", cut_s, end_s), "trim");
        tails.push(graph.apply(tail, "setpts=PTS-STARTPTS", "trim"));
    }

    let mut bodies = bodies.into_iter();
    let mut tails = tails.into_iter();
    let mut segments = Vec::with_capacity(n + 1);
    if let Some(first) = bodies.next() {
        segments.push(first);
    }
    for (scene, body) in inputs.iter().skip(1).zip(bodies) {
        let Some(tail) = tails.next() else {
            return Err(EngineError::invalid_graph("missing tail segment"));
        };
        segments.push(graph.join(
            vec![tail, body],
            format!(
                "xfade=transition={}:duration={}:offset=0",
                scene.transition,
                num(ms_to_secs(scene.transition_ms))
            ),
            "trans",
        ));
    }
    let Some(last_tail) = tails.next() else {
        return Err(EngineError::invalid_graph("missing final tail segment"));
    };
    segments.push(last_tail);

    let count = segments.len();
    let joined = graph.join(segments, format!("concat=n={}", count), "gl");
    debug!(scenes = n, segments = count, total_ms = total, "spliced scenes with transitions");
    Ok((joined, total))
}
