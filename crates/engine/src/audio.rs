use tracing::warn;

use crate::command::{Input, Program};
use crate::error::EngineResult;
use crate::graph::{num, Context};
use crate::timeline::PlacedTrack;

/// Final labels of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Streams {
    pub video: Option<Context>,
    pub audio: Option<Context>,
}

/// Per-track delay/volume/fade chains, one `amix`, and the audio+video join.
///
/// `video` is the final visual label; when it is `None` the mix is joined against input 0.
/// Without tracks `video` is passed through and no audio is produced.
pub fn mix(
    program: &mut Program,
    video: Option<Context>,
    tracks: &[PlacedTrack],
    raw_mix: bool,
) -> EngineResult<Streams> {
    if tracks.is_empty() {
        return Ok(Streams { video, audio: None });
    }

    let mut chains = Vec::with_capacity(tracks.len());
    for placed in tracks {
        let track = &placed.track;
        let range = match track.trim_range() {
            Ok(range) => range,
            Err(err) => {
                warn!(path = %track.path, error = %err, "falling back to the full scene range");
                placed.scene_duration.map(|d| (0.0, d))
            }
        };
        let idx = program.add_input(Input::audio(track.path.clone(), track.looped, range));

        let start_ms = (track.start.max(0.0) * 1000.0).round() as i64;
        let mut ctx = program.graph.apply(
            Context::from_input(idx, 'a'),
            format!("adelay={}|{}", start_ms, start_ms),
            "a",
        );
        if let Some(volume) = track.volume {
            ctx = program.graph.apply(ctx, format!("volume={}", num(volume)), "a");
        }
        if let Some(fade_in) = track.fade_in {
            ctx = program.graph.apply(
                ctx,
                format!("afade=t=in:st={}:d={}", num(track.start), num(fade_in)),
                "a",
            );
        }
        if let Some(fade_out) = track.fade_out {
            let playable = match range {
                Some((ss, to)) if !track.looped => to - ss,
                _ => (program.duration - track.start).max(0.0),
            };
            // afade runs after adelay, so timestamps are on the output timeline: the fade-out ends
            // where the delayed track ends, not at `playable` from zero.
            let end = track.start + playable;
            ctx = program.graph.apply(
                ctx,
                format!(
                    "afade=t=out:st={}:d={}",
                    num((end - fade_out).max(0.0)),
                    num(fade_out)
                ),
                "a",
            );
        }
        chains.push(ctx);
    }

    let count = chains.len();
    let amix = if raw_mix {
        format!("amix=inputs={}:normalize=0", count)
    } else {
        format!("amix=inputs={}", count)
    };
    let mixed = program.graph.join(chains, amix, "mix");

    let video = video.unwrap_or_else(|| Context::from_input(0, 'v'));
    let mut outputs = program
        .graph
        .join_outputs(vec![video, mixed], "concat=n=1:v=1:a=1", &["outv", "outa"])
        .into_iter();
    Ok(Streams {
        video: outputs.next(),
        audio: outputs.next(),
    })
}
