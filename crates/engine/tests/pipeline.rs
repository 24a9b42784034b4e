use std::path::PathBuf;

use engine::animation::resolve;
use engine::geometry::rotated_bounding_box;
use engine::{
    compile, Animation, AudioTrack, EngineError, Finish, Layout, Motion, Node, NodeKind, Point,
    ProjectSettings, Rect, Scene, ShowType, SpeedMode, Strategy, Timeline,
};
use serde_json::json;

fn layout() -> Layout {
    Layout::new("/work/cache", "/work/out.mp4")
}

fn timeline(scenes: Vec<Scene>) -> Timeline {
    let mut timeline = Timeline::new(ProjectSettings::new(1280, 720, 25));
    for scene in scenes {
        timeline.add_scene(scene);
    }
    timeline
}

fn final_program(timeline: &Timeline) -> engine::Program {
    let (_, plan) = compile(timeline, &layout()).unwrap();
    match plan.finish {
        Finish::Program(program) => program,
        Finish::Relocate { .. } => panic!("expected a final program"),
    }
}

#[test]
fn two_faded_scenes_overlap_by_one_second() {
    let t = timeline(vec![
        Scene::new(5.0).with_transition("fade", 1.0),
        Scene::new(4.0).with_transition("fade", 1.0),
    ]);
    let (_, plan) = compile(&t, &layout()).unwrap();
    assert_eq!(plan.strategy, Strategy::Crossfade);
    assert_eq!(plan.duration, 8.0);

    let Finish::Program(program) = &plan.finish else {
        panic!("expected a final program");
    };
    let concats: Vec<_> = program
        .graph
        .steps()
        .iter()
        .filter(|s| s.filter.starts_with("concat=n="))
        .collect();
    assert_eq!(concats.len(), 1);
    assert_eq!(concats[0].filter, "concat=n=3");
    assert_eq!(concats[0].inputs.len(), 3);
}

#[test]
fn single_fast_scene_is_relocated() {
    let mut t = timeline(vec![Scene::new(3.0)]);
    t.settings.speed = SpeedMode::High;
    let (_, plan) = compile(&t, &layout()).unwrap();
    assert_eq!(plan.strategy, Strategy::FastPath);
    assert!(plan.final_command(&t).is_none());
    assert!(matches!(
        plan.finish,
        Finish::Relocate { ref to, .. } if *to == PathBuf::from("/work/out.mp4")
    ));
}

#[test]
fn three_tracks_are_delayed_and_mixed_once() {
    let mut t = timeline(vec![Scene::new(6.0), Scene::new(4.0)]);
    for (path, start) in [("a.mp3", 0.0), ("b.mp3", 2.0), ("c.mp3", 4.0)] {
        let mut track = AudioTrack::new(path);
        track.start = start;
        t.audios.push(track);
    }
    let program = final_program(&t);
    let filters: Vec<&str> = program.graph.steps().iter().map(|s| s.filter.as_str()).collect();

    for delay in ["adelay=0|0", "adelay=2000|2000", "adelay=4000|4000"] {
        assert_eq!(filters.iter().filter(|f| **f == delay).count(), 1, "{}", delay);
    }
    let mixes: Vec<_> = filters.iter().filter(|f| f.starts_with("amix")).collect();
    assert_eq!(mixes, vec![&"amix=inputs=3"]);
}

#[test]
fn rotated_box_grows_and_recentres() {
    let frame = Rect::new(10.0, 10.0, 100.0, 50.0);
    let bbox = rotated_bounding_box(frame, 45.0);
    let side = 150.0 / 2f64.sqrt();
    assert!(bbox.w > frame.w && bbox.h > frame.h);
    assert!((bbox.w - side).abs() < 1e-9);
    assert!((bbox.h - side).abs() < 1e-9);
    assert!((bbox.x - (10.0 - (side - 100.0) / 2.0)).abs() < 1e-9);
    assert!((bbox.y - (10.0 - (side - 50.0) / 2.0)).abs() < 1e-9);

    let mut node = Node::new(
        NodeKind::Image {
            path: "logo.png".into(),
        },
        frame,
    );
    node.rotation = 45.0;
    let mut scene = Scene::new(3.0);
    scene.add_node(node);
    let (_, plan) = compile(&timeline(vec![scene]), &layout()).unwrap();
    let graph = plan.scenes[0].graph.render();
    assert!(graph.contains("rotate=45*PI/180:ow=106:oh=106:c=none"), "{}", graph);
}

#[test]
fn later_animations_win_per_attribute() {
    let mut node = Node::new(
        NodeKind::Image {
            path: "a.png".into(),
        },
        Rect::new(0.0, 0.0, 50.0, 50.0),
    );
    let moved = |x: f64| Motion::Move {
        from: Point { x: 0.0, y: 0.0 },
        to: Point { x, y: 0.0 },
    };
    node.animations = vec![
        Animation::new(moved(100.0), ShowType::In, 0.0, 1.0),
        Animation::new(Motion::Fade { from: 0.0, to: 1.0 }, ShowType::In, 0.0, 1.0),
        Animation::new(moved(300.0), ShowType::In, 1.0, 2.0),
    ];
    let resolved = resolve(&node);
    let x = resolved.x.unwrap();
    assert_eq!((x.to, x.start, x.end), (300.0, 1.0, 3.0));
    assert_eq!(resolved.frame.x, 300.0);
    assert!(resolved.alpha.is_some());
}

#[test]
fn every_program_is_a_valid_graph() {
    let template = json!({
        "width": 1280,
        "height": 720,
        "audioFilePath": "bgm.mp3",
        "clips": [
            {"duration": 4, "background": "#202020", "transition": {"name": "wipeleft", "duration": 0.5},
             "layers": [
                {"type": "image", "path": "a.png", "left": 0.1, "top": 0.1, "width": 0.3, "height": 0.3,
                 "effect": {"type": "zoomIn", "time": 1}, "start": 0.5, "angle": 15},
                {"type": "text", "text": "Hello: world", "left": 0.5, "top": 0.8, "width": 0.4,
                 "height": 0.1, "originX": "center", "originY": "center", "start": 1},
                {"type": "video", "path": "clip.mp4", "left": 0.6, "top": 0.1, "width": 0.3,
                 "height": 0.3, "cutFrom": 1, "cutTo": 3, "effect": {"type": "rotateIn", "time": 1}}
             ],
             "subtitle": {"texts": [{"begin_time": 0, "end_time": 2000, "text": "hi"}],
                          "object": {"left": 0.5, "top": 0.9, "width": 0.8, "height": 0.1}}},
            {"duration": 3, "transition": {"name": "fade", "duration": 0.5},
             "audios": [{"path": "fx.mp3", "start": 1, "fadeOut": 0.5}],
             "layers": [{"type": "audio", "path": "voice.mp3", "start": 0.5}]}
        ]
    });
    let t = Timeline::from_template_value(template).unwrap();
    let (_, plan) = compile(&t, &layout()).unwrap();
    assert_eq!(plan.strategy, Strategy::Crossfade);
    for program in &plan.scenes {
        program.validate().unwrap();
    }
    let Finish::Program(program) = &plan.finish else {
        panic!("expected a final program");
    };
    program.validate().unwrap();
    assert!(program.audio.is_some());
    assert_eq!(plan.duration, 6.5);
}

#[test]
fn spliced_duration_matches_for_many_shapes() {
    let shapes: &[&[(f64, f64)]] = &[
        &[(2.0, 0.5), (2.0, 0.5)],
        &[(3.3, 0.7), (2.5, 0.4), (4.1, 1.2)],
        &[(1.0, 0.9), (1.0, 0.9), (1.0, 0.9), (1.0, 0.9)],
        &[(10.0, 0.25), (0.75, 0.75), (6.2, 0.1)],
    ];
    for shape in shapes {
        let scenes = shape
            .iter()
            .map(|(d, tr)| Scene::new(*d).with_transition("fade", *tr))
            .collect();
        let t = timeline(scenes);
        let expected_ms: i64 = shape.iter().map(|(d, _)| (d * 1000.0).round() as i64).sum::<i64>()
            - shape
                .iter()
                .skip(1)
                .map(|(_, tr)| (tr * 1000.0).round() as i64)
                .sum::<i64>();
        let (_, plan) = compile(&t, &layout()).unwrap();
        assert_eq!((plan.duration * 1000.0).round() as i64, expected_ms, "{:?}", shape);
    }
}

#[test]
fn compilation_is_deterministic() {
    let template = json!({
        "width": 640,
        "height": 360,
        "seed": 42,
        "clips": [
            {"duration": 2, "transition": {"name": "random", "duration": 0.5},
             "layers": [{"type": "text", "text": "one", "width": 0.5, "height": 0.2, "left": 0, "top": 0}]},
            {"duration": 2, "transition": {"name": "random", "duration": 0.5}},
            {"duration": 2, "transition": {"name": "random", "duration": 0.5}}
        ]
    });
    let t = Timeline::from_template_value(template).unwrap();
    let (_, first) = compile(&t, &layout()).unwrap();
    let (_, second) = compile(&t, &layout()).unwrap();

    assert_eq!(first.final_command(&t), second.final_command(&t));
    for (a, b) in first.scenes.iter().zip(&second.scenes) {
        assert_eq!(a.graph.canonical(), b.graph.canonical());
    }
}

#[test]
fn transition_longer_than_scene_is_rejected() {
    let t = timeline(vec![
        Scene::new(5.0).with_transition("fade", 1.0),
        Scene::new(0.5).with_transition("fade", 1.0),
    ]);
    assert!(matches!(
        compile(&t, &layout()),
        Err(EngineError::InvalidTransitionDuration { .. })
    ));
}

#[test]
fn unknown_layer_kind_fails_to_load() {
    let err = Timeline::from_template_value(json!({
        "width": 640,
        "height": 360,
        "clips": [{"duration": 1, "layers": [{"type": "hologram"}]}]
    }))
    .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedNodeKind { .. }));
}
