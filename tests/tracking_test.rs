mod common;

use common::{always_one, keys, observe, proximity, world};
use ndarray::Array2;
use tagtrack_rs::integration::DetectionBuilder;
use tagtrack_rs::tracker::{AssignmentStrategy, CameraAdjacency, LinkKind, TrackState};
use tagtrack_rs::{Detection, DetectionStore, Track, TrackingError, Walker, WalkerConfig};

fn at(key: u64, frame: u64, cam: u16, x: f64) -> Detection {
    DetectionBuilder::new(key)
        .frame(frame)
        .camera(cam)
        .position(x, 0.0)
        .orientation(0.0)
        .id_bits(1, 4)
        .build()
}

#[test]
fn test_basic_tracking() {
    let store = DetectionStore::from_detections(world(3, 10)).unwrap();
    let config = WalkerConfig::new(1, 20.0, 0.01).unwrap();
    let tracks = Walker::new(&store, &proximity, config)
        .unwrap()
        .calc_tracks()
        .unwrap();

    assert_eq!(tracks.len(), 3);
    for (object, track) in tracks.iter().enumerate() {
        assert_eq!(track.id, object as u64);
        assert_eq!(track.len(), 10);
        assert_eq!(track.state, TrackState::Closed);
        assert!(track.links().iter().all(|l| *l == LinkKind::Temporal { gap: 0 }));
        assert_eq!(track.first().key, common::key(0, object as u64));
    }
}

#[test]
fn test_determinism() {
    // dense crowd with many competing candidates
    let mut detections = Vec::new();
    let mut state = 12345u64;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };
    for frame in 0..25u64 {
        for object in 0..30u64 {
            if next() < 0.1 {
                continue;
            }
            detections.push(at(frame * 1000 + object, frame, 0, next() * 200.0));
        }
    }
    let store = DetectionStore::from_detections(detections).unwrap();

    for strategy in [AssignmentStrategy::Greedy, AssignmentStrategy::Optimal] {
        let config = WalkerConfig::new(2, 15.0, 0.05)
            .unwrap()
            .with_assignment(strategy);
        let walker = Walker::new(&store, &proximity, config).unwrap();
        let first = walker.calc_tracks().unwrap();
        let second = walker.calc_tracks().unwrap();
        assert_eq!(first, second, "{strategy:?}");

        let total: usize = first.iter().map(Track::len).sum();
        assert_eq!(total, store.len(), "every detection ends up in exactly one track");
    }
}

#[test]
fn test_zero_radius_yields_singletons() {
    // identical positions in every frame, perfect scores
    let detections: Vec<_> = (0..6).map(|f| at(f, f, 0, 5.0)).collect();
    let store = DetectionStore::from_detections(detections).unwrap();

    let config = WalkerConfig::new(2, 0.0, 0.5).unwrap();
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 6);
    assert!(tracks.iter().all(|t| t.len() == 1));
}

#[test]
fn test_radius_is_a_hard_filter() {
    let store = DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), at(2, 1, 0, 30.0)]).unwrap();
    let config = WalkerConfig::new(1, 29.9, 0.5).unwrap();
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
}

#[test]
fn test_assignment_prefers_diagonal() {
    let store = DetectionStore::from_detections(vec![
        at(1, 0, 0, 0.0),
        at(2, 0, 0, 10.0),
        at(3, 1, 0, 1.0),
        at(4, 1, 0, 11.0),
    ])
    .unwrap();
    let table = |tracks: &[&Track], detections: &[&Detection]| {
        Array2::from_shape_fn((tracks.len(), detections.len()), |(i, j)| {
            match (tracks[i].last().key, detections[j].key) {
                (1, 3) => 0.9,
                (1, 4) => 0.1,
                (2, 3) => 0.2,
                (2, 4) => 0.8,
                _ => 0.0,
            }
        })
    };

    for strategy in [AssignmentStrategy::Greedy, AssignmentStrategy::Optimal] {
        let config = WalkerConfig::new(1, 100.0, 0.05)
            .unwrap()
            .with_assignment(strategy);
        let tracks = Walker::new(&store, &table, config)
            .unwrap()
            .calc_tracks()
            .unwrap();
        assert_eq!(tracks.len(), 2, "{strategy:?}");
        assert_eq!(keys(&tracks[0]), vec![1, 3]);
        assert_eq!(keys(&tracks[1]), vec![2, 4]);
    }
}

#[test]
fn test_gap_is_bridged_within_frame_diff() {
    // object 0 is not detected in frame 1
    let detections: Vec<_> = world(2, 4)
        .into_iter()
        .filter(|d| d.key != common::key(1, 0))
        .collect();
    let store = DetectionStore::from_detections(detections).unwrap();

    let config = WalkerConfig::new(2, 20.0, 0.01).unwrap();
    let tracks = Walker::new(&store, &proximity, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
    let bridged = &tracks[0];
    assert_eq!(bridged.len(), 3);
    assert_eq!(
        bridged.links(),
        &[LinkKind::Temporal { gap: 1 }, LinkKind::Temporal { gap: 0 }]
    );

    // without tolerance the same object splits in two
    let config = WalkerConfig::new(1, 20.0, 0.01).unwrap();
    let tracks = Walker::new(&store, &proximity, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 3);
}

#[test]
fn test_shorter_gap_links_first() {
    // track [2] ends one frame before det 3, track [1] two frames before;
    // both are equally close and score the same
    let store = DetectionStore::from_detections(vec![
        at(1, 0, 0, 0.0),
        at(2, 1, 0, 100.0),
        at(3, 2, 0, 50.0),
    ])
    .unwrap();
    let config = WalkerConfig::new(2, 60.0, 0.5).unwrap();
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(keys(&tracks[0]), vec![1]);
    assert_eq!(keys(&tracks[1]), vec![2, 3]);
}

#[test]
fn test_track_closes_after_tolerance() {
    let store = DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), at(2, 3, 0, 0.0)]).unwrap();
    let config = WalkerConfig::new(2, 10.0, 0.5).unwrap();
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
}

#[test]
fn test_camera_gap_requires_adjacency() {
    let store =
        DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), at(2, 1, 2, 0.5)]).unwrap();

    // cameras differ and camera-gap linking is off
    let config = WalkerConfig::new(1, 10.0, 0.5).unwrap();
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);

    // enabled, but camera 2 is not adjacent to camera 0
    let adjacency = CameraAdjacency::from_pairs([(0, 1)]).unwrap();
    let config = WalkerConfig::new(1, 10.0, 0.5)
        .unwrap()
        .with_camera_gap(adjacency);
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);

    let adjacency = CameraAdjacency::from_pairs([(2, 0)]).unwrap();
    let config = WalkerConfig::new(1, 10.0, 0.5)
        .unwrap()
        .with_camera_gap(adjacency);
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].links(), &[LinkKind::CameraGap { gap: 0 }]);
}

#[test]
fn test_camera_gap_bridges_skipped_frame() {
    // object leaves camera 0 after frame 0 and is next seen by camera 1 in frame 2
    let store =
        DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), at(2, 2, 1, 0.5), at(3, 3, 1, 1.0)])
            .unwrap();
    let adjacency = CameraAdjacency::from_pairs([(0, 1)]).unwrap();

    let config = WalkerConfig::new(2, 10.0, 0.5)
        .unwrap()
        .with_camera_gap(adjacency.clone());
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(keys(&tracks[0]), vec![1, 2, 3]);
    assert_eq!(
        tracks[0].links(),
        &[LinkKind::CameraGap { gap: 1 }, LinkKind::Temporal { gap: 0 }]
    );

    // one frame of tolerance cannot span the skipped frame
    let config = WalkerConfig::new(1, 10.0, 0.5)
        .unwrap()
        .with_camera_gap(adjacency);
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(keys(&tracks[1]), vec![2, 3]);
}

#[test]
fn test_negative_scores_link_under_both_strategies() {
    let store = DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), at(2, 1, 0, 1.0)]).unwrap();
    let negative = |t: &[&Track], d: &[&Detection]| Array2::from_elem((t.len(), d.len()), -0.5);
    for strategy in [AssignmentStrategy::Greedy, AssignmentStrategy::Optimal] {
        let config = WalkerConfig::new(1, 10.0, -1.0)
            .unwrap()
            .with_assignment(strategy);
        let tracks = Walker::new(&store, &negative, config)
            .unwrap()
            .calc_tracks()
            .unwrap();
        assert_eq!(tracks.len(), 1, "{strategy:?}");
    }
}

#[test]
fn test_same_camera_preferred_over_camera_gap() {
    let store = DetectionStore::from_detections(vec![
        at(1, 0, 0, 0.0),
        at(2, 1, 0, 1.0),
        at(3, 1, 1, 0.5),
    ])
    .unwrap();
    let adjacency = CameraAdjacency::from_pairs([(0, 1)]).unwrap();
    let config = WalkerConfig::new(1, 10.0, 0.5)
        .unwrap()
        .with_camera_gap(adjacency);
    let tracks = Walker::new(&store, &always_one, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(keys(&tracks[0]), vec![1, 2]);
    assert_eq!(keys(&tracks[1]), vec![3]);
}

#[test]
fn test_threshold_rejects_weak_links() {
    let store = DetectionStore::from_detections(vec![observe(0, 0), observe(1, 0)]).unwrap();
    let weak = |t: &[&Track], d: &[&Detection]| Array2::from_elem((t.len(), d.len()), 0.3);
    let config = WalkerConfig::new(1, 50.0, 0.3).unwrap();
    let tracks = Walker::new(&store, &weak, config)
        .unwrap()
        .calc_tracks()
        .unwrap();
    assert_eq!(tracks.len(), 2);
}

#[test]
fn test_malformed_detection_fails_fast() {
    let mut bad = at(2, 1, 0, 0.0);
    bad.position.x = f64::NAN;
    let err = DetectionStore::from_detections(vec![at(1, 0, 0, 0.0), bad]).unwrap_err();
    assert!(matches!(err, TrackingError::MalformedDetection { key: 2, .. }));
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "frame_diff": 3,
        "tracking_radius": 110.0,
        "threshold": 0.5,
        "assignment": "Optimal",
        "cam_gap": true,
        "adjacency": [[0, 1], [2, 3]]
    }"#;
    let config: WalkerConfig = serde_json::from_str(json).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.assignment, AssignmentStrategy::Optimal);
    assert!(config.adjacency.is_adjacent(1, 0));

    let bad = r#"{
        "frame_diff": 3,
        "tracking_radius": 110.0,
        "threshold": 0.5,
        "assignment": "Greedy",
        "cam_gap": true,
        "adjacency": [[1, 1]]
    }"#;
    assert!(serde_json::from_str::<WalkerConfig>(bad).is_err());
}
