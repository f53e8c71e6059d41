#![allow(dead_code)]

use tagtrack_rs::integration::DetectionBuilder;
use tagtrack_rs::validation::TruthDetection;
use tagtrack_rs::{Detection, Track};

use ndarray::Array2;

pub const ID_BITS: usize = 12;

/// Key of object `object` in frame `frame`.
pub fn key(frame: u64, object: u64) -> u64 {
    frame * 100 + object
}

pub fn position(frame: u64, object: u64) -> (f64, f64) {
    let f = frame as f64;
    let k = object as f64;
    (k * 40.0 + 2.0 * f, 10.0 + f * (object % 3) as f64)
}

/// `objects` tagged objects drifting slowly, observed by camera 0 in frames
/// `0..frames`.
pub fn world(objects: u64, frames: u64) -> Vec<Detection> {
    let mut detections = Vec::new();
    for frame in 0..frames {
        for object in 0..objects {
            detections.push(observe(frame, object));
        }
    }
    detections
}

pub fn observe(frame: u64, object: u64) -> Detection {
    let (x, y) = position(frame, object);
    DetectionBuilder::new(key(frame, object))
        .frame(frame)
        .camera(0)
        .position(x, y)
        .orientation(object as f64 * 0.3 + 0.01 * frame as f64)
        .id_bits(object as u32 + 1, ID_BITS)
        .build()
}

/// Ground truth matching `world` exactly.
pub fn truth(objects: u64, frames: u64) -> Vec<TruthDetection> {
    let mut truth = Vec::new();
    for frame in 0..frames {
        for object in 0..objects {
            let (x, y) = position(frame, object);
            truth.push(TruthDetection::new(object, frame, 0, x, y));
        }
    }
    truth
}

/// Score falling with distance: 1 / (1 + d).
pub fn proximity(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    Array2::from_shape_fn((tracks.len(), detections.len()), |(i, j)| {
        1.0 / (1.0 + tracks[i].last().distance(detections[j]))
    })
}

pub fn always_one(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    Array2::ones((tracks.len(), detections.len()))
}

pub fn keys(track: &Track) -> Vec<u64> {
    track.keys().collect()
}
