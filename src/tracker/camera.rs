//! Explicit spatial adjacency between cameras.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::tracker::detection::CameraId;

/// Set of camera pairs whose fields of view touch.
///
/// Adjacency is symmetric: registering `(a, b)` also makes `b` adjacent to `a`.
/// It is never inferred from positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(CameraId, CameraId)>", into = "Vec<(CameraId, CameraId)>")]
pub struct CameraAdjacency {
    pairs: BTreeSet<(CameraId, CameraId)>,
}

impl CameraAdjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CameraId, CameraId)>,
    {
        let mut adjacency = Self::new();
        for (a, b) in pairs {
            adjacency.insert(a, b)?;
        }
        Ok(adjacency)
    }

    pub fn insert(&mut self, a: CameraId, b: CameraId) -> Result<()> {
        if a == b {
            return Err(TrackingError::InvalidConfig(format!(
                "camera {a} cannot be adjacent to itself"
            )));
        }
        self.pairs.insert((a.min(b), a.max(b)));
        Ok(())
    }

    pub fn is_adjacent(&self, a: CameraId, b: CameraId) -> bool {
        a != b && self.pairs.contains(&(a.min(b), a.max(b)))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl TryFrom<Vec<(CameraId, CameraId)>> for CameraAdjacency {
    type Error = TrackingError;

    fn try_from(pairs: Vec<(CameraId, CameraId)>) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl From<CameraAdjacency> for Vec<(CameraId, CameraId)> {
    fn from(adjacency: CameraAdjacency) -> Self {
        adjacency.pairs.into_iter().collect()
    }
}
