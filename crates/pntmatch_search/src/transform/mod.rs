pub mod projective;
pub mod similarity;

use pntmatch_parser::TransformRequest;

use crate::pointset::{Bounds, Point};

/// Pose parameters of a planar transform; the length depends on the class
/// (4 for similarity, 8 for projective).
pub type Pose = Vec<f64>;

/// The assembled normal equations had no unique solution (too few or
/// degenerate pairings). Callers record the bad-match penalty.
#[derive(Debug, Clone, Copy)]
pub struct SingularSystem;

/// Model bounding-box data the degeneracy tests run against.
///
/// `side_factor` multiplies a transformed side length to express it as a
/// ratio against the original side; for normalized problems it also folds
/// in the model/data scale ratio so the test happens in data space.
#[derive(Debug, Clone, Copy)]
pub struct ModelExtent {
    pub bounds: Bounds,
    pub side_factor: [f64; 2],
    pub size: usize,
}

/// Capability bundle for one transformation class: the forward map, the
/// impossible-pose penalty, and the closed-form least-squares pose solver
/// split into its additive per-pair contribution and the final solve.
pub trait TransformModel: Sync {
    fn pose_dim(&self) -> usize;
    fn min_pairs(&self) -> usize;
    fn context_len(&self) -> usize;
    fn normalizes(&self) -> bool {
        false
    }

    fn apply(&self, p: Point, pose: &[f64]) -> Point;

    fn degeneracy(&self, extent: &ModelExtent, pose: &[f64], max_scale: f64) -> f64;

    /// Write one pair's contribution to the normal-equation sums into
    /// `out` (length `context_len`). Contributions are additive across
    /// pairs, which is what lets local search update a pose incrementally.
    fn accumulate_pair(&self, x: f64, y: f64, u: f64, v: f64, out: &mut [f64]);

    fn solve_pose(&self, partial: &[f64], pose: &mut [f64]) -> Result<(), SingularSystem>;
}

/// Registered transformation classes. Adding a class means one more
/// variant here plus its `TransformModel` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Projective,
    Similarity,
}

impl TransformKind {
    /// Map a parsed request onto an implemented class.
    pub fn from_request(req: TransformRequest) -> Option<TransformKind> {
        match req {
            TransformRequest::Projective => Some(TransformKind::Projective),
            TransformRequest::Similarity => Some(TransformKind::Similarity),
            TransformRequest::Affine | TransformRequest::Rigid | TransformRequest::Translation => {
                None
            }
        }
    }

    pub fn model(self) -> &'static dyn TransformModel {
        match self {
            TransformKind::Projective => &projective::Projective,
            TransformKind::Similarity => &similarity::Similarity,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Projective => "projective",
            TransformKind::Similarity => "similarity",
        }
    }
}

/// Canonical 8-entry homogeneous form: the row-major 3×3 matrix minus the
/// fixed bottom-right 1. Used at output time only.
pub fn pose_to_homogeneous(kind: TransformKind, pose: &[f64]) -> [f64; 8] {
    let mut out = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
    match kind {
        TransformKind::Similarity => {
            out[0] = pose[0];
            out[1] = -pose[1];
            out[2] = pose[2];
            out[3] = pose[1];
            out[4] = pose[0];
            out[5] = pose[3];
        }
        TransformKind::Projective => out.copy_from_slice(&pose[..8]),
    }
    out
}

/// Components within ±1e-9 of zero are numerical noise from the solve;
/// clamp them so poses print and compare cleanly.
pub(crate) fn clamp_tiny(pose: &mut [f64]) {
    for c in pose.iter_mut() {
        if c.abs() < 1e-9 {
            *c = 0.0;
        }
    }
}
