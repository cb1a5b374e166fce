use super::{ModelExtent, SingularSystem, TransformModel, clamp_tiny};
use crate::pointset::Point;

// Accumulator slots; sums over pairs (x,y) -> (u,v).
const SX: usize = 0;
const SY: usize = 1;
const SU: usize = 2;
const SV: usize = 3;
const SXU: usize = 4;
const SYV: usize = 5;
const SXV: usize = 6;
const SYU: usize = 7;
const SRR: usize = 8; // Σ x² + y²
const N: usize = 9;

pub const CONTEXT_LEN: usize = 10;

/// Rotation + uniform scale + translation, pose `[α, β, tx, ty]` mapping
/// `(x, y)` to `(αx − βy + tx, βx + αy + ty)`.
pub struct Similarity;

impl TransformModel for Similarity {
    fn pose_dim(&self) -> usize {
        4
    }

    fn min_pairs(&self) -> usize {
        2
    }

    fn context_len(&self) -> usize {
        CONTEXT_LEN
    }

    fn apply(&self, p: Point, pose: &[f64]) -> Point {
        Point {
            x: p.x * pose[0] - p.y * pose[1] + pose[2],
            y: p.x * pose[1] + p.y * pose[0] + pose[3],
        }
    }

    fn degeneracy(&self, extent: &ModelExtent, pose: &[f64], max_scale: f64) -> f64 {
        let mut sc = (pose[0] * pose[0] + pose[1] * pose[1]).sqrt();
        sc = sc.max(1.0 / sc);
        (sc - max_scale).max(0.0) * (extent.size as f64 / 4.0)
    }

    fn accumulate_pair(&self, x: f64, y: f64, u: f64, v: f64, out: &mut [f64]) {
        out[SX] = x;
        out[SY] = y;
        out[SU] = u;
        out[SV] = v;
        out[SXU] = x * u;
        out[SYV] = y * v;
        out[SXV] = x * v;
        out[SYU] = y * u;
        out[SRR] = x * x + y * y;
        out[N] = 1.0;
    }

    fn solve_pose(&self, partial: &[f64], pose: &mut [f64]) -> Result<(), SingularSystem> {
        let p = partial;
        let denom = p[N] * p[SRR] - p[SX] * p[SX] - p[SY] * p[SY];
        if p[N] == 0.0 || denom.abs() < 1e-12 {
            return Err(SingularSystem);
        }

        pose[0] =
            (p[N] * (p[SXU] + p[SYV]) - p[SX] * p[SU] - p[SY] * p[SV]) / denom;
        pose[1] =
            (p[N] * (p[SXV] - p[SYU]) + p[SY] * p[SU] - p[SX] * p[SV]) / denom;
        pose[2] = -(pose[0] * p[SX] - pose[1] * p[SY] - p[SU]) / p[N];
        pose[3] = -(pose[0] * p[SY] + pose[1] * p[SX] - p[SV]) / p[N];

        clamp_tiny(pose);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointset::Bounds;

    fn solve_from_points(points: &[Point], pose_true: &[f64]) -> Vec<f64> {
        let tr = Similarity;
        let mut partial = vec![0.0; CONTEXT_LEN];
        let mut scratch = vec![0.0; CONTEXT_LEN];
        for &p in points {
            let q = tr.apply(p, pose_true);
            tr.accumulate_pair(p.x, p.y, q.x, q.y, &mut scratch);
            for (acc, s) in partial.iter_mut().zip(&scratch) {
                *acc += s;
            }
        }
        let mut pose = vec![0.0; 4];
        tr.solve_pose(&partial, &mut pose).expect("solvable system");
        pose
    }

    #[test]
    fn recovers_rotation_scale_translation() {
        let angle = 30.0_f64.to_radians();
        let truth = [
            1.2 * angle.cos(),
            1.2 * angle.sin(),
            5.0,
            7.0,
        ];
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 2.0),
            Point::new(4.0, 9.0),
            Point::new(-3.0, 5.0),
        ];
        let pose = solve_from_points(&points, &truth);
        for (got, want) in pose.iter().zip(truth) {
            assert!((got - want).abs() < 1e-9, "pose {pose:?}");
        }
    }

    #[test]
    fn two_pairs_determine_the_pose() {
        let truth = [0.5, -0.8, -2.0, 3.0];
        let points = [Point::new(1.0, 1.0), Point::new(4.0, -2.0)];
        let pose = solve_from_points(&points, &truth);
        for (got, want) in pose.iter().zip(truth) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn coincident_points_are_singular() {
        let tr = Similarity;
        let mut partial = vec![0.0; CONTEXT_LEN];
        let mut scratch = vec![0.0; CONTEXT_LEN];
        for _ in 0..3 {
            tr.accumulate_pair(2.0, 2.0, 5.0, 5.0, &mut scratch);
            for (acc, s) in partial.iter_mut().zip(&scratch) {
                *acc += s;
            }
        }
        let mut pose = vec![0.0; 4];
        assert!(tr.solve_pose(&partial, &mut pose).is_err());
    }

    #[test]
    fn degeneracy_penalizes_scale_violations() {
        let tr = Similarity;
        let extent = ModelExtent {
            bounds: Bounds {
                lx: 0.0,
                ly: 0.0,
                ux: 1.0,
                uy: 1.0,
            },
            side_factor: [1.0, 1.0],
            size: 8,
        };
        // scale 1.2 is inside the allowed [1/2, 2] band
        assert_eq!(tr.degeneracy(&extent, &[1.2, 0.0, 0.0, 0.0], 2.0), 0.0);
        // scale 4 exceeds it by 2; each unit costs |M|/4 points
        let pen = tr.degeneracy(&extent, &[4.0, 0.0, 0.0, 0.0], 2.0);
        assert!((pen - 4.0).abs() < 1e-9);
    }
}
