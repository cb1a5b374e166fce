use ndarray::{Array1, Array2};
use ndarray_linalg::SolveH;

use super::{ModelExtent, SingularSystem, TransformModel, clamp_tiny};
use crate::pointset::Point;

// Accumulator slots. Each is a sum over pairs (x,y) -> (u,v); W = u² + v².
const SXX: usize = 0;
const SXY: usize = 1;
const SX: usize = 2;
const SXXU: usize = 3;
const SXYU: usize = 4;
const SYY: usize = 5;
const SY: usize = 6;
const SYYU: usize = 7;
const N: usize = 8;
const SXU: usize = 9;
const SYU: usize = 10;
const SXXV: usize = 11;
const SXYV: usize = 12;
const SYYV: usize = 13;
const SXV: usize = 14;
const SYV: usize = 15;
const SXXW: usize = 16;
const SXYW: usize = 17;
const SYYW: usize = 18;
const SU: usize = 19;
const SV: usize = 20;
const SXW: usize = 21;
const SYW: usize = 22;

pub const CONTEXT_LEN: usize = 23;

/// Full planar projective transform (homography), pose
/// `[a, b, c, d, e, f, g, h]` mapping `(x, y)` to
/// `((ax + by + c) / w, (dx + ey + f) / w)` with `w = gx + hy + 1`.
pub struct Projective;

impl TransformModel for Projective {
    fn pose_dim(&self) -> usize {
        8
    }

    fn min_pairs(&self) -> usize {
        4
    }

    fn context_len(&self) -> usize {
        CONTEXT_LEN
    }

    fn normalizes(&self) -> bool {
        true
    }

    fn apply(&self, p: Point, pose: &[f64]) -> Point {
        let div = p.x * pose[6] + p.y * pose[7] + 1.0;
        Point {
            x: (p.x * pose[0] + p.y * pose[1] + pose[2]) / div,
            y: (p.x * pose[3] + p.y * pose[4] + pose[5]) / div,
        }
    }

    fn degeneracy(&self, extent: &ModelExtent, pose: &[f64], max_scale: f64) -> f64 {
        // penalize large projective rows outright; they fold the plane
        let vterm = (pose[6] * pose[6] + pose[7] * pose[7])
            * extent.side_factor[0].max(extent.side_factor[1]);

        // transformed bbox corners, walked in side order
        let b = extent.bounds;
        let corners = [
            self.apply(Point::new(b.lx, b.ly), pose),
            self.apply(Point::new(b.ux, b.ly), pose),
            self.apply(Point::new(b.ux, b.uy), pose),
            self.apply(Point::new(b.lx, b.uy), pose),
        ];

        let mut scterm = 0.0_f64;
        for i in 0..4 {
            let j = (i + 1) % 4;
            let mut len = corners[i].distance_sq(corners[j]).sqrt();
            len *= extent.side_factor[i % 2];
            len = len.max(1.0 / len);
            len = (len - max_scale).max(0.0);
            scterm = scterm.max(len);
        }
        // one unit of scale violation costs as much as dropping a quarter
        // of the model points
        scterm *= extent.size as f64 / 4.0;

        scterm + vterm
    }

    fn accumulate_pair(&self, x: f64, y: f64, u: f64, v: f64, out: &mut [f64]) {
        let x2 = x * x;
        let y2 = y * y;
        let xy = x * y;
        let w = u * u + v * v;

        out[SXX] = x2;
        out[SXY] = xy;
        out[SX] = x;
        out[SXXU] = x2 * u;
        out[SXYU] = xy * u;
        out[SYY] = y2;
        out[SY] = y;
        out[SYYU] = y2 * u;
        out[N] = 1.0;
        out[SXU] = x * u;
        out[SYU] = y * u;
        out[SXXV] = x2 * v;
        out[SXYV] = xy * v;
        out[SYYV] = y2 * v;
        out[SXV] = x * v;
        out[SYV] = y * v;
        out[SXXW] = x2 * w;
        out[SXYW] = xy * w;
        out[SYYW] = y2 * w;
        out[SU] = u;
        out[SV] = v;
        out[SXW] = x * w;
        out[SYW] = y * w;
    }

    fn solve_pose(&self, partial: &[f64], pose: &mut [f64]) -> Result<(), SingularSystem> {
        // Normal equations A·θ = b of the algebraic least-squares problem
        //   ax + by + c − u(gx + hy + 1) = 0
        //   dx + ey + f − v(gx + hy + 1) = 0
        // assembled from the accumulated sums. A is symmetric; only the
        // upper triangle is written, then mirrored.
        let mut a = Array2::<f64>::zeros((8, 8));
        let p = partial;

        // (a, b, c) block and its twin for (d, e, f)
        for off in [0, 3] {
            a[[off, off]] = p[SXX];
            a[[off, off + 1]] = p[SXY];
            a[[off, off + 2]] = p[SX];
            a[[off + 1, off + 1]] = p[SYY];
            a[[off + 1, off + 2]] = p[SY];
            a[[off + 2, off + 2]] = p[N];
        }

        // coupling of (a..f) with the projective row (g, h)
        a[[0, 6]] = -p[SXXU];
        a[[0, 7]] = -p[SXYU];
        a[[1, 6]] = -p[SXYU];
        a[[1, 7]] = -p[SYYU];
        a[[2, 6]] = -p[SXU];
        a[[2, 7]] = -p[SYU];
        a[[3, 6]] = -p[SXXV];
        a[[3, 7]] = -p[SXYV];
        a[[4, 6]] = -p[SXYV];
        a[[4, 7]] = -p[SYYV];
        a[[5, 6]] = -p[SXV];
        a[[5, 7]] = -p[SYV];
        a[[6, 6]] = p[SXXW];
        a[[6, 7]] = p[SXYW];
        a[[7, 7]] = p[SYYW];

        for r in 0..8 {
            for c in 0..r {
                a[[r, c]] = a[[c, r]];
            }
        }

        let b = Array1::from(vec![
            p[SXU],
            p[SYU],
            p[SU],
            p[SXV],
            p[SYV],
            p[SV],
            -p[SXW],
            -p[SYW],
        ]);

        let solved = a.solveh_into(b).map_err(|_| SingularSystem)?;
        for (out, val) in pose.iter_mut().zip(solved.iter()) {
            *out = *val;
        }
        clamp_tiny(pose);
        Ok(())
    }
}
