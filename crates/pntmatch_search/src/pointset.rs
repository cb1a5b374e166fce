use std::path::PathBuf;

use pntmatch_parser::PointFile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lx: f64,
    pub ly: f64,
    pub ux: f64,
    pub uy: f64,
}

impl Bounds {
    pub fn of(points: &[Point]) -> Bounds {
        let Some(first) = points.first() else {
            return Bounds {
                lx: 0.0,
                ly: 0.0,
                ux: 0.0,
                uy: 0.0,
            };
        };
        let mut b = Bounds {
            lx: first.x,
            ly: first.y,
            ux: first.x,
            uy: first.y,
        };
        for p in &points[1..] {
            b.lx = b.lx.min(p.x);
            b.ux = b.ux.max(p.x);
            b.ly = b.ly.min(p.y);
            b.uy = b.uy.max(p.y);
        }
        b
    }

    /// Side lengths, x extent first.
    pub fn side(&self) -> [f64; 2] {
        [self.ux - self.lx, self.uy - self.ly]
    }
}

/// An ordered set of image-plane points with cached bounds. The bounds
/// always reflect the current coordinates.
#[derive(Debug, Clone)]
pub struct PointSet {
    pub name: Option<String>,
    pub image: Option<PathBuf>,
    points: Vec<Point>,
    bounds: Bounds,
}

impl PointSet {
    pub fn new(points: Vec<Point>) -> Self {
        let bounds = Bounds::of(&points);
        PointSet {
            name: None,
            image: None,
            points,
            bounds,
        }
    }

    pub fn from_file(file: PointFile) -> Self {
        let mut set = PointSet::new(
            file.points
                .into_iter()
                .map(|(x, y)| Point::new(x, y))
                .collect(),
        );
        set.name = file.name;
        set.image = file.image;
        set
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, idx: usize) -> Point {
        self.points[idx]
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Center the set on the origin and rescale so the mean distance from
    /// the origin is √2. Returns the applied scale factor. The translation
    /// centers the bounding box, not the centroid.
    pub fn normalize(&mut self) -> f64 {
        let b = self.bounds;
        let cx = (b.ux - b.lx) / 2.0 + b.lx;
        let cy = (b.uy - b.ly) / 2.0 + b.ly;
        for p in &mut self.points {
            p.x -= cx;
            p.y -= cy;
        }

        let mut avg_dist = 0.0;
        for p in &self.points {
            avg_dist += (p.x * p.x + p.y * p.y).sqrt();
        }
        let sc = (2.0_f64.sqrt() * self.points.len() as f64) / avg_dist;
        for p in &mut self.points {
            p.x *= sc;
            p.y *= sc;
        }

        self.bounds = Bounds::of(&self.points);
        sc
    }
}
