use bsp::types::Point3F;
use cgmath::{InnerSpace, Vector3};
use std::cmp::Ordering;

/// Plane classification tolerance used throughout the engine.
pub const ON_EPSILON: f32 = 0.01;

/// Where a subdivision cut lands inside a polygon's extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutRule {
    /// The multiple of the step nearest to the midpoint.
    Grid,
    /// A whole number of steps from the minimum, nearest to the midpoint.
    FromMin,
}

/// Recursively clips a convex polygon against cut planes perpendicular to a
/// set of axes until no piece is wider than `step` along any of them.
#[derive(Debug, Clone)]
pub struct Subdivider {
    pub axes: Vec<Point3F>,
    pub step: f32,
    pub rule: CutRule,
    pub epsilon: f32,
}

impl Subdivider {
    pub fn new(axes: Vec<Point3F>, step: f32, rule: CutRule) -> Subdivider {
        Subdivider {
            axes,
            step,
            rule,
            epsilon: ON_EPSILON,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Subdivider {
        self.epsilon = epsilon;
        self
    }

    /// World X, Y and Z.
    pub fn world_axes() -> Vec<Point3F> {
        vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ]
    }

    /// Splits `polygon` into convex pieces, keeping its winding. A polygon
    /// that needs no cut comes back unchanged as the only piece.
    pub fn subdivide(&self, polygon: &[Point3F]) -> Vec<Vec<Point3F>> {
        let mut pieces = vec![];
        if polygon.len() < 3 || self.step <= 0.0 {
            pieces.push(polygon.to_vec());
            return pieces;
        }
        self.split_into(polygon.to_vec(), &mut pieces);
        pieces
    }

    fn split_into(&self, polygon: Vec<Point3F>, pieces: &mut Vec<Vec<Point3F>>) {
        for axis in &self.axes {
            let (min, max) = extent(&polygon, *axis);
            if max - min <= self.step + self.epsilon {
                continue;
            }
            let cut = self.cut_position(min, max);
            if cut <= min + self.epsilon || cut >= max - self.epsilon {
                continue;
            }

            let (back, front) = clip(&polygon, *axis, cut, self.epsilon);
            if back.len() < 3 || front.len() < 3 {
                continue;
            }
            self.split_into(back, pieces);
            self.split_into(front, pieces);
            return;
        }
        pieces.push(polygon);
    }

    fn cut_position(&self, min: f32, max: f32) -> f32 {
        let mid = (min + max) * 0.5;
        match self.rule {
            CutRule::Grid => self.step * (mid / self.step).round(),
            CutRule::FromMin => min + self.step * ((mid - min) / self.step).round(),
        }
    }
}

/// Projected `[min, max]` of a polygon on an axis.
pub fn extent(polygon: &[Point3F], axis: Point3F) -> (f32, f32) {
    polygon
        .iter()
        .map(|point| point.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), d| {
            (min.min(d), max.max(d))
        })
}

/// Splits a convex polygon by the plane `dot(axis, p) = cut` into the part
/// below the plane and the part above it. Vertices within `epsilon` of the
/// plane go to both parts.
pub fn clip(
    polygon: &[Point3F],
    axis: Point3F,
    cut: f32,
    epsilon: f32,
) -> (Vec<Point3F>, Vec<Point3F>) {
    let mut back = vec![];
    let mut front = vec![];

    for i in 0..polygon.len() {
        let v1 = polygon[i];
        let v2 = polygon[(i + 1) % polygon.len()];
        let d1 = v1.dot(axis) - cut;
        let d2 = v2.dot(axis) - cut;

        if d1 <= epsilon {
            back.push(v1);
        }
        if d1 >= -epsilon {
            front.push(v1);
        }
        if (d1 > epsilon && d2 < -epsilon) || (d1 < -epsilon && d2 > epsilon) {
            // Both neighbours of this edge interpolate it from the same end.
            let ((a, da), (b, db)) = if compare_points(&v1, &v2) == Ordering::Greater {
                ((v2, d2), (v1, d1))
            } else {
                ((v1, d1), (v2, d2))
            };
            let t = da / (da - db);
            let split = a + (b - a) * t;
            let split = polygon
                .iter()
                .find(|p| (*p - split).magnitude2() < epsilon * epsilon)
                .copied()
                .unwrap_or(split);
            back.push(split);
            front.push(split);
        }
    }

    (remove_repeats(back), remove_repeats(front))
}

fn compare_points(a: &Point3F, b: &Point3F) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

fn remove_repeats(mut polygon: Vec<Point3F>) -> Vec<Point3F> {
    polygon.dedup();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

/// Unsigned area of a planar convex polygon.
pub fn polygon_area(polygon: &[Point3F]) -> f32 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let origin = polygon[0];
    polygon
        .windows(2)
        .skip(1)
        .map(|pair| (pair[0] - origin).cross(pair[1] - origin))
        .fold(Vector3::new(0.0, 0.0, 0.0), |sum, cross| sum + cross)
        .magnitude()
        * 0.5
}

/// Positions shared by a set of pieces, deduplicated within epsilon.
#[derive(Debug, Clone)]
pub struct VertexPool {
    positions: Vec<Point3F>,
    epsilon: f32,
}

impl VertexPool {
    pub fn new(epsilon: f32) -> VertexPool {
        VertexPool {
            positions: vec![],
            epsilon,
        }
    }

    /// A pool whose first entries are `positions`, in order.
    pub fn seeded(positions: Vec<Point3F>, epsilon: f32) -> VertexPool {
        VertexPool { positions, epsilon }
    }

    pub fn insert(&mut self, point: Point3F) -> usize {
        let epsilon2 = self.epsilon * self.epsilon;
        if let Some(found) = self
            .positions
            .iter()
            .position(|p| (p - point).magnitude2() <= epsilon2)
        {
            return found;
        }
        self.positions.push(point);
        self.positions.len() - 1
    }

    /// Index loop for a piece, or `None` when fewer than three distinct
    /// entries remain.
    pub fn add_loop(&mut self, piece: &[Point3F]) -> Option<Vec<usize>> {
        let mut indices: Vec<usize> = piece.iter().map(|p| self.insert(*p)).collect();
        indices.dedup();
        while indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() < 3 {
            return None;
        }
        Some(indices)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3F] {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn square(size: f32) -> Vec<Point3F> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(size, 0.0, 0.0),
            Vector3::new(size, size, 0.0),
            Vector3::new(0.0, size, 0.0),
        ]
    }

    fn planar_axes() -> Vec<Point3F> {
        vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)]
    }

    #[test]
    fn square_splits_into_quarters() {
        let subdivider = Subdivider::new(planar_axes(), 32.0, CutRule::Grid);
        let pieces = subdivider.subdivide(&square(64.0));
        assert_eq!(pieces.len(), 4);
        for piece in &pieces {
            assert_eq!(piece.len(), 4);
            assert!((polygon_area(piece) - 1024.0).abs() < 1e-3);
        }
        // Back half first, along the first axis.
        assert!(pieces[0].iter().all(|p| p.x <= 32.0 && p.y <= 32.0));
        assert!(pieces[1].iter().all(|p| p.x <= 32.0 && p.y >= 32.0));
        assert!(pieces[2].iter().all(|p| p.x >= 32.0 && p.y <= 32.0));
    }

    #[test]
    fn small_polygon_is_left_alone() {
        let triangle = vec![
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(9.0, 1.0, 0.0),
            Vector3::new(1.0, 9.0, 0.0),
        ];
        let subdivider = Subdivider::new(planar_axes(), 32.0, CutRule::Grid);
        assert_eq!(subdivider.subdivide(&triangle), vec![triangle]);
    }

    #[test]
    fn area_and_extent_hold_for_slanted_polygon() {
        let polygon = vec![
            Vector3::new(-13.0, 5.0, 2.0),
            Vector3::new(120.5, -7.0, 2.0),
            Vector3::new(150.0, 90.25, 2.0),
            Vector3::new(40.0, 131.0, 2.0),
            Vector3::new(-20.0, 60.0, 2.0),
        ];
        let subdivider = Subdivider::new(planar_axes(), 32.0, CutRule::Grid);
        let pieces = subdivider.subdivide(&polygon);
        assert!(pieces.len() > 1);

        let total: f32 = pieces.iter().map(|p| polygon_area(p)).sum();
        let expected = polygon_area(&polygon);
        assert!((total - expected).abs() / expected < 1e-4, "{} vs {}", total, expected);

        for piece in &pieces {
            assert!(piece.len() >= 3);
            for axis in planar_axes() {
                let (min, max) = extent(piece, axis);
                assert!(max - min <= 32.0 + 2.0 * ON_EPSILON);
            }
        }
    }

    #[test]
    fn from_min_counts_whole_steps() {
        let subdivider = Subdivider::new(Subdivider::world_axes(), 240.0, CutRule::FromMin);
        let strip = vec![
            Vector3::new(8.0, 0.0, 0.0),
            Vector3::new(600.0, 0.0, 0.0),
            Vector3::new(600.0, 16.0, 0.0),
            Vector3::new(8.0, 16.0, 0.0),
        ];
        let pieces = subdivider.subdivide(&strip);
        let mut cuts: Vec<f32> = pieces
            .iter()
            .map(|p| extent(p, Vector3::new(1.0, 0.0, 0.0)).0)
            .collect();
        cuts.sort_by(f32::total_cmp);
        assert_eq!(cuts, vec![8.0, 248.0, 488.0]);
    }

    #[test]
    fn on_plane_vertex_goes_to_both_halves() {
        let diamond = vec![
            Vector3::new(32.0, 0.0, 0.0),
            Vector3::new(64.0, 32.0, 0.0),
            Vector3::new(32.0, 64.0, 0.0),
            Vector3::new(0.0, 32.0, 0.0),
        ];
        let (back, front) = clip(&diamond, Vector3::new(1.0, 0.0, 0.0), 32.0, ON_EPSILON);
        assert_eq!(back.len(), 3);
        assert_eq!(front.len(), 3);
        assert!(back.contains(&diamond[0]) && front.contains(&diamond[0]));
        assert!(back.contains(&diamond[2]) && front.contains(&diamond[2]));
    }

    #[test]
    fn pool_merges_close_points() {
        let mut pool = VertexPool::new(ON_EPSILON);
        let a = pool.insert(Vector3::new(1.0, 2.0, 3.0));
        let b = pool.insert(Vector3::new(1.004, 2.0, 3.0));
        let c = pool.insert(Vector3::new(1.5, 2.0, 3.0));
        assert_eq!((a, b, c), (0, 0, 1));

        let sliver = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.001, 0.0, 0.0),
            Vector3::new(1.0, 2.0, 3.0),
        ];
        assert_eq!(pool.add_loop(&sliver), None);
    }
}
