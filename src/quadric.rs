use std::ops::{Add, AddAssign};

use nalgebra::{Matrix3, Point3, Vector3};

/// A quadratic form (A, b, c) measuring the weighted squared distance
/// from a plane, or a sum of such forms. Evaluation at a point p is
/// pᵀAp + 2bᵀp + c.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    pub a: Matrix3<f64>,
    pub b: Vector3<f64>,
    pub c: f64,
}

impl Quadric {
    pub fn zero() -> Self {
        Quadric {
            a: Matrix3::zeros(),
            b: Vector3::zeros(),
            c: 0.0,
        }
    }

    /// The plane with unit normal `normal` and offset `d` (so the
    /// plane is n·p + d = 0), scaled by `weight`.
    pub fn from_plane(normal: Vector3<f64>, d: f64, weight: f64) -> Self {
        Quadric {
            a: weight * normal * normal.transpose(),
            b: weight * d * normal,
            c: weight * d * d,
        }
    }

    /// The scalar error accumulated by this quadric at `p`.
    pub fn eval(&self, p: Point3<f64>) -> f64 {
        (self.a * p.coords).dot(&p.coords) + 2.0 * self.b.dot(&p.coords) + self.c
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Quadric {
            a: self.a * factor,
            b: self.b * factor,
            c: self.c * factor,
        }
    }
}

impl Default for Quadric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Quadric {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Quadric {
            a: self.a + rhs.a,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
        }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Self) {
        self.a += rhs.a;
        self.b += rhs.b;
        self.c += rhs.c;
    }
}

/// The area-weighted quadric of the plane through a triangle, together
/// with the triangle's area and unit normal.
///
/// The area uses Heron's formula, clamped to zero when floating point
/// error drives the intermediate product negative. Collinear vertices
/// yield a zero quadric, zero area, and a zero normal rather than NaN.
pub fn triangle_quadric(
    a: Point3<f64>,
    b: Point3<f64>,
    c: Point3<f64>,
) -> (Quadric, f64, Vector3<f64>) {
    let cross = (b - a).cross(&(c - a));
    let norm = cross.norm();
    if norm == 0.0 {
        return (Quadric::zero(), 0.0, Vector3::zeros());
    }
    let normal = cross / norm;

    let s1 = (b - a).norm();
    let s2 = (c - a).norm();
    let s3 = (c - b).norm();
    let sp = (s1 + s2 + s3) / 2.0;
    let area2 = sp * (sp - s1) * (sp - s2) * (sp - s3);
    let area = if area2 <= 0.0 { 0.0 } else { area2.sqrt() };

    let d = -normal.dot(&a.coords);
    (Quadric::from_plane(normal, d, area), area, normal)
}

/// The penalty quadric for a boundary edge at `edge_vertex`: the plane
/// through `edge_vertex` perpendicular to both the edge and the plane
/// of the single triangle containing it, weighted by 3·`avg_area` so
/// boundaries resist contraction.
///
/// A degenerate triangle normal yields a zero contribution.
pub fn boundary_quadric(
    edge_vertex: Point3<f64>,
    other_vertex: Point3<f64>,
    triangle_normal: Vector3<f64>,
    avg_area: f64,
) -> Quadric {
    let edge = edge_vertex - other_vertex;
    let cross = edge.cross(&triangle_normal);
    let norm = cross.norm();
    if norm == 0.0 {
        return Quadric::zero();
    }
    let normal = cross / norm;
    let d = -normal.dot(&edge_vertex.coords);
    Quadric::from_plane(normal, d, 3.0 * avg_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_triangle_quadric() {
        let (q, area, normal) = triangle_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_relative_eq!(area, 0.5, epsilon = 1e-12);
        assert_relative_eq!(normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);

        // in-plane points are error free, off-plane error is area * dz^2
        assert_relative_eq!(q.eval(Point3::new(0.3, 0.2, 0.0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.eval(Point3::new(0.0, 0.0, 2.0)), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quadric_matrix_symmetric() {
        let (q, _, _) = triangle_quadric(
            Point3::new(0.2, -1.0, 3.5),
            Point3::new(1.7, 0.4, -0.3),
            Point3::new(-0.9, 2.2, 1.1),
        );
        assert_relative_eq!(q.a, q.a.transpose(), epsilon = 1e-12);
        assert!(q.eval(Point3::new(4.0, -2.0, 9.0)).is_finite());
    }

    #[test]
    fn test_collinear_triangle_is_silent() {
        let (q, area, normal) = triangle_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert_eq!(area, 0.0);
        assert_eq!(normal, Vector3::zeros());
        assert_eq!(q.eval(Point3::new(5.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_eval_is_additive() {
        let (q1, _, _) = triangle_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let (q2, _, _) = triangle_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        );
        let p = Point3::new(1.5, -0.5, 2.0);
        assert_relative_eq!((q1 + q2).eval(p), q1.eval(p) + q2.eval(p), epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_quadric_contains_edge() {
        // edge (0,0,0)-(1,0,0) of the unit right triangle in the z=0
        // plane: the penalty plane is y=0, so sliding along the edge is
        // free and moving off it costs weight * y^2
        let q = boundary_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.5,
        );
        assert_relative_eq!(q.eval(Point3::new(3.0, 0.0, 0.0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.eval(Point3::new(0.0, 2.0, 0.0)), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_quadric_degenerate_normal() {
        let q = boundary_quadric(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Vector3::zeros(),
            1.0,
        );
        assert_eq!(q, Quadric::zero());
    }
}
