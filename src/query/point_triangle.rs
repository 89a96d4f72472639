use crate::math::{Point, Real};
use crate::shape::{Triangle, TrianglePointLocation};

/// Projects a point on a triangle and reports the feature holding the
/// projection.
pub fn project_point_on_triangle(
    triangle: &Triangle,
    pt: &Point<Real>,
) -> (Point<Real>, TrianglePointLocation) {
    let a = triangle.a;
    let b = triangle.b;
    let c = triangle.c;

    let ab = b - a;
    let ac = c - a;
    let ap = pt - a;

    let ab_ap = ab.dot(&ap);
    let ac_ap = ac.dot(&ap);

    if ab_ap <= 0.0 && ac_ap <= 0.0 {
        // Voronoï region of `a`.
        return (a, TrianglePointLocation::OnVertex(0));
    }

    let bp = pt - b;
    let ab_bp = ab.dot(&bp);
    let ac_bp = ac.dot(&bp);

    if ab_bp >= 0.0 && ac_bp <= ab_bp {
        // Voronoï region of `b`.
        return (b, TrianglePointLocation::OnVertex(1));
    }

    let cp = pt - c;
    let ab_cp = ab.dot(&cp);
    let ac_cp = ac.dot(&cp);

    if ac_cp >= 0.0 && ab_cp <= ac_cp {
        // Voronoï region of `c`.
        return (c, TrianglePointLocation::OnVertex(2));
    }

    // Edge regions, with explicit cross products which are more numerically
    // stable than the usual determinant formulation.
    let n = ab.cross(&ac);

    let vc = n.dot(&ab.cross(&ap));
    if vc < 0.0 && ab_ap >= 0.0 && ab_bp <= 0.0 {
        // Voronoï region of `ab`.
        let v = ab_ap / ab.norm_squared();
        return (a + ab * v, TrianglePointLocation::OnEdge(0, [1.0 - v, v]));
    }

    let vb = -n.dot(&ac.cross(&cp));
    if vb < 0.0 && ac_ap >= 0.0 && ac_cp <= 0.0 {
        // Voronoï region of `ac`.
        let w = ac_ap / ac.norm_squared();
        return (a + ac * w, TrianglePointLocation::OnEdge(2, [1.0 - w, w]));
    }

    let bc = c - b;
    let va = n.dot(&bc.cross(&bp));
    if va < 0.0 && ac_bp - ab_bp >= 0.0 && ab_cp - ac_cp >= 0.0 {
        // Voronoï region of `bc`.
        let w = bc.dot(&bp) / bc.norm_squared();
        return (b + bc * w, TrianglePointLocation::OnEdge(1, [1.0 - w, w]));
    }

    // Voronoï region of the face. A nearly degenerate triangle may zero the
    // denominator; fall back to the closest clamped edge projection then.
    let denom = va + vb + vc;
    if denom != 0.0 {
        let v = vb / denom;
        let w = vc / denom;
        return (
            a + ab * v + ac * w,
            TrianglePointLocation::OnFace([1.0 - v - w, v, w]),
        );
    }

    fn clamped_ratio(num: Real, den: Real) -> Real {
        if den > 0.0 {
            (num / den).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    let v = clamped_ratio(ab_ap, ab.norm_squared());
    let u = clamped_ratio(bc.dot(&bp), bc.norm_squared());
    let w = clamped_ratio(ac_ap, ac.norm_squared());

    let mut best = (a + ab * v, TrianglePointLocation::OnEdge(0, [1.0 - v, v]));
    let mut best_dist = na::distance_squared(&best.0, pt);

    for candidate in [
        (b + bc * u, TrianglePointLocation::OnEdge(1, [1.0 - u, u])),
        (a + ac * w, TrianglePointLocation::OnEdge(2, [1.0 - w, w])),
    ] {
        let dist = na::distance_squared(&candidate.0, pt);
        if dist < best_dist {
            best_dist = dist;
            best = candidate;
        }
    }

    best
}

#[cfg(test)]
mod test {
    use super::project_point_on_triangle;
    use crate::math::Point;
    use crate::shape::{Triangle, TrianglePointLocation};

    fn reference_triangle() -> Triangle {
        Triangle::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(0.0, 2.0, 0.0),
        )
    }

    #[test]
    fn projection_on_the_interior() {
        let triangle = reference_triangle();
        let (proj, location) = project_point_on_triangle(&triangle, &Point::new(0.5, 0.5, 3.0));

        assert!(relative_eq!(proj, Point::new(0.5, 0.5, 0.0)));
        assert!(location.is_on_face());

        let bcoords = location.barycentric_coordinates();
        assert!(relative_eq!(
            bcoords[0] + bcoords[1] + bcoords[2],
            1.0,
            epsilon = 1.0e-10
        ));
    }

    #[test]
    fn projection_on_a_vertex() {
        let triangle = reference_triangle();
        let (proj, location) = project_point_on_triangle(&triangle, &Point::new(-1.0, -1.0, 0.5));

        assert_eq!(location, TrianglePointLocation::OnVertex(0));
        assert!(relative_eq!(proj, triangle.a));
    }

    #[test]
    fn projection_on_an_edge() {
        let triangle = reference_triangle();
        let (proj, location) = project_point_on_triangle(&triangle, &Point::new(1.0, -2.0, 0.0));

        assert!(relative_eq!(proj, Point::new(1.0, 0.0, 0.0)));
        match location {
            TrianglePointLocation::OnEdge(0, uv) => {
                assert!(relative_eq!(uv[0], 0.5, epsilon = 1.0e-10));
                assert!(relative_eq!(uv[1], 0.5, epsilon = 1.0e-10));
            }
            other => panic!("expected a projection on the edge ab, got {:?}", other),
        }
    }
}
