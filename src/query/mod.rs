//! Non-persistent geometric queries.
//!
//! The functions exported here are the specific queries the decomposition
//! pipeline relies on. They have the form `[operation]_[shape1]_[shape2]()`
//! and take both shapes expressed in the same local frame.

pub use self::point_triangle::project_point_on_triangle;

mod point_triangle;

use crate::math::{Point, Real};
use crate::shape::TrianglePointLocation;

/// Description of the projection of a point on a triangle mesh.
#[derive(Copy, Clone, Debug)]
pub struct PointProjection {
    /// The mesh face holding the projected point.
    pub face: u32,
    /// The projection result.
    pub point: Point<Real>,
    /// The feature of the face the projected point lies on.
    pub location: TrianglePointLocation,
}
