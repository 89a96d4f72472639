/*!
quarry3d
========

**quarry3d** decomposes a closed 3D solid into a small set of axis-extruded
"quarry" boxes that together cover its surface, for fabrication workflows
that mill or lift height-field blocks. The pipeline builds a signed-distance
grid per canonical orientation, grows candidate boxes against that grid with
a gradient-based energy model, accumulates surface coverage through a
decimation-driven loop, prunes redundant boxes, and finally extracts one
height-field piece per surviving box.

*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)] // TODO: deny this
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::too_many_arguments)] // Maybe revisit this one later.
#![allow(clippy::module_inception)]
#![allow(clippy::manual_range_contains)] // This usually makes it way more verbose that it could be.
#![allow(clippy::type_complexity)] // Complains about closures that are fairly simple.

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
#[macro_use]
extern crate approx;
extern crate num_traits as num;

pub extern crate nalgebra as na;

pub mod bounding_volume;
pub mod decomposition;
pub mod partitioning;
pub mod query;
pub mod shape;
pub mod transformation;
pub mod utils;

/// Aliases for mathematical types.
pub mod math {
    /// The scalar type used throughout this crate.
    pub type Real = f64;

    /// The default tolerance used for geometric operations.
    pub const DEFAULT_EPSILON: Real = Real::EPSILON;

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The point type.
    pub type Point<N> = na::Point3<N>;

    /// The vector type.
    pub type Vector<N> = na::Vector3<N>;

    /// The unit vector type.
    pub type UnitVector<N> = na::UnitVector3<N>;

    /// The matrix type.
    pub type Matrix<N> = na::Matrix3<N>;

    /// The vector of the six extent parameters of a box.
    pub type ExtentsVector<N> = na::Vector6<N>;

    /// A square matrix over the six extent parameters of a box.
    pub type ExtentsMatrix<N> = na::Matrix6<N>;

    /// The rotation type.
    pub type Rotation<N> = na::UnitQuaternion<N>;
}
