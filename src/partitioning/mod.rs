//! Spatial partitioning tools.

pub use self::bvh::Bvh;

mod bvh;
