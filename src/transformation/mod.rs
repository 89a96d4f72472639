//! Transformation and simplification of meshes.

pub use self::decimation::{decimate_to_face_budget, DecimatedFace};

mod decimation;
