//! Shapes supported by quarry3d.

pub use self::triangle::{Triangle, TrianglePointLocation};
pub use self::trimesh::{TopologyError, TriMesh, TriMeshPseudoNormals};

mod triangle;
mod trimesh;
