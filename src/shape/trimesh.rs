//! A triangle mesh with topology, face adjacency, and pseudo-normals.

use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Rotation, Vector, DEFAULT_EPSILON};
use crate::partitioning::Bvh;
use crate::query::{self, PointProjection};
use crate::shape::{Triangle, TrianglePointLocation};
use crate::utils::SortedPair;

use na::Unit;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Indicates a topology inconsistency of a triangle mesh.
///
/// The decomposition pipeline requires closed, consistently oriented,
/// non-degenerate input; every operation downstream of [`TriMesh::new`]
/// relies on these checks having passed.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A triangle mesh must contain at least one triangle.
    #[error("a triangle mesh must contain at least one triangle")]
    EmptyIndices,
    /// Found a triangle with an out-of-bounds or repeated vertex index.
    #[error("the triangle {0} has an out-of-bounds or repeated vertex index")]
    BadTriangle(u32),
    /// Found a triangle with (nearly) zero area.
    #[error("the triangle {0} has zero area")]
    DegenerateTriangle(u32),
    /// Found an edge adjacent to a single triangle: the surface is not closed.
    #[error("the edge {edge:?} is adjacent to a single triangle: the surface is not closed")]
    OpenEdge {
        /// The endpoint vertex indices of the open edge.
        edge: (u32, u32),
    },
    /// Found an edge adjacent to more than two triangles.
    #[error("the edge {edge:?} is adjacent to more than two triangles")]
    NonManifoldEdge {
        /// The endpoint vertex indices of the non-manifold edge.
        edge: (u32, u32),
    },
    /// At least two adjacent triangles have opposite orientations.
    #[error("the triangles {triangle1} and {triangle2} have opposite orientations")]
    BadAdjacentTrianglesOrientation {
        /// The first triangle, with an orientation opposite to the second triangle.
        triangle1: u32,
        /// The second triangle, with an orientation opposite to the first triangle.
        triangle2: u32,
    },
    /// The mesh is closed but encloses a (nearly) zero volume.
    #[error("the surface encloses a zero volume")]
    ZeroVolume,
    /// The mesh encloses a negative volume: its triangles are wound inward.
    #[error("the surface encloses a negative volume: triangles are wound inward")]
    InvertedOrientation,
}

/// The set of pseudo-normals of a triangle mesh.
///
/// Pseudo-normals make point containment unambiguous on features where the
/// surface normal is not defined: the sign test against the angle-weighted
/// pseudo-normal of the closest feature classifies a point as inside or
/// outside even when its projection falls on an edge or a vertex.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct TriMeshPseudoNormals {
    /// The pseudo-normals of the vertices.
    pub vertices_pseudo_normal: Vec<Vector<Real>>,
    /// The pseudo-normals of the edges, one triple per triangle.
    pub edges_pseudo_normal: Vec<[Vector<Real>; 3]>,
}

/// A closed, consistently oriented triangle mesh.
///
/// Construction validates the surface: indices in bounds, no degenerate
/// triangle, every edge shared by exactly two consistently wound triangles,
/// and a strictly positive enclosed volume. The mesh owns a bounding-volume
/// hierarchy over its triangles, per-face unit normals, the shared-edge face
/// adjacency, and angle-weighted pseudo-normals.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct TriMesh {
    vertices: Vec<Point<Real>>,
    indices: Vec<[u32; 3]>,
    bvh: Bvh,
    face_normals: Vec<Unit<Vector<Real>>>,
    // Neighbor across the edge (idx[k], idx[k + 1]), for k = 0, 1, 2.
    face_adjacency: Vec<[u32; 3]>,
    pseudo_normals: TriMeshPseudoNormals,
}

impl TriMesh {
    /// Creates a triangle mesh from a vertex buffer and an index buffer, and
    /// checks that the surface is closed, consistently oriented, and encloses
    /// a positive volume.
    pub fn new(
        vertices: Vec<Point<Real>>,
        indices: Vec<[u32; 3]>,
    ) -> Result<TriMesh, TopologyError> {
        if indices.is_empty() {
            return Err(TopologyError::EmptyIndices);
        }

        let face_normals = Self::compute_face_normals(&vertices, &indices)?;
        let face_adjacency = Self::compute_face_adjacency(&indices)?;
        Self::check_enclosed_volume(&vertices, &indices)?;
        let pseudo_normals =
            Self::compute_pseudo_normals(&vertices, &indices, &face_normals, &face_adjacency);

        let leaves: Vec<Aabb> = indices
            .iter()
            .map(|idx| {
                Triangle::new(
                    vertices[idx[0] as usize],
                    vertices[idx[1] as usize],
                    vertices[idx[2] as usize],
                )
                .local_aabb()
            })
            .collect();
        let bvh = Bvh::from_leaves(&leaves);

        Ok(TriMesh {
            vertices,
            indices,
            bvh,
            face_normals,
            face_adjacency,
            pseudo_normals,
        })
    }

    fn compute_face_normals(
        vertices: &[Point<Real>],
        indices: &[[u32; 3]],
    ) -> Result<Vec<Unit<Vector<Real>>>, TopologyError> {
        let mut normals = Vec::with_capacity(indices.len());

        for (fid, idx) in indices.iter().enumerate() {
            let fid = fid as u32;

            if idx.iter().any(|i| *i as usize >= vertices.len())
                || idx[0] == idx[1]
                || idx[1] == idx[2]
                || idx[0] == idx[2]
            {
                return Err(TopologyError::BadTriangle(fid));
            }

            let triangle = Triangle::new(
                vertices[idx[0] as usize],
                vertices[idx[1] as usize],
                vertices[idx[2] as usize],
            );
            match triangle.normal() {
                Some(normal) => normals.push(normal),
                None => return Err(TopologyError::DegenerateTriangle(fid)),
            }
        }

        Ok(normals)
    }

    fn compute_face_adjacency(indices: &[[u32; 3]]) -> Result<Vec<[u32; 3]>, TopologyError> {
        // For each undirected edge: the (face, edge-in-face, is-forward) of
        // the triangles containing it. `is-forward` records the direction the
        // face traverses the edge so opposite windings can be detected.
        let mut edges: HashMap<SortedPair<u32>, SmallVec<[(u32, u32, bool); 2]>> =
            HashMap::default();

        for (fid, idx) in indices.iter().enumerate() {
            for k in 0..3u32 {
                let va = idx[k as usize];
                let vb = idx[(k as usize + 1) % 3];
                let key = SortedPair::new(va, vb);
                edges
                    .entry(key)
                    .or_default()
                    .push((fid as u32, k, va < vb));
            }
        }

        let mut adjacency = vec![[u32::MAX; 3]; indices.len()];

        for (key, faces) in &edges {
            let edge: (u32, u32) = **key;
            match faces.as_slice() {
                [_] => return Err(TopologyError::OpenEdge { edge }),
                [(f1, e1, fwd1), (f2, e2, fwd2)] => {
                    if fwd1 == fwd2 {
                        return Err(TopologyError::BadAdjacentTrianglesOrientation {
                            triangle1: *f1,
                            triangle2: *f2,
                        });
                    }

                    adjacency[*f1 as usize][*e1 as usize] = *f2;
                    adjacency[*f2 as usize][*e2 as usize] = *f1;
                }
                _ => return Err(TopologyError::NonManifoldEdge { edge }),
            }
        }

        Ok(adjacency)
    }

    fn check_enclosed_volume(
        vertices: &[Point<Real>],
        indices: &[[u32; 3]],
    ) -> Result<(), TopologyError> {
        let volume = Self::signed_volume(vertices, indices);

        if volume.abs() <= DEFAULT_EPSILON {
            Err(TopologyError::ZeroVolume)
        } else if volume < 0.0 {
            Err(TopologyError::InvertedOrientation)
        } else {
            Ok(())
        }
    }

    fn signed_volume(vertices: &[Point<Real>], indices: &[[u32; 3]]) -> Real {
        // Divergence theorem over the signed volumes of the tetrahedra
        // joining each triangle to the origin.
        indices
            .iter()
            .map(|idx| {
                let a = vertices[idx[0] as usize].coords;
                let b = vertices[idx[1] as usize].coords;
                let c = vertices[idx[2] as usize].coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    fn compute_pseudo_normals(
        vertices: &[Point<Real>],
        indices: &[[u32; 3]],
        face_normals: &[Unit<Vector<Real>>],
        face_adjacency: &[[u32; 3]],
    ) -> TriMeshPseudoNormals {
        let mut vertices_pseudo_normal = vec![Vector::zeros(); vertices.len()];
        let mut edges_pseudo_normal = vec![[Vector::zeros(); 3]; indices.len()];

        for (fid, idx) in indices.iter().enumerate() {
            let n = *face_normals[fid];

            // The vertex pseudo-normal weights each incident face normal by
            // the interior angle of the face at that vertex.
            for k in 0..3 {
                let prev = vertices[idx[(k + 2) % 3] as usize];
                let curr = vertices[idx[k] as usize];
                let next = vertices[idx[(k + 1) % 3] as usize];
                let angle = (next - curr).angle(&(prev - curr));
                vertices_pseudo_normal[idx[k] as usize] += n * angle;
            }

            // The edge pseudo-normal is the sum of the two incident face
            // normals, stored symmetrically on both faces.
            for k in 0..3 {
                let adj = face_adjacency[fid][k] as usize;
                edges_pseudo_normal[fid][k] = n + *face_normals[adj];
            }
        }

        TriMeshPseudoNormals {
            vertices_pseudo_normal,
            edges_pseudo_normal,
        }
    }

    /// The vertex buffer of this mesh.
    #[inline]
    pub fn vertices(&self) -> &[Point<Real>] {
        &self.vertices
    }

    /// The index buffer of this mesh.
    #[inline]
    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    /// The number of triangles forming this mesh.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.indices.len()
    }

    /// Gets the triangle with the given face index.
    #[inline]
    pub fn triangle(&self, fid: u32) -> Triangle {
        let idx = self.indices[fid as usize];
        Triangle::new(
            self.vertices[idx[0] as usize],
            self.vertices[idx[1] as usize],
            self.vertices[idx[2] as usize],
        )
    }

    /// An iterator through all the triangles of this mesh.
    pub fn triangles(&self) -> impl ExactSizeIterator<Item = Triangle> + '_ {
        (0..self.indices.len() as u32).map(move |fid| self.triangle(fid))
    }

    /// The unit outward normal of the given face.
    #[inline]
    pub fn face_normal(&self, fid: u32) -> Unit<Vector<Real>> {
        self.face_normals[fid as usize]
    }

    /// The three faces sharing an edge with the given face.
    ///
    /// Entry `k` is the neighbor across the edge joining the face's `k`-th and
    /// `(k + 1) % 3`-th vertices.
    #[inline]
    pub fn face_adjacency(&self, fid: u32) -> [u32; 3] {
        self.face_adjacency[fid as usize]
    }

    /// The pseudo-normals of this mesh.
    #[inline]
    pub fn pseudo_normals(&self) -> &TriMeshPseudoNormals {
        &self.pseudo_normals
    }

    /// The bounding-volume hierarchy built over the triangles of this mesh.
    #[inline]
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// The axis-aligned bounding box of this mesh.
    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        self.bvh.root_aabb()
    }

    /// The volume enclosed by this mesh.
    ///
    /// Strictly positive on any successfully constructed mesh.
    pub fn volume(&self) -> Real {
        Self::signed_volume(&self.vertices, &self.indices)
    }

    /// This mesh, rotated by the given rotation.
    ///
    /// The topology is unchanged so the derived data is transformed directly
    /// instead of being recomputed and re-validated.
    pub fn rotated(&self, rotation: &Rotation<Real>) -> TriMesh {
        let vertices: Vec<Point<Real>> = self.vertices.iter().map(|pt| rotation * pt).collect();
        let face_normals = self
            .face_normals
            .iter()
            .map(|n| Unit::new_unchecked(rotation * n.into_inner()))
            .collect();
        let pseudo_normals = TriMeshPseudoNormals {
            vertices_pseudo_normal: self
                .pseudo_normals
                .vertices_pseudo_normal
                .iter()
                .map(|n| rotation * n)
                .collect(),
            edges_pseudo_normal: self
                .pseudo_normals
                .edges_pseudo_normal
                .iter()
                .map(|n| [rotation * n[0], rotation * n[1], rotation * n[2]])
                .collect(),
        };

        let leaves: Vec<Aabb> = self
            .indices
            .iter()
            .map(|idx| {
                Triangle::new(
                    vertices[idx[0] as usize],
                    vertices[idx[1] as usize],
                    vertices[idx[2] as usize],
                )
                .local_aabb()
            })
            .collect();
        let bvh = Bvh::from_leaves(&leaves);

        TriMesh {
            vertices,
            indices: self.indices.clone(),
            bvh,
            face_normals,
            face_adjacency: self.face_adjacency.clone(),
            pseudo_normals,
        }
    }

    /// Projects a point on this mesh.
    pub fn project_point(&self, point: &Point<Real>) -> PointProjection {
        let (face, _) = self
            .bvh
            .best_leaf(point, |fid| {
                let (proj, _) = query::project_point_on_triangle(&self.triangle(fid), point);
                na::distance_squared(&proj, point)
            })
            .unwrap_or((0, 0.0));

        let (proj, location) = query::project_point_on_triangle(&self.triangle(face), point);
        PointProjection {
            face,
            point: proj,
            location,
        }
    }

    /// The distance between a point and this mesh's surface.
    pub fn distance_to_point(&self, point: &Point<Real>) -> Real {
        let proj = self.project_point(point);
        na::distance(&proj.point, point)
    }

    /// The signed distance between a point and this mesh's surface, negative
    /// when the point lies inside of the enclosed solid.
    ///
    /// The sign is decided by the angle-weighted pseudo-normal of the feature
    /// the point projects onto.
    pub fn signed_distance(&self, point: &Point<Real>) -> Real {
        self.signed_distance_and_projection(point).0
    }

    /// Computes both the signed distance from `point` to this mesh and the
    /// projection backing it, with a single traversal of the acceleration
    /// structure.
    pub fn signed_distance_and_projection(
        &self,
        point: &Point<Real>,
    ) -> (Real, PointProjection) {
        let proj = self.project_point(point);
        let dist = na::distance(&proj.point, point);

        let pseudo_normal = match proj.location {
            TrianglePointLocation::OnFace(_) => *self.face_normals[proj.face as usize],
            TrianglePointLocation::OnEdge(e, _) => {
                self.pseudo_normals.edges_pseudo_normal[proj.face as usize][e as usize]
            }
            TrianglePointLocation::OnVertex(k) => {
                let vid = self.indices[proj.face as usize][k as usize];
                self.pseudo_normals.vertices_pseudo_normal[vid as usize]
            }
        };

        if (point - proj.point).dot(&pseudo_normal) < 0.0 {
            (-dist, proj)
        } else {
            (dist, proj)
        }
    }
}
