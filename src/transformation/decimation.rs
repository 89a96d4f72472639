//! Mesh simplification by shortest-edge collapse.

use crate::math::{Point, Real, Vector, DEFAULT_EPSILON};
use crate::shape::{TriMesh, Triangle};
use crate::utils::{SortedPair, WeightedValue};

use smallvec::SmallVec;
use std::collections::BinaryHeap;

/// A face of a decimated mesh, remembering the face it originates from.
#[derive(Clone, Debug)]
pub struct DecimatedFace {
    /// The simplified triangle.
    pub triangle: Triangle,
    /// The index, in the source mesh, of the face this triangle descends from.
    ///
    /// Collapses only ever remove faces, so a surviving face keeps the index
    /// it had in the source mesh.
    pub birth_face: u32,
}

/// Simplifies a mesh down to at most `budget` faces by collapsing its
/// shortest edges first, moving the merged vertex to the edge midpoint.
///
/// A collapse is rejected when it would pinch the surface (link condition) or
/// flip or degenerate an incident face. The budget may therefore not be
/// reached on meshes with no remaining valid collapse; the surviving faces
/// are returned in that case.
pub fn decimate_to_face_budget(mesh: &TriMesh, budget: usize) -> Vec<DecimatedFace> {
    let mut positions = mesh.vertices().to_vec();
    let mut faces: Vec<[u32; 3]> = mesh.indices().to_vec();
    let mut alive = vec![true; faces.len()];
    let mut alive_count = faces.len();

    let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); positions.len()];
    for (fid, idx) in faces.iter().enumerate() {
        for vid in idx {
            vertex_faces[*vid as usize].push(fid as u32);
        }
    }

    // Queue entries go stale as vertices merge and move; they are lazily
    // re-validated when popped. Costs are negated since `BinaryHeap` pops the
    // maximum.
    let mut queue = BinaryHeap::new();
    let mut merged: Vec<u32> = (0..positions.len() as u32).collect();

    if alive_count > budget {
        for idx in &faces {
            for k in 0..3 {
                let pair = SortedPair::new(idx[k], idx[(k + 1) % 3]);
                let (e1, e2) = *pair;
                let length =
                    na::distance_squared(&positions[e1 as usize], &positions[e2 as usize]);
                queue.push(WeightedValue::new(pair, -length));
            }
        }
    }

    while alive_count > budget {
        let Some(entry) = queue.pop() else { break };

        let (q1, q2) = *entry.value;
        let v1 = resolve(&mut merged, q1);
        let v2 = resolve(&mut merged, q2);
        if v1 == v2 {
            continue;
        }

        let length = na::distance_squared(&positions[v1 as usize], &positions[v2 as usize]);
        if (length + entry.cost).abs() > length.max(-entry.cost) * 1.0e-12 {
            // The edge moved since it was queued; re-rank it.
            queue.push(WeightedValue::new(SortedPair::new(v1, v2), -length));
            continue;
        }

        // Faces containing the full edge die with the collapse.
        let mut dying: SmallVec<[u32; 2]> = SmallVec::new();
        for fid in &vertex_faces[v1 as usize] {
            if alive[*fid as usize] {
                let idx = faces[*fid as usize];
                if idx.contains(&v1) && idx.contains(&v2) && !dying.contains(fid) {
                    dying.push(*fid);
                }
            }
        }
        if dying.is_empty() {
            continue;
        }

        if !link_condition_holds(&faces, &alive, &vertex_faces, v1, v2, &dying) {
            continue;
        }

        let midpoint = na::center(&positions[v1 as usize], &positions[v2 as usize]);
        if !collapse_keeps_faces_valid(
            &positions,
            &faces,
            &alive,
            &vertex_faces,
            v1,
            v2,
            &dying,
            &midpoint,
        ) {
            continue;
        }

        // Commit: merge `v2` into `v1` at the midpoint.
        positions[v1 as usize] = midpoint;
        for fid in &dying {
            alive[*fid as usize] = false;
        }
        alive_count -= dying.len();

        let v2_faces = std::mem::take(&mut vertex_faces[v2 as usize]);
        for fid in v2_faces {
            if alive[fid as usize] {
                for vid in faces[fid as usize].iter_mut() {
                    if *vid == v2 {
                        *vid = v1;
                    }
                }
                vertex_faces[v1 as usize].push(fid);
            }
        }
        merged[v2 as usize] = v1;

        // The star of the merged vertex changed; re-rank its edges.
        for fid in vertex_faces[v1 as usize].clone() {
            if alive[fid as usize] && faces[fid as usize].contains(&v1) {
                let idx = faces[fid as usize];
                for k in 0..3 {
                    let pair = SortedPair::new(idx[k], idx[(k + 1) % 3]);
                    let (e1, e2) = *pair;
                    let length = na::distance_squared(
                        &positions[e1 as usize],
                        &positions[e2 as usize],
                    );
                    queue.push(WeightedValue::new(pair, -length));
                }
            }
        }
    }

    faces
        .iter()
        .enumerate()
        .filter(|(fid, _)| alive[*fid])
        .map(|(fid, idx)| DecimatedFace {
            triangle: Triangle::new(
                positions[idx[0] as usize],
                positions[idx[1] as usize],
                positions[idx[2] as usize],
            ),
            birth_face: fid as u32,
        })
        .collect()
}

fn resolve(merged: &mut [u32], vid: u32) -> u32 {
    let mut root = vid;
    while merged[root as usize] != root {
        root = merged[root as usize];
    }

    let mut curr = vid;
    while merged[curr as usize] != root {
        let next = merged[curr as usize];
        merged[curr as usize] = root;
        curr = next;
    }

    root
}

fn star_neighbors(
    faces: &[[u32; 3]],
    alive: &[bool],
    vertex_faces: &[Vec<u32>],
    vid: u32,
) -> SmallVec<[u32; 8]> {
    let mut neighbors: SmallVec<[u32; 8]> = SmallVec::new();
    for fid in &vertex_faces[vid as usize] {
        if alive[*fid as usize] && faces[*fid as usize].contains(&vid) {
            for other in faces[*fid as usize] {
                if other != vid && !neighbors.contains(&other) {
                    neighbors.push(other);
                }
            }
        }
    }
    neighbors
}

// The collapse pinches the surface unless the vertices adjacent to both
// endpoints are exactly the vertices opposite the dying faces.
fn link_condition_holds(
    faces: &[[u32; 3]],
    alive: &[bool],
    vertex_faces: &[Vec<u32>],
    v1: u32,
    v2: u32,
    dying: &[u32],
) -> bool {
    let neighbors1 = star_neighbors(faces, alive, vertex_faces, v1);
    let neighbors2 = star_neighbors(faces, alive, vertex_faces, v2);

    let mut common: SmallVec<[u32; 8]> = SmallVec::new();
    for vid in &neighbors1 {
        if neighbors2.contains(vid) {
            common.push(*vid);
        }
    }

    let mut opposites: SmallVec<[u32; 2]> = SmallVec::new();
    for fid in dying {
        for vid in faces[*fid as usize] {
            if vid != v1 && vid != v2 && !opposites.contains(&vid) {
                opposites.push(vid);
            }
        }
    }

    common.len() == opposites.len() && common.iter().all(|vid| opposites.contains(vid))
}

#[allow(clippy::too_many_arguments)]
fn collapse_keeps_faces_valid(
    positions: &[Point<Real>],
    faces: &[[u32; 3]],
    alive: &[bool],
    vertex_faces: &[Vec<u32>],
    v1: u32,
    v2: u32,
    dying: &[u32],
    midpoint: &Point<Real>,
) -> bool {
    let moved_position = |vid: u32| {
        if vid == v1 || vid == v2 {
            *midpoint
        } else {
            positions[vid as usize]
        }
    };
    let scaled_normal = |a: Point<Real>, b: Point<Real>, c: Point<Real>| -> Vector<Real> {
        (b - a).cross(&(c - a))
    };

    for endpoint in [v1, v2] {
        for fid in &vertex_faces[endpoint as usize] {
            if !alive[*fid as usize]
                || dying.contains(fid)
                || !faces[*fid as usize].contains(&endpoint)
            {
                continue;
            }

            let idx = faces[*fid as usize];
            let old_normal = scaled_normal(
                positions[idx[0] as usize],
                positions[idx[1] as usize],
                positions[idx[2] as usize],
            );
            let new_normal = scaled_normal(
                moved_position(idx[0]),
                moved_position(idx[1]),
                moved_position(idx[2]),
            );

            if new_normal.norm_squared() <= DEFAULT_EPSILON
                || old_normal.dot(&new_normal) <= 0.0
            {
                return false;
            }
        }
    }

    true
}
