//! Flipped and saved face classification against an extrusion target.

use crate::decomposition::direction::Target;
use crate::math::Real;
use crate::shape::TriMesh;

use std::collections::HashSet;
use std::f64::consts::PI;

/// The two face sets produced by [`classify_faces`].
#[derive(Clone, Debug, Default)]
pub struct FaceClassification {
    /// Faces turning away from the target: extruding along the target would
    /// lose them.
    pub flipped: HashSet<u32>,
    /// Faces bordering a flipped region. Boxes grown for the target must not
    /// swallow these borders, so grids weight them heavily.
    pub saved: HashSet<u32>,
}

/// Splits the faces of a surface into flipped and saved sets relative to an
/// extrusion target.
///
/// A face is flipped when the angle between its normal and the target exceeds
/// `angle_threshold` (normalized in `[0, 1]` and mapped to `[0, pi]` radians)
/// and its area exceeds `area_threshold`. A face is saved when it is not
/// flipped but shares an edge with a flipped face.
pub fn classify_faces(
    mesh: &TriMesh,
    target: Target,
    angle_threshold: Real,
    area_threshold: Real,
) -> FaceClassification {
    let direction = target.direction();
    let angle_limit = angle_threshold * PI;

    let mut classification = FaceClassification::default();

    for fid in 0..mesh.num_triangles() as u32 {
        let angle = mesh.face_normal(fid).angle(&direction);
        if angle > angle_limit && mesh.triangle(fid).area() > area_threshold {
            let _ = classification.flipped.insert(fid);
        }
    }

    for fid in &classification.flipped {
        for neighbor in mesh.face_adjacency(*fid) {
            if !classification.flipped.contains(&neighbor) {
                let _ = classification.saved.insert(neighbor);
            }
        }
    }

    classification
}

#[cfg(test)]
mod test {
    use super::classify_faces;
    use crate::decomposition::direction::Target;
    use crate::math::Point;
    use crate::shape::TriMesh;

    fn unit_cube() -> TriMesh {
        let vertices = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
            Point::new(1.0, 0.0, 1.0),
            Point::new(1.0, 1.0, 1.0),
            Point::new(0.0, 1.0, 1.0),
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        TriMesh::new(vertices, indices).unwrap()
    }

    #[test]
    fn bottom_faces_flip_against_the_up_target() {
        let cube = unit_cube();
        let classes = classify_faces(&cube, Target::PLUS_Z, 0.5, 0.0);

        // Faces 0 and 1 look down; side faces sit exactly at the threshold
        // and are not flipped.
        let mut flipped: Vec<u32> = classes.flipped.iter().copied().collect();
        flipped.sort_unstable();
        assert_eq!(flipped, vec![0, 1]);

        // Every saved face borders the bottom and none is flipped itself.
        assert_eq!(classes.saved.len(), 4);
        for fid in &classes.saved {
            assert!(!classes.flipped.contains(fid));
            let adjacency = cube.face_adjacency(*fid);
            assert!(adjacency.iter().any(|adj| classes.flipped.contains(adj)));
        }
    }

    #[test]
    fn the_area_threshold_filters_small_flipped_faces() {
        let cube = unit_cube();
        let classes = classify_faces(&cube, Target::PLUS_Z, 0.5, 1.0);

        assert!(classes.flipped.is_empty());
        assert!(classes.saved.is_empty());
    }
}
