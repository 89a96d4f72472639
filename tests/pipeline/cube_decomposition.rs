use quarry3d::decomposition::{
    prune_redundant_boxes, CombinationKey, CoverageEngine, DecompositionParameters,
};
use quarry3d::math::{Point, Real};
use quarry3d::shape::TriMesh;
use std::collections::BTreeSet;

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

fn covered_union(boxes: &quarry3d::decomposition::BoxList) -> BTreeSet<u32> {
    boxes
        .iter()
        .flat_map(|item| item.covered_faces().iter().copied())
        .collect()
}

#[test]
fn a_unit_cube_is_covered_in_a_single_pass() {
    let params = DecompositionParameters {
        orientations: 1,
        ..DecompositionParameters::default()
    };
    let engine = CoverageEngine::new(params).unwrap();
    let decomposition = engine.decompose(&unit_cube()).unwrap();

    assert!(decomposition.is_complete());
    assert_eq!(decomposition.total_faces(), 12);
    assert_eq!(decomposition.covered_faces(), (0..12).collect::<Vec<u32>>());

    // One orientation without heightfield targets yields a single combination,
    // and its grid spans the cube at the default 0.2 spacing.
    let key = CombinationKey {
        orientation: 0,
        target: None,
    };
    let combination = decomposition.combination(&key).unwrap();
    assert_eq!(combination.grid.resolution(), [6, 6, 6]);
    assert_eq!(decomposition.combinations().len(), 1);

    let all = decomposition.all_boxes();
    assert!(!all.is_empty());
    assert!(all.len() <= 12);
    for item in all.iter() {
        assert!(item.is_valid());
        assert!(!item.covered_faces().is_empty());
    }
}

#[test]
fn pruning_keeps_the_cube_fully_covered() {
    let params = DecompositionParameters {
        orientations: 1,
        ..DecompositionParameters::default()
    };
    let engine = CoverageEngine::new(params).unwrap();
    let decomposition = engine.decompose(&unit_cube()).unwrap();

    let mut all = decomposition.all_boxes();
    let before = all.len();
    prune_redundant_boxes(&mut all, decomposition.total_faces());

    assert!(all.len() <= before);
    // One box per cube side survives: the two seeds of a side grow into the
    // same slab and cover the same pair of triangles, so one of them is
    // always redundant while the survivor keeps both triangles to itself.
    assert_eq!(all.len(), 6);
    assert_eq!(covered_union(&all).len(), 12);

    // Every surviving box keeps at least one face no other box covers.
    let mut counts = vec![0u32; decomposition.total_faces()];
    for item in all.iter() {
        for face in item.covered_faces() {
            counts[*face as usize] += 1;
        }
    }
    for item in all.iter() {
        assert!(item
            .covered_faces()
            .iter()
            .any(|face| counts[*face as usize] == 1));
    }
}

#[test]
fn grown_boxes_stay_inside_the_sampled_volume() {
    let params = DecompositionParameters {
        orientations: 1,
        ..DecompositionParameters::default()
    };
    let engine = CoverageEngine::new(params).unwrap();
    let decomposition = engine.decompose(&unit_cube()).unwrap();

    let key = CombinationKey {
        orientation: 0,
        target: None,
    };
    let combination = decomposition.combination(&key).unwrap();
    let bounds = combination.grid.aabb().loosened(1.0e-9);

    for item in combination.boxes.iter() {
        assert!(bounds.contains(&item.local_aabb()));
    }
}

#[test]
fn four_orientations_still_cover_every_face() {
    let engine = CoverageEngine::new(DecompositionParameters::default()).unwrap();
    let decomposition = engine.decompose(&unit_cube()).unwrap();

    assert!(decomposition.is_complete());
    assert_eq!(decomposition.combinations().len(), 4);

    let all = decomposition.all_boxes();
    let covered: BTreeSet<u32> = covered_union(&all);
    assert_eq!(covered.len(), 12);

    let volume: Real = all.iter().map(|item| item.volume()).sum();
    assert!(volume > 0.0);
}
