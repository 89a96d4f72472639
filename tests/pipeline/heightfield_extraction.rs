use quarry3d::bounding_volume::Aabb;
use quarry3d::decomposition::{
    prune_redundant_boxes, AabbBooleanKernel, CoverageEngine, DecompositionParameters,
    HeightfieldExtractor,
};
use quarry3d::math::{Point, Real};
use quarry3d::shape::TriMesh;

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

fn total_volume(bricks: &[Aabb]) -> Real {
    bricks.iter().map(Aabb::volume).sum()
}

fn pruned_cube_boxes(
    cube: &TriMesh,
    params: DecompositionParameters,
) -> quarry3d::decomposition::BoxList {
    let engine = CoverageEngine::new(params).unwrap();
    let decomposition = engine.decompose(cube).unwrap();
    assert!(decomposition.is_complete());

    let mut all = decomposition.all_boxes();
    prune_redundant_boxes(&mut all, decomposition.total_faces());
    all
}

#[test]
fn extracted_pieces_rebuild_the_cube_volume() {
    let cube = unit_cube();
    let params = DecompositionParameters {
        orientations: 1,
        ..DecompositionParameters::default()
    };
    let mut boxes = pruned_cube_boxes(&cube, params);
    let pruned = boxes.len();

    let mut extractor = HeightfieldExtractor::new(AabbBooleanKernel, &cube).unwrap();
    let pieces = extractor.extract(&mut boxes);

    // The first claim rests short of the far surface, the second finishes the
    // remainder, and the empty base complex turns the rest of the list away.
    assert_eq!(pieces.len(), 2);
    assert_eq!(boxes.len(), pieces.len());
    assert!(pieces.len() < pruned);

    for (index, piece) in pieces.iter().enumerate() {
        let item = boxes.get(index).unwrap();
        assert_eq!(piece.box_id(), item.id());
        assert_eq!(piece.target(), item.target());
        // Cube normals snap to the six axis-aligned targets.
        assert!(piece.target().label() < 6);
        assert!(total_volume(piece.solid()) > 0.0);
    }

    let claimed: Real = pieces.iter().map(|piece| total_volume(piece.solid())).sum();
    let leftover = total_volume(extractor.base_complex());
    assert!(relative_eq!(claimed + leftover, 1.0, max_relative = 1.0e-9));
    assert_eq!(leftover, 0.0);
}

#[test]
fn stick_keeps_surface_contributing_pieces() {
    let cube = unit_cube();
    let params = DecompositionParameters {
        orientations: 1,
        ..DecompositionParameters::default()
    };
    let mut boxes = pruned_cube_boxes(&cube, params);

    let mut extractor = HeightfieldExtractor::new(AabbBooleanKernel, &cube).unwrap();
    let mut pieces = extractor.extract(&mut boxes);
    let extracted = pieces.len();
    let leftover = total_volume(extractor.base_complex());

    extractor.stick(&mut pieces, &mut boxes);

    // Every extracted piece keeps a vertex on the cube surface, so nothing is
    // absorbed back into the base complex.
    assert_eq!(pieces.len(), extracted);
    assert_eq!(boxes.len(), extracted);
    assert_eq!(total_volume(extractor.base_complex()), leftover);
}

#[test]
fn a_heightfield_decomposition_claims_the_cube_in_one_piece() {
    let cube = unit_cube();
    let params = DecompositionParameters {
        orientations: 1,
        heightfield_mode: true,
        only_nearest_target: true,
        ..DecompositionParameters::default()
    };
    let mut boxes = pruned_cube_boxes(&cube, params);

    // Free borders let every grown box blow through the sides it does not
    // save, so each one swallows the whole cube and pruning keeps a single
    // representative.
    assert_eq!(boxes.len(), 1);

    let mut extractor = HeightfieldExtractor::new(AabbBooleanKernel, &cube).unwrap();
    let pieces = extractor.extract(&mut boxes);

    assert_eq!(pieces.len(), 1);
    assert_eq!(boxes.len(), 1);

    let piece = pieces.get(0).unwrap();
    assert_eq!(piece.box_id(), boxes.get(0).unwrap().id());
    assert!(relative_eq!(
        total_volume(piece.solid()),
        1.0,
        max_relative = 1.0e-9
    ));
    assert_eq!(total_volume(extractor.base_complex()), 0.0);
}
