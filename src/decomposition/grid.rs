//! Signed-distance and weight sampling on a regular node lattice.

use crate::bounding_volume::Aabb;
use crate::decomposition::classify::FaceClassification;
use crate::decomposition::direction::Target;
use crate::decomposition::error::DecompositionError;
use crate::decomposition::parameters::DecompositionParameters;
use crate::decomposition::tricubic;
use crate::math::{Point, Real, Vector};
use crate::shape::TriMesh;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Weight of a node a box can cross for free.
pub const MIN_PAY: Real = 0.0;
/// Weight of a node a box should not cross.
pub const MAX_PAY: Real = 1.0;

/// Scale applied to the weights of nodes whose nearest face is neither saved
/// nor protected, letting boxes extrude through them.
pub(crate) const FREE_BORDER_SCALE: Real = 0.5;
/// Stored distances are clamped to this many kernel widths on reset.
const DISTANCE_CLAMP_FACTOR: Real = 10.0;

/// A regular grid of signed distances and crossing weights sampled from a
/// closed surface.
///
/// Nodes are spaced `spacing` apart along each axis, starting at the minimum
/// corner of the surface bounds. Each node stores the signed distance to the
/// surface (negative inside) and a weight in `[MIN_PAY, MAX_PAY]` telling the
/// box optimizer how expensive crossing that node is. Values between nodes
/// come from tricubic interpolation.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct SignedDistanceGrid {
    resolution: [usize; 3],
    origin: Point<Real>,
    spacing: Real,
    kernel_distance: Real,
    distances: Vec<Real>,
    weights: Vec<Real>,
    aabb: Aabb,
    target: Option<Target>,
}

impl SignedDistanceGrid {
    /// Samples a grid over `mesh`.
    ///
    /// The node count along each axis is `ceil(extent / spacing) + 1`, so the
    /// lattice always spans the full surface bounds. When
    /// `params.heightfield_mode` is set and a target is given, nodes whose
    /// nearest face is not in `classification`'s saved set get their weight
    /// scaled down: boxes extruding along the target may grow through those
    /// borders, while saved borders keep their full price.
    pub fn build(
        mesh: &TriMesh,
        params: &DecompositionParameters,
        target: Option<Target>,
        classification: Option<&FaceClassification>,
    ) -> Result<Self, DecompositionError> {
        params.validate()?;

        let bounds = mesh.local_aabb();
        let extents = bounds.extents();
        let origin = bounds.mins;
        let spacing = params.spacing;
        let kernel_distance = params.kernel_distance;

        let mut resolution = [0; 3];
        for a in 0..3 {
            resolution[a] = (extents[a] / spacing).ceil() as usize + 1;
        }

        let span = Vector::new(
            (resolution[0] - 1) as Real,
            (resolution[1] - 1) as Real,
            (resolution[2] - 1) as Real,
        ) * spacing;
        let aabb = Aabb::new(origin, origin + span);

        log::debug!(
            "sampling a {}x{}x{} signed-distance grid (target: {:?})",
            resolution[0],
            resolution[1],
            resolution[2],
            target
        );

        let mut nodes = Vec::with_capacity(resolution[0] * resolution[1] * resolution[2]);
        for i in 0..resolution[0] {
            for j in 0..resolution[1] {
                for k in 0..resolution[2] {
                    nodes.push(origin + Vector::new(i as Real, j as Real, k as Real) * spacing);
                }
            }
        }

        #[cfg(not(feature = "parallel"))]
        let node_iter = nodes.iter();
        #[cfg(feature = "parallel")]
        let node_iter = nodes.par_iter();

        let samples: Vec<(Real, u32)> = node_iter
            .map(|node| {
                let (distance, proj) = mesh.signed_distance_and_projection(node);
                (distance, proj.face)
            })
            .collect();

        let heightfield = params.heightfield_mode && target.is_some();
        let mut distances = Vec::with_capacity(samples.len());
        let mut weights = Vec::with_capacity(samples.len());

        for (distance, nearest_face) in samples {
            let mut weight = crossing_weight(distance, kernel_distance);

            if heightfield {
                let saved = classification
                    .map_or(false, |classes| classes.saved.contains(&nearest_face));
                if !saved {
                    weight = MIN_PAY + (weight - MIN_PAY) * FREE_BORDER_SCALE;
                }
            }

            distances.push(distance);
            weights.push(weight);
        }

        Ok(SignedDistanceGrid {
            resolution,
            origin,
            spacing,
            kernel_distance,
            distances,
            weights,
            aabb,
            target,
        })
    }

    /// The number of nodes along each axis.
    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    /// The distance between two neighbor nodes.
    pub fn spacing(&self) -> Real {
        self.spacing
    }

    /// The kernel half-width this grid was sampled with.
    pub fn kernel_distance(&self) -> Real {
        self.kernel_distance
    }

    /// The region spanned by the node lattice. It always contains the surface
    /// bounds the grid was built from.
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// The extrusion target this grid was weighted for, if any.
    pub fn target(&self) -> Option<Target> {
        self.target
    }

    /// The position of the node `(i, j, k)`.
    pub fn node_point(&self, i: usize, j: usize, k: usize) -> Point<Real> {
        self.origin + Vector::new(i as Real, j as Real, k as Real) * self.spacing
    }

    /// The signed distance stored at the node `(i, j, k)`.
    pub fn distance_at(&self, i: usize, j: usize, k: usize) -> Real {
        self.distances[self.node_id(i, j, k)]
    }

    /// The crossing weight stored at the node `(i, j, k)`.
    pub fn weight_at(&self, i: usize, j: usize, k: usize) -> Real {
        self.weights[self.node_id(i, j, k)]
    }

    /// Whether the node `(i, j, k)` lies in the kernel: deeper inside the
    /// solid than the kernel distance.
    pub fn is_kernel_node(&self, i: usize, j: usize, k: usize) -> bool {
        self.distance_at(i, j, k) < -self.kernel_distance
    }

    /// The tricubically interpolated signed distance and weight at `point`.
    ///
    /// Points outside the lattice are clamped onto its boundary first.
    pub fn interpolate(&self, point: &Point<Real>) -> (Real, Real) {
        let (cell, t) = self.locate(point);
        let distance = tricubic::interpolate(&self.stencil(&self.distances, cell), &t);
        let weight = tricubic::interpolate(&self.stencil(&self.weights, cell), &t);
        (distance, weight)
    }

    /// Clamps stored distances to a fixed multiple of the kernel distance and
    /// remaps the weights linearly onto `[MIN_PAY, MAX_PAY]`, so that kernel
    /// thresholding and weight comparisons stay meaningful after the grid has
    /// been rescaled or combined.
    pub fn reset_signed_distances(&mut self) {
        let bound = DISTANCE_CLAMP_FACTOR * self.kernel_distance;
        for distance in &mut self.distances {
            *distance = distance.clamp(-bound, bound);
        }

        let mut lowest = Real::MAX;
        let mut highest = -Real::MAX;
        for weight in &self.weights {
            lowest = lowest.min(*weight);
            highest = highest.max(*weight);
        }

        if highest - lowest > crate::math::DEFAULT_EPSILON {
            let scale = (MAX_PAY - MIN_PAY) / (highest - lowest);
            for weight in &mut self.weights {
                *weight = MIN_PAY + (*weight - lowest) * scale;
            }
        } else {
            for weight in &mut self.weights {
                *weight = MIN_PAY;
            }
        }
    }

    fn node_id(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.resolution[1] + j) * self.resolution[2] + k
    }

    // The cell containing `point` and the parameter of the point inside it.
    fn locate(&self, point: &Point<Real>) -> ([usize; 3], Vector<Real>) {
        let mut cell = [0; 3];
        let mut t = Vector::zeros();

        for a in 0..3 {
            let local = ((point[a] - self.origin[a]) / self.spacing)
                .clamp(0.0, (self.resolution[a] - 1) as Real);
            let base = (local.floor() as usize).min(self.resolution[a] - 2);
            cell[a] = base;
            t[a] = (local - base as Real).clamp(0.0, 1.0);
        }

        (cell, t)
    }

    // The 4x4x4 sample block around `cell`, with indices clamped onto the
    // lattice so border cells reuse their edge samples.
    fn stencil(&self, values: &[Real], cell: [usize; 3]) -> [[[Real; 4]; 4]; 4] {
        let mut stencil = [[[0.0; 4]; 4]; 4];

        for (di, plane) in stencil.iter_mut().enumerate() {
            let i = clamped_node(cell[0], di, self.resolution[0]);
            for (dj, row) in plane.iter_mut().enumerate() {
                let j = clamped_node(cell[1], dj, self.resolution[1]);
                for (dk, value) in row.iter_mut().enumerate() {
                    let k = clamped_node(cell[2], dk, self.resolution[2]);
                    *value = values[self.node_id(i, j, k)];
                }
            }
        }

        stencil
    }
}

// Maps a signed distance to a crossing weight: nodes deeper than the kernel
// distance are free, nodes on or outside the surface pay the full price, and
// the band in between ramps smoothly.
fn crossing_weight(distance: Real, kernel_distance: Real) -> Real {
    let t = ((distance + kernel_distance) / kernel_distance).clamp(0.0, 1.0);
    let smooth = t * t * (3.0 - 2.0 * t);
    MIN_PAY + (MAX_PAY - MIN_PAY) * smooth
}

fn clamped_node(base: usize, offset: usize, resolution: usize) -> usize {
    (base as isize + offset as isize - 1).clamp(0, resolution as isize - 1) as usize
}

#[cfg(test)]
mod test {
    use super::{SignedDistanceGrid, MAX_PAY, MIN_PAY};
    use crate::decomposition::classify::classify_faces;
    use crate::decomposition::direction::Target;
    use crate::decomposition::error::DecompositionError;
    use crate::decomposition::parameters::DecompositionParameters;
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

    fn cube_parameters() -> DecompositionParameters {
        DecompositionParameters {
            kernel_distance: 0.1,
            spacing: 0.2,
            ..DecompositionParameters::default()
        }
    }

    #[test]
    fn the_lattice_spans_the_surface_bounds() {
        let grid = SignedDistanceGrid::build(&unit_cube(), &cube_parameters(), None, None).unwrap();

        assert_eq!(grid.resolution(), [6, 6, 6]);
        assert!(relative_eq!(grid.aabb().mins.coords.norm(), 0.0, epsilon = 1.0e-9));
        assert!(relative_eq!(grid.aabb().maxs.x, 1.0, epsilon = 1.0e-9));
        assert!(relative_eq!(grid.aabb().maxs.y, 1.0, epsilon = 1.0e-9));
        assert!(relative_eq!(grid.aabb().maxs.z, 1.0, epsilon = 1.0e-9));
    }

    #[test]
    fn kernel_nodes_are_free_and_surface_nodes_pay_full_price() {
        let grid = SignedDistanceGrid::build(&unit_cube(), &cube_parameters(), None, None).unwrap();

        // (0.4, 0.4, 0.4) is 0.4 inside the cube, well past the kernel edge.
        assert!(grid.is_kernel_node(2, 2, 2));
        assert!(relative_eq!(grid.distance_at(2, 2, 2), -0.4, epsilon = 1.0e-9));
        assert!(relative_eq!(grid.weight_at(2, 2, 2), MIN_PAY, epsilon = 1.0e-9));

        // (0.0, 0.4, 0.4) sits exactly on the surface.
        assert!(!grid.is_kernel_node(0, 2, 2));
        assert!(relative_eq!(grid.distance_at(0, 2, 2), 0.0, epsilon = 1.0e-9));
        assert!(relative_eq!(grid.weight_at(0, 2, 2), MAX_PAY, epsilon = 1.0e-9));
    }

    #[test]
    fn interpolation_reproduces_node_samples() {
        let grid = SignedDistanceGrid::build(&unit_cube(), &cube_parameters(), None, None).unwrap();

        let node = grid.node_point(2, 3, 1);
        let (distance, weight) = grid.interpolate(&node);
        assert!(relative_eq!(distance, grid.distance_at(2, 3, 1), epsilon = 1.0e-9));
        assert!(relative_eq!(weight, grid.weight_at(2, 3, 1), epsilon = 1.0e-9));
    }

    #[test]
    fn interpolation_is_continuous_across_cell_borders() {
        let grid = SignedDistanceGrid::build(&unit_cube(), &cube_parameters(), None, None).unwrap();

        let before = grid.interpolate(&Point::new(0.2 - 1.0e-9, 0.3, 0.5));
        let after = grid.interpolate(&Point::new(0.2 + 1.0e-9, 0.3, 0.5));
        assert!((before.0 - after.0).abs() < 1.0e-6);
        assert!((before.1 - after.1).abs() < 1.0e-6);
    }

    #[test]
    fn saved_borders_stay_expensive_in_heightfield_mode() {
        let cube = unit_cube();
        let mut params = cube_parameters();
        params.heightfield_mode = true;

        let classes = classify_faces(&cube, Target::PLUS_Z, 0.5, 0.0);
        let grid =
            SignedDistanceGrid::build(&cube, &params, Some(Target::PLUS_Z), Some(&classes))
                .unwrap();

        // (0.0, 0.4, 0.2) projects onto a side face bordering the flipped
        // bottom, which is saved and keeps the full crossing price.
        assert!(relative_eq!(grid.weight_at(0, 2, 1), MAX_PAY, epsilon = 1.0e-9));

        // (0.4, 0.4, 1.0) projects onto the top, free to extrude through.
        assert!(relative_eq!(
            grid.weight_at(2, 2, 5),
            MIN_PAY + (MAX_PAY - MIN_PAY) * 0.5,
            epsilon = 1.0e-9
        ));
    }

    #[test]
    fn reset_keeps_values_inside_their_ranges() {
        let mut grid =
            SignedDistanceGrid::build(&unit_cube(), &cube_parameters(), None, None).unwrap();
        grid.reset_signed_distances();

        let bound = 10.0 * grid.kernel_distance();
        for i in 0..grid.resolution()[0] {
            for j in 0..grid.resolution()[1] {
                for k in 0..grid.resolution()[2] {
                    let weight = grid.weight_at(i, j, k);
                    assert!((MIN_PAY..=MAX_PAY).contains(&weight));
                    assert!(grid.distance_at(i, j, k).abs() <= bound + 1.0e-12);
                }
            }
        }

        // The cube grid already spans the full weight range, so resetting
        // leaves surface nodes at full price.
        assert!(relative_eq!(grid.weight_at(0, 2, 2), MAX_PAY, epsilon = 1.0e-9));
    }

    #[test]
    fn non_positive_spacing_is_rejected() {
        let mut params = cube_parameters();
        params.spacing = 0.0;

        let err = SignedDistanceGrid::build(&unit_cube(), &params, None, None).unwrap_err();
        assert!(matches!(err, DecompositionError::InvalidParameters { .. }));
    }
}
