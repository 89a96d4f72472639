//! Extrusion boxes and ordered box collections.

use crate::bounding_volume::Aabb;
use crate::decomposition::direction::{Axis, Target};
use crate::math::{ExtentsVector, Matrix, Point, Real, Rotation};
use crate::shape::Triangle;

/// One of the six extent parameters of a box: an axis and which end of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Extent {
    /// The lower bound along an axis.
    Min(Axis),
    /// The upper bound along an axis.
    Max(Axis),
}

impl Extent {
    /// The six extents, in gradient order: the three minima, then the three
    /// maxima.
    pub const ALL: [Extent; 6] = [
        Extent::Min(Axis::X),
        Extent::Min(Axis::Y),
        Extent::Min(Axis::Z),
        Extent::Max(Axis::X),
        Extent::Max(Axis::Y),
        Extent::Max(Axis::Z),
    ];

    /// The position of this extent in gradient vectors.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Extent::Min(axis) => axis.index(),
            Extent::Max(axis) => 3 + axis.index(),
        }
    }

    /// The axis this extent bounds.
    #[inline]
    pub fn axis(self) -> Axis {
        match self {
            Extent::Min(axis) | Extent::Max(axis) => axis,
        }
    }
}

/// An extrusion box.
///
/// The box is axis-aligned in its own frame: the frame of the solid rotated
/// by `rotation`. Its three constraint points are the vertices of the seed
/// triangle it was grown from; growth re-expands the box around them so the
/// seed face can never escape it. The target direction identifies the
/// extrusion the box is meant for.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct Box3 {
    min: Point<Real>,
    max: Point<Real>,
    rotation: Rotation<Real>,
    constraints: [Point<Real>; 3],
    target: Target,
    id: u32,
    covered_faces: Vec<u32>,
}

impl Box3 {
    /// Creates a box from its two extremal corners, expressed in the frame of
    /// the solid rotated by `rotation`.
    pub fn new(
        min: Point<Real>,
        max: Point<Real>,
        rotation: Rotation<Real>,
        target: Target,
    ) -> Box3 {
        debug_assert!(na::partial_le(&min, &max));
        let center = na::center(&min, &max);
        Box3 {
            min,
            max,
            rotation,
            constraints: [center; 3],
            target,
            id: 0,
            covered_faces: Vec::new(),
        }
    }

    /// Seeds a box on a triangle expressed in the rotated frame.
    ///
    /// The flat triangle Aabb is thickened by `inflate` and pushed into the
    /// solid, away from the target direction, so the optimizer starts from a
    /// volume straddling the surface. The triangle vertices become the box
    /// constraints.
    pub fn from_triangle(
        triangle: &Triangle,
        rotation: Rotation<Real>,
        target: Target,
        inflate: Real,
    ) -> Box3 {
        let aabb = triangle.local_aabb();
        let mut min = aabb.mins;
        let mut max = aabb.maxs;
        let direction = target.direction();

        for axis in Axis::ALL {
            let k = axis.index();
            min[k] -= inflate * 0.5;
            max[k] += inflate * 0.5;
            if direction[k] > 0.0 {
                min[k] -= inflate;
            } else if direction[k] < 0.0 {
                max[k] += inflate;
            }
        }

        Box3 {
            min,
            max,
            rotation,
            constraints: [triangle.a, triangle.b, triangle.c],
            target,
            id: 0,
            covered_faces: Vec::new(),
        }
    }

    /// The corner with the smallest coordinates, in the box frame.
    #[inline]
    pub fn min(&self) -> Point<Real> {
        self.min
    }

    /// The corner with the greatest coordinates, in the box frame.
    #[inline]
    pub fn max(&self) -> Point<Real> {
        self.max
    }

    /// The rotation mapping the solid's frame to this box's frame.
    #[inline]
    pub fn rotation(&self) -> Rotation<Real> {
        self.rotation
    }

    /// The extrusion target of this box.
    #[inline]
    pub fn target(&self) -> Target {
        self.target
    }

    /// The identifier assigned by the engine that grew this box.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sets the identifier of this box.
    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    /// The three points this box is pinned around.
    #[inline]
    pub fn constraints(&self) -> &[Point<Real>; 3] {
        &self.constraints
    }

    /// Replaces the three pinning points.
    pub fn set_constraints(&mut self, constraints: [Point<Real>; 3]) {
        self.constraints = constraints;
    }

    /// The faces of the full-resolution surface fully contained in this box,
    /// sorted by id.
    #[inline]
    pub fn covered_faces(&self) -> &[u32] {
        &self.covered_faces
    }

    /// Replaces the covered-face set. The ids are kept sorted and unique.
    pub fn set_covered_faces(&mut self, mut faces: Vec<u32>) {
        faces.sort_unstable();
        faces.dedup();
        self.covered_faces = faces;
    }

    /// The center of this box, in the box frame.
    pub fn center(&self) -> Point<Real> {
        na::center(&self.min, &self.max)
    }

    /// The volume of this box.
    pub fn volume(&self) -> Real {
        let extents = self.max - self.min;
        extents.x * extents.y * extents.z
    }

    /// This box as an Aabb of its own frame.
    pub fn local_aabb(&self) -> Aabb {
        Aabb::new(self.min, self.max)
    }

    /// Tests if a point of the box frame lies inside this box.
    pub fn contains_local_point(&self, point: &Point<Real>) -> bool {
        na::partial_le(&self.min, point) && na::partial_ge(&self.max, point)
    }

    /// Tests if a triangle of the box frame lies fully inside this box.
    pub fn contains_triangle(&self, triangle: &Triangle) -> bool {
        triangle
            .vertices()
            .iter()
            .all(|pt| self.contains_local_point(pt))
    }

    /// The six extents as a vector, in [`Extent::ALL`] order.
    pub fn extents_vector(&self) -> ExtentsVector<Real> {
        ExtentsVector::new(
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        )
    }

    /// Replaces the six extents. An inverted axis collapses to its midpoint
    /// so the ordering invariant holds no matter the input.
    pub fn set_extents_vector(&mut self, extents: &ExtentsVector<Real>) {
        for axis in Axis::ALL {
            let k = axis.index();
            let mut lo = extents[k];
            let mut hi = extents[3 + k];
            if lo > hi {
                let mid = (lo + hi) * 0.5;
                lo = mid;
                hi = mid;
            }
            self.min[k] = lo;
            self.max[k] = hi;
        }
    }

    /// Moves one extent by `amount`, clamping at the opposite extent so the
    /// ordering invariant holds.
    pub fn adjust_extent(&mut self, extent: Extent, amount: Real) {
        let k = extent.axis().index();
        match extent {
            Extent::Min(_) => self.min[k] = (self.min[k] + amount).min(self.max[k]),
            Extent::Max(_) => self.max[k] = (self.max[k] + amount).max(self.min[k]),
        }
    }

    /// Moves one constraint point along an axis.
    pub fn adjust_constraint(&mut self, index: usize, axis: Axis, amount: Real) {
        self.constraints[index][axis.index()] += amount;
    }

    /// Re-expands the extents so every constraint point lies inside the box.
    pub fn enclose_constraints(&mut self) {
        for point in &self.constraints {
            for k in 0..3 {
                self.min[k] = self.min[k].min(point[k]);
                self.max[k] = self.max[k].max(point[k]);
            }
        }
    }

    /// Clamps the extents inside the given bounds.
    pub fn clamp_extents_to(&mut self, bounds: &Aabb) {
        for k in 0..3 {
            self.min[k] = self.min[k].clamp(bounds.mins[k], bounds.maxs[k]);
            self.max[k] = self.max[k].clamp(bounds.mins[k], bounds.maxs[k]);
        }
    }

    /// Checks the structural invariant: finite ordered extents and an
    /// orthonormal rotation.
    pub fn is_valid(&self) -> bool {
        let finite = self
            .min
            .iter()
            .chain(self.max.iter())
            .all(|x| x.is_finite());
        let rot = self.rotation.to_rotation_matrix().into_inner();
        let orthonormal = (rot.transpose() * rot - Matrix::identity()).norm() <= 1.0e-7;

        finite && na::partial_le(&self.min, &self.max) && orthonormal
    }
}

/// An ordered collection of boxes.
///
/// The order is insertion order; downstream passes address and process boxes
/// by their index in it.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct BoxList {
    boxes: Vec<Box3>,
}

impl BoxList {
    /// Creates an empty list.
    pub fn new() -> BoxList {
        BoxList::default()
    }

    /// Appends a box at the end of the list.
    pub fn push(&mut self, item: Box3) {
        self.boxes.push(item);
    }

    /// The number of boxes in the list.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Tests if the list holds no box.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// The box at the given index.
    pub fn get(&self, index: usize) -> Option<&Box3> {
        self.boxes.get(index)
    }

    /// Mutable access to the box at the given index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Box3> {
        self.boxes.get_mut(index)
    }

    /// Replaces the box at the given index.
    pub fn set(&mut self, index: usize, item: Box3) {
        self.boxes[index] = item;
    }

    /// Inserts a box at the given index, shifting the following ones.
    pub fn insert(&mut self, index: usize, item: Box3) {
        self.boxes.insert(index, item);
    }

    /// Removes the box at the given index, shifting the following ones.
    pub fn remove(&mut self, index: usize) -> Box3 {
        self.boxes.remove(index)
    }

    /// Iterates through the boxes in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Box3> {
        self.boxes.iter()
    }

    /// Iterates mutably through the boxes in insertion order.
    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = &mut Box3> {
        self.boxes.iter_mut()
    }

    /// Reorders the boxes by decreasing volume. Equal volumes keep their
    /// insertion order.
    pub fn sort_decreasing_volume(&mut self) {
        self.boxes.sort_by(|b1, b2| {
            b2.volume()
                .partial_cmp(&b1.volume())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

impl std::ops::Index<usize> for BoxList {
    type Output = Box3;

    fn index(&self, index: usize) -> &Box3 {
        &self.boxes[index]
    }
}
