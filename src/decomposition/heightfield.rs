//! Extraction of heightfield pieces by carving accepted boxes out of the
//! solid.

use crate::bounding_volume::Aabb;
use crate::decomposition::box3::{Box3, BoxList};
use crate::decomposition::direction::Target;
use crate::decomposition::error::DecompositionError;
use crate::math::{Point, Real, DEFAULT_EPSILON, DIM};
use crate::shape::TriMesh;

use smallvec::SmallVec;

/// Volume boolean operations consumed by the heightfield extractor.
///
/// Mesh booleans are an external geometry-kernel capability; the extractor
/// only relies on this seam and stays agnostic of the solid representation.
pub trait BooleanKernel {
    /// Solid representation the kernel operates on.
    type Solid: Clone;

    /// Converts a closed surface into a solid.
    fn solid_from_surface(&self, surface: &TriMesh)
        -> Result<Self::Solid, DecompositionError>;

    /// The part of `solid` lying inside the box.
    ///
    /// Fails with [`DecompositionError::EmptyIntersection`] when the box
    /// claims no volume at all.
    fn intersection(
        &self,
        solid: &Self::Solid,
        item: &Box3,
    ) -> Result<Self::Solid, DecompositionError>;

    /// The part of `solid` lying outside the box.
    fn difference(
        &self,
        solid: &Self::Solid,
        item: &Box3,
    ) -> Result<Self::Solid, DecompositionError>;

    /// Merges a previously extracted piece back into `solid`.
    fn union(
        &self,
        solid: &Self::Solid,
        piece: &Self::Solid,
    ) -> Result<Self::Solid, DecompositionError>;

    /// The boundary vertices of a solid.
    fn vertices(&self, solid: &Self::Solid) -> Vec<Point<Real>>;

    /// Whether the solid holds no volume.
    fn is_empty(&self, solid: &Self::Solid) -> bool;
}

/// Boolean kernel over solids that are unions of disjoint axis-aligned
/// bricks.
///
/// Subtraction splits every brick against the box into at most six
/// complement slabs, so produced coordinates are always copies of input
/// coordinates and on-surface tests keep working exactly. Only boxes with
/// the identity rotation are expressible; anything else fails with
/// [`DecompositionError::Unsupported`], as does a surface that is not
/// itself a brick.
#[derive(Copy, Clone, Debug, Default)]
pub struct AabbBooleanKernel;

impl AabbBooleanKernel {
    fn world_aabb(item: &Box3) -> Result<Aabb, DecompositionError> {
        if item.rotation().angle() > DEFAULT_EPSILON {
            return Err(DecompositionError::Unsupported);
        }
        Ok(Aabb::new(item.min(), item.max()))
    }

    /// The overlap of two bricks, if it has positive volume.
    fn clip(brick: &Aabb, cut: &Aabb) -> Option<Aabb> {
        brick
            .intersection(cut)
            .filter(|overlap| overlap.volume() > 0.0)
    }

    /// `brick` minus `cut`, as up to six disjoint complement slabs.
    fn subtract(brick: &Aabb, cut: &Aabb) -> SmallVec<[Aabb; 6]> {
        let mut slabs = SmallVec::new();
        let Some(overlap) = Self::clip(brick, cut) else {
            slabs.push(*brick);
            return slabs;
        };

        let mut keep = |mins: Point<Real>, maxs: Point<Real>| {
            let slab = Aabb::new(mins, maxs);
            if slab.volume() > 0.0 {
                slabs.push(slab);
            }
        };

        // Both sides along x, then along y and z within the overlap span.
        keep(
            brick.mins,
            Point::new(overlap.mins.x, brick.maxs.y, brick.maxs.z),
        );
        keep(
            Point::new(overlap.maxs.x, brick.mins.y, brick.mins.z),
            brick.maxs,
        );
        keep(
            Point::new(overlap.mins.x, brick.mins.y, brick.mins.z),
            Point::new(overlap.maxs.x, overlap.mins.y, brick.maxs.z),
        );
        keep(
            Point::new(overlap.mins.x, overlap.maxs.y, brick.mins.z),
            Point::new(overlap.maxs.x, brick.maxs.y, brick.maxs.z),
        );
        keep(
            Point::new(overlap.mins.x, overlap.mins.y, brick.mins.z),
            Point::new(overlap.maxs.x, overlap.maxs.y, overlap.mins.z),
        );
        keep(
            Point::new(overlap.mins.x, overlap.mins.y, overlap.maxs.z),
            Point::new(overlap.maxs.x, overlap.maxs.y, brick.maxs.z),
        );

        slabs
    }
}

impl BooleanKernel for AabbBooleanKernel {
    type Solid = Vec<Aabb>;

    fn solid_from_surface(&self, surface: &TriMesh) -> Result<Vec<Aabb>, DecompositionError> {
        let bounds = surface.local_aabb();
        for vertex in surface.vertices() {
            let on_boundary = (0..DIM)
                .any(|k| vertex[k] == bounds.mins[k] || vertex[k] == bounds.maxs[k]);
            if !on_boundary {
                return Err(DecompositionError::Unsupported);
            }
        }
        if !relative_eq!(surface.volume(), bounds.volume(), max_relative = 1.0e-9) {
            return Err(DecompositionError::Unsupported);
        }

        Ok(vec![bounds])
    }

    fn intersection(&self, solid: &Vec<Aabb>, item: &Box3) -> Result<Vec<Aabb>, DecompositionError> {
        let cut = Self::world_aabb(item)?;
        let pieces: Vec<Aabb> = solid
            .iter()
            .filter_map(|brick| Self::clip(brick, &cut))
            .collect();

        if pieces.is_empty() {
            return Err(DecompositionError::EmptyIntersection);
        }
        Ok(pieces)
    }

    fn difference(&self, solid: &Vec<Aabb>, item: &Box3) -> Result<Vec<Aabb>, DecompositionError> {
        let cut = Self::world_aabb(item)?;
        let mut remainder = Vec::new();
        for brick in solid {
            remainder.extend(Self::subtract(brick, &cut));
        }
        Ok(remainder)
    }

    fn union(&self, solid: &Vec<Aabb>, piece: &Vec<Aabb>) -> Result<Vec<Aabb>, DecompositionError> {
        let mut merged = solid.clone();
        for brick in piece {
            let mut next = Vec::new();
            for existing in &merged {
                next.extend(Self::subtract(existing, brick));
            }
            next.push(*brick);
            merged = next;
        }
        Ok(merged)
    }

    fn vertices(&self, solid: &Vec<Aabb>) -> Vec<Point<Real>> {
        solid.iter().flat_map(|brick| brick.vertices()).collect()
    }

    fn is_empty(&self, solid: &Vec<Aabb>) -> bool {
        solid.is_empty()
    }
}

/// One extracted piece and the extrusion target of the box that claimed it.
#[derive(Clone, Debug)]
pub struct HeightfieldPiece<S> {
    solid: S,
    target: Target,
    box_id: u32,
}

impl<S> HeightfieldPiece<S> {
    /// The piece's volume representation.
    pub fn solid(&self) -> &S {
        &self.solid
    }

    /// Extrusion target inherited from the claiming box.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Id of the claiming box.
    pub fn box_id(&self) -> u32 {
        self.box_id
    }
}

/// Extracted pieces, index-aligned with the boxes that claimed them.
#[derive(Clone, Debug)]
pub struct HeightfieldsList<S> {
    pieces: Vec<HeightfieldPiece<S>>,
}

impl<S> HeightfieldsList<S> {
    /// Creates an empty list.
    pub fn new() -> HeightfieldsList<S> {
        HeightfieldsList { pieces: Vec::new() }
    }

    /// Number of pieces.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Whether the list holds no piece.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// The piece at the given index.
    pub fn get(&self, index: usize) -> Option<&HeightfieldPiece<S>> {
        self.pieces.get(index)
    }

    /// Iterates over the pieces in box order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &HeightfieldPiece<S>> {
        self.pieces.iter()
    }

    /// Appends a piece.
    pub fn push(&mut self, piece: HeightfieldPiece<S>) {
        self.pieces.push(piece);
    }

    /// Removes and returns the piece at the given index.
    pub fn remove(&mut self, index: usize) -> HeightfieldPiece<S> {
        self.pieces.remove(index)
    }
}

impl<S> Default for HeightfieldsList<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Carves the accepted boxes out of a running base complex, one heightfield
/// piece per box.
pub struct HeightfieldExtractor<'a, K: BooleanKernel> {
    kernel: K,
    surface: &'a TriMesh,
    base_complex: K::Solid,
}

impl<'a, K: BooleanKernel> HeightfieldExtractor<'a, K> {
    /// Creates an extractor whose base complex starts as the whole solid.
    pub fn new(kernel: K, surface: &'a TriMesh) -> Result<Self, DecompositionError> {
        let base_complex = kernel.solid_from_surface(surface)?;
        Ok(HeightfieldExtractor {
            kernel,
            surface,
            base_complex,
        })
    }

    /// The part of the solid not claimed by any accepted box.
    pub fn base_complex(&self) -> &K::Solid {
        &self.base_complex
    }

    /// Lets every box claim the part of the base complex it contains, in
    /// list order.
    ///
    /// A claim is accepted only when the claimed piece still touches the
    /// original surface somewhere; the piece is then subtracted from the
    /// base complex, so earlier boxes win overlapping volume. Boxes whose
    /// claim is rejected are removed from `boxes`, keeping it index-aligned
    /// with the returned pieces. Extraction stops early once the base
    /// complex no longer touches the original surface.
    pub fn extract(&mut self, boxes: &mut BoxList) -> HeightfieldsList<K::Solid> {
        let mut list = HeightfieldsList::new();
        let mut accepted = vec![false; boxes.len()];

        for (index, item) in boxes.iter().enumerate() {
            if !self.touches_surface(&self.base_complex) {
                log::debug!("base complex fully claimed after {index} boxes");
                break;
            }

            let piece = match self.kernel.intersection(&self.base_complex, item) {
                Ok(piece) => piece,
                Err(DecompositionError::EmptyIntersection) => continue,
                Err(error) => {
                    log::warn!("skipping box {}: {error}", item.id());
                    continue;
                }
            };
            if !self.touches_surface(&piece) {
                continue;
            }

            match self.kernel.difference(&self.base_complex, item) {
                Ok(remainder) => self.base_complex = remainder,
                Err(error) => {
                    log::warn!("skipping box {}: {error}", item.id());
                    continue;
                }
            }

            accepted[index] = true;
            list.push(HeightfieldPiece {
                solid: piece,
                target: item.target(),
                box_id: item.id(),
            });
        }

        for index in (0..accepted.len()).rev() {
            if !accepted[index] {
                let _ = boxes.remove(index);
            }
        }

        list
    }

    /// Re-absorbs pieces that never contributed any surface area.
    ///
    /// A piece none of whose vertices touches the original surface lies
    /// strictly between cut planes; its box carved volume without exposing
    /// anything, so the piece returns to the base complex and its box is
    /// dropped. `list` and `boxes` must be index-aligned.
    pub fn stick(&mut self, list: &mut HeightfieldsList<K::Solid>, boxes: &mut BoxList) {
        let mut index = 0;
        while index < list.len() {
            let Some(piece) = list.get(index) else { break };
            if self.touches_surface(piece.solid()) {
                index += 1;
                continue;
            }

            match self.kernel.union(&self.base_complex, piece.solid()) {
                Ok(merged) => self.base_complex = merged,
                Err(error) => {
                    log::warn!("keeping heightfield {index}: {error}");
                    index += 1;
                    continue;
                }
            }

            let removed = list.remove(index);
            let _ = boxes.remove(index);
            log::debug!(
                "stuck the piece of box {} back into the base complex",
                removed.box_id(),
            );
        }
    }

    fn touches_surface(&self, solid: &K::Solid) -> bool {
        self.kernel
            .vertices(solid)
            .iter()
            .any(|vertex| self.surface.signed_distance(vertex).abs() <= DEFAULT_EPSILON * 100.0)
    }
}
