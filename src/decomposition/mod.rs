//! Decomposition of a solid into extrusion boxes and heightfield pieces.
//!
//! The entry point is [`CoverageEngine`]: given a closed triangle mesh and a
//! set of [`DecompositionParameters`], it grows one oriented box per uncovered
//! surface region by minimizing an energy measured against a signed-distance
//! grid, until every face of the surface is covered. Redundant boxes are then
//! discarded by [`prune_redundant_boxes`] and the survivors can be turned into
//! heightfield pieces by a [`HeightfieldExtractor`].

pub use self::box3::{Box3, BoxList, Extent};
pub use self::classify::{classify_faces, FaceClassification};
pub use self::direction::{
    orientation_rotation, Axis, Target, TargetClass, NUM_ORIENTATIONS, NUM_TARGETS,
};
pub use self::energy::{EnergyModel, OptimizationOutcome};
pub use self::engine::{Combination, CombinationKey, CoverageEngine, Decomposition};
pub use self::error::DecompositionError;
pub use self::grid::{SignedDistanceGrid, MAX_PAY, MIN_PAY};
pub use self::heightfield::{
    AabbBooleanKernel, BooleanKernel, HeightfieldExtractor, HeightfieldPiece, HeightfieldsList,
};
pub use self::parameters::DecompositionParameters;
pub use self::prune::prune_redundant_boxes;

mod box3;
mod classify;
mod direction;
mod energy;
mod engine;
mod error;
mod grid;
mod heightfield;
mod parameters;
mod prune;
mod tricubic;
