use crate::shape::TopologyError;

/// Failures surfaced by the decomposition pipeline.
///
/// Geometry and parameter errors abort the affected work; optimization and
/// boolean-operation failures are recovered locally by the pipeline and only
/// reported through logging or per-box rejection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    /// The input surface is degenerate or not a closed manifold.
    #[error("invalid input geometry: {0}")]
    InvalidGeometry(#[from] TopologyError),
    /// A parameter is outside of its meaningful range.
    #[error("the `{name}` parameter must be {constraint}")]
    InvalidParameters {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable description of the violated constraint.
        constraint: &'static str,
    },
    /// The optimizer reached a non-finite energy or gradient.
    #[error("the box optimization diverged to a non-finite state")]
    OptimizationDivergence,
    /// A boolean operation between a box and the base complex produced
    /// nothing usable.
    #[error("the boolean operation produced an empty intersection")]
    EmptyIntersection,
    /// The boolean kernel cannot express the requested operation.
    #[error("unsupported boolean operation")]
    Unsupported,
    /// The decimation budget reached the full face count without covering
    /// every face.
    #[error("coverage stalled at {covered} of {total} faces despite a full decimation budget")]
    CoverageStall {
        /// Number of faces covered when the pipeline gave up.
        covered: usize,
        /// Total number of faces of the surface.
        total: usize,
    },
}
