use crate::decomposition::direction::NUM_ORIENTATIONS;
use crate::decomposition::DecompositionError;
use crate::math::Real;

/// Parameters controlling the box-growing pipeline.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DecompositionParameters {
    /// Signed-distance threshold below which a grid cell belongs to the safe
    /// kernel of the solid, where boxes may grow freely.
    pub kernel_distance: Real,
    /// Edge length of the signed-distance grid cells.
    pub spacing: Real,
    /// Number of canonical solid orientations to decompose with, between 1
    /// and [`NUM_ORIENTATIONS`].
    pub orientations: usize,
    /// Grows one box list per (orientation, target) combination and biases
    /// growth away from saved borders, instead of one list per orientation.
    pub heightfield_mode: bool,
    /// Seeds a candidate box only on faces whose normal is closest to the
    /// combination's target.
    pub only_nearest_target: bool,
    /// Angle threshold of the flipped-face classification, normalized in
    /// `[0, 1]` and mapped to `[0, pi]` radians.
    pub flip_angle_threshold: Real,
    /// Minimum area for a face to qualify as flipped.
    pub flip_area_threshold: Real,
    /// Weight of the volume reward in the growth energy.
    pub volume_weight: Real,
    /// Face budget of the first decimation pass. Doubled at each coverage
    /// iteration until the full face count is reached.
    pub initial_decimation_budget: usize,
    /// Hard cap on the iterations of a single box optimization.
    pub max_optimizer_iterations: usize,
    /// Gradient norm under which a box optimization is considered converged.
    pub convergence_tolerance: Real,
}

impl Default for DecompositionParameters {
    fn default() -> Self {
        DecompositionParameters {
            kernel_distance: 0.1,
            spacing: 0.2,
            orientations: NUM_ORIENTATIONS,
            heightfield_mode: false,
            only_nearest_target: false,
            flip_angle_threshold: 0.5,
            flip_area_threshold: 0.0,
            volume_weight: 1.0,
            initial_decimation_budget: 100,
            max_optimizer_iterations: 1_000,
            convergence_tolerance: 1.0e-6,
        }
    }
}

impl DecompositionParameters {
    /// Checks that every parameter lies in its meaningful range.
    pub fn validate(&self) -> Result<(), DecompositionError> {
        fn check(
            ok: bool,
            name: &'static str,
            constraint: &'static str,
        ) -> Result<(), DecompositionError> {
            if ok {
                Ok(())
            } else {
                Err(DecompositionError::InvalidParameters { name, constraint })
            }
        }

        check(
            self.kernel_distance.is_finite() && self.kernel_distance > 0.0,
            "kernel_distance",
            "strictly positive and finite",
        )?;
        check(
            self.spacing.is_finite() && self.spacing > 0.0,
            "spacing",
            "strictly positive and finite",
        )?;
        check(
            (1..=NUM_ORIENTATIONS).contains(&self.orientations),
            "orientations",
            "between 1 and 4",
        )?;
        check(
            (0.0..=1.0).contains(&self.flip_angle_threshold),
            "flip_angle_threshold",
            "within [0, 1]",
        )?;
        check(
            self.flip_area_threshold.is_finite() && self.flip_area_threshold >= 0.0,
            "flip_area_threshold",
            "non-negative and finite",
        )?;
        check(
            self.volume_weight.is_finite() && self.volume_weight >= 0.0,
            "volume_weight",
            "non-negative and finite",
        )?;
        check(
            self.initial_decimation_budget > 0,
            "initial_decimation_budget",
            "strictly positive",
        )?;
        check(
            self.max_optimizer_iterations > 0,
            "max_optimizer_iterations",
            "strictly positive",
        )?;
        check(
            self.convergence_tolerance.is_finite() && self.convergence_tolerance > 0.0,
            "convergence_tolerance",
            "strictly positive and finite",
        )
    }
}
