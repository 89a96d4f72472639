//! Canonical extrusion targets and solid orientations.

use crate::math::{Real, Rotation, UnitVector, Vector};
use na::Unit;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

/// Number of canonical extrusion targets.
pub const NUM_TARGETS: usize = 26;

/// Number of canonical solid orientations.
pub const NUM_ORIENTATIONS: usize = 4;

const FRAC_1_SQRT_3: Real = 0.577_350_269_189_625_8;

/// A coordinate axis of the box frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The `x` axis.
    X,
    /// The `y` axis.
    Y,
    /// The `z` axis.
    Z,
}

impl Axis {
    /// The three axes, in coordinate order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The coordinate index of this axis.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One of the 26 canonical extrusion directions.
///
/// Labels 0 to 5 are the signed coordinate axes, 6 to 17 the edge diagonals
/// (grouped by the plane containing them), and 18 to 25 the corner diagonals.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(u8);

/// Grouping of targets by the coordinate subspace they span.
///
/// Opposite axis directions share a class; diagonal classes group the four
/// (resp. eight) directions of one plane (resp. the corners).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetClass {
    /// `+X` and `-X`.
    Red,
    /// `+Y` and `-Y`.
    Green,
    /// `+Z` and `-Z`.
    Blue,
    /// The four diagonals of the `xy` plane.
    Yellow,
    /// The four diagonals of the `xz` plane.
    Magenta,
    /// The four diagonals of the `yz` plane.
    Cyan,
    /// The eight corner diagonals.
    White,
}

impl Target {
    /// The `+X` axis target.
    pub const PLUS_X: Target = Target(0);
    /// The `+Y` axis target.
    pub const PLUS_Y: Target = Target(1);
    /// The `+Z` axis target.
    pub const PLUS_Z: Target = Target(2);
    /// The `-X` axis target.
    pub const MINUS_X: Target = Target(3);
    /// The `-Y` axis target.
    pub const MINUS_Y: Target = Target(4);
    /// The `-Z` axis target.
    pub const MINUS_Z: Target = Target(5);

    /// The target with the given label, if it exists.
    pub fn from_label(label: u8) -> Option<Target> {
        (label < NUM_TARGETS as u8).then_some(Target(label))
    }

    /// The label of this target, in `0..26`.
    #[inline]
    pub fn label(self) -> u8 {
        self.0
    }

    /// Every canonical target, in label order.
    pub fn all() -> impl ExactSizeIterator<Item = Target> {
        (0..NUM_TARGETS as u8).map(Target)
    }

    /// The six axis-aligned targets, in label order.
    pub fn axis_aligned() -> impl ExactSizeIterator<Item = Target> {
        (0..6).map(Target)
    }

    /// The unit direction of this target.
    pub fn direction(self) -> UnitVector<Real> {
        let v = match self.0 {
            0 => Vector::new(1.0, 0.0, 0.0),
            1 => Vector::new(0.0, 1.0, 0.0),
            2 => Vector::new(0.0, 0.0, 1.0),
            3 => Vector::new(-1.0, 0.0, 0.0),
            4 => Vector::new(0.0, -1.0, 0.0),
            5 => Vector::new(0.0, 0.0, -1.0),
            6 => Vector::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0),
            7 => Vector::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0),
            8 => Vector::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0),
            9 => Vector::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0),
            10 => Vector::new(FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2),
            11 => Vector::new(-FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2),
            12 => Vector::new(-FRAC_1_SQRT_2, 0.0, -FRAC_1_SQRT_2),
            13 => Vector::new(FRAC_1_SQRT_2, 0.0, -FRAC_1_SQRT_2),
            14 => Vector::new(0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            15 => Vector::new(0.0, -FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            16 => Vector::new(0.0, -FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            17 => Vector::new(0.0, FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            18 => Vector::new(FRAC_1_SQRT_3, FRAC_1_SQRT_3, FRAC_1_SQRT_3),
            19 => Vector::new(-FRAC_1_SQRT_3, -FRAC_1_SQRT_3, -FRAC_1_SQRT_3),
            20 => Vector::new(FRAC_1_SQRT_3, -FRAC_1_SQRT_3, -FRAC_1_SQRT_3),
            21 => Vector::new(-FRAC_1_SQRT_3, FRAC_1_SQRT_3, FRAC_1_SQRT_3),
            22 => Vector::new(FRAC_1_SQRT_3, FRAC_1_SQRT_3, -FRAC_1_SQRT_3),
            23 => Vector::new(-FRAC_1_SQRT_3, -FRAC_1_SQRT_3, FRAC_1_SQRT_3),
            24 => Vector::new(FRAC_1_SQRT_3, -FRAC_1_SQRT_3, FRAC_1_SQRT_3),
            _ => Vector::new(-FRAC_1_SQRT_3, FRAC_1_SQRT_3, -FRAC_1_SQRT_3),
        };
        Unit::new_unchecked(v)
    }

    /// The class this target belongs to.
    pub fn class(self) -> TargetClass {
        match self.0 {
            0 | 3 => TargetClass::Red,
            1 | 4 => TargetClass::Green,
            2 | 5 => TargetClass::Blue,
            6..=9 => TargetClass::Yellow,
            10..=13 => TargetClass::Magenta,
            14..=17 => TargetClass::Cyan,
            _ => TargetClass::White,
        }
    }

    /// The canonical target closest to the given direction.
    pub fn nearest(direction: &Vector<Real>) -> Target {
        Self::nearest_of(direction, Self::all())
    }

    /// The axis-aligned target closest to the given direction.
    pub fn nearest_axis_aligned(direction: &Vector<Real>) -> Target {
        Self::nearest_of(direction, Self::axis_aligned())
    }

    fn nearest_of(direction: &Vector<Real>, candidates: impl Iterator<Item = Target>) -> Target {
        let mut best = Target(0);
        let mut best_dot = Real::MIN;

        for target in candidates {
            let dot = target.direction().dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = target;
            }
        }

        best
    }
}

/// The canonical orientation rotation with the given index.
///
/// Orientation 0 is the identity; the others are eighth-turns around one of
/// the negated coordinate axes, spreading the axis-aligned targets over the
/// edge diagonals of the original frame.
pub fn orientation_rotation(index: usize) -> Rotation<Real> {
    match index {
        1 => Rotation::from_axis_angle(
            &Unit::new_unchecked(Vector::new(0.0, 0.0, -1.0)),
            FRAC_PI_4,
        ),
        2 => Rotation::from_axis_angle(
            &Unit::new_unchecked(Vector::new(-1.0, 0.0, 0.0)),
            FRAC_PI_4,
        ),
        3 => Rotation::from_axis_angle(
            &Unit::new_unchecked(Vector::new(0.0, -1.0, 0.0)),
            FRAC_PI_4,
        ),
        _ => Rotation::identity(),
    }
}

#[cfg(test)]
mod test {
    use super::{orientation_rotation, Target, TargetClass, NUM_ORIENTATIONS, NUM_TARGETS};
    use crate::math::{Matrix, Vector};

    #[test]
    fn every_target_direction_is_a_unit_vector() {
        for target in Target::all() {
            assert!(relative_eq!(
                target.direction().norm(),
                1.0,
                epsilon = 1.0e-12
            ));
        }
    }

    #[test]
    fn target_classes_partition_the_labels() {
        let mut counts = [0usize; 7];
        for target in Target::all() {
            counts[match target.class() {
                TargetClass::Red => 0,
                TargetClass::Green => 1,
                TargetClass::Blue => 2,
                TargetClass::Yellow => 3,
                TargetClass::Magenta => 4,
                TargetClass::Cyan => 5,
                TargetClass::White => 6,
            }] += 1;
        }
        assert_eq!(counts, [2, 2, 2, 4, 4, 4, 8]);
        assert_eq!(NUM_TARGETS, 26);
    }

    #[test]
    fn nearest_target_recovers_the_canonical_directions() {
        assert_eq!(Target::nearest(&Vector::new(1.0, 0.1, 0.0)), Target::PLUS_X);
        assert_eq!(
            Target::nearest(&Vector::new(1.0, 1.0, 1.0)),
            Target::from_label(18).unwrap()
        );
        assert_eq!(
            Target::nearest_axis_aligned(&Vector::new(-0.1, -0.2, -0.9)),
            Target::MINUS_Z
        );
    }

    #[test]
    fn orientation_rotations_are_orthonormal() {
        for index in 0..NUM_ORIENTATIONS {
            let rot: Matrix<f64> = orientation_rotation(index).to_rotation_matrix().into_inner();
            let gram = rot.transpose() * rot;
            assert!(relative_eq!(
                gram,
                Matrix::identity(),
                epsilon = 1.0e-12
            ));
        }
    }

    #[test]
    fn orientations_tilt_the_axis_targets_onto_the_diagonals() {
        let rot = orientation_rotation(1);
        let tilted = rot * Target::PLUS_X.direction().into_inner();
        // An eighth-turn around -z sends +x onto the +x-y edge diagonal.
        assert_eq!(Target::nearest(&tilted).label(), 9);
    }
}
