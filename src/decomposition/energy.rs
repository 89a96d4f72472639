//! The energy model driving box growth against a signed-distance grid.

use crate::decomposition::box3::{Box3, BoxList, Extent};
use crate::decomposition::error::DecompositionError;
use crate::decomposition::grid::{SignedDistanceGrid, FREE_BORDER_SCALE, MAX_PAY, MIN_PAY};
use crate::decomposition::parameters::DecompositionParameters;
use crate::math::{ExtentsMatrix, ExtentsVector, Point, Real};

const BACKTRACK_LIMIT: usize = 30;
const STEP_GROWTH: Real = 1.5;
const MAX_STEP_SCALE: Real = 4.0;
const CURVATURE_CUTOFF: Real = 1.0e-12;

/// How an optimization run ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OptimizationOutcome {
    /// The projected gradient norm fell under the convergence tolerance, or
    /// no further descent step could lower the energy.
    Converged {
        /// Accepted descent steps before convergence.
        iterations: usize,
        /// Energy of the final box state.
        energy: Real,
    },
    /// The hard iteration cap was reached first.
    IterationLimit {
        /// Accepted descent steps, equal to the cap.
        iterations: usize,
        /// Energy of the final box state.
        energy: Real,
    },
}

impl OptimizationOutcome {
    /// The number of accepted descent steps.
    pub fn iterations(&self) -> usize {
        match *self {
            OptimizationOutcome::Converged { iterations, .. }
            | OptimizationOutcome::IterationLimit { iterations, .. } => iterations,
        }
    }

    /// The energy of the box state the optimizer ended on.
    pub fn energy(&self) -> Real {
        match *self {
            OptimizationOutcome::Converged { energy, .. }
            | OptimizationOutcome::IterationLimit { energy, .. } => energy,
        }
    }
}

/// Scalar energy and analytic gradient of a box measured against one
/// [`SignedDistanceGrid`].
///
/// The energy charges the box the interpolated crossing weight integrated
/// over its interior, plus a volume deficit term rewarding growth. The
/// deficit rate sits strictly between the discounted price of a free border
/// and the full price of a protected one, so a face keeps advancing while the
/// weight under it stays below the rate and stalls once the border band
/// charges more than the volume it buys. Free faces therefore settle inside
/// the band, faces over discounted borders extrude through to the lattice
/// bounds, and constraint points pin the rest.
pub struct EnergyModel<'a> {
    grid: &'a SignedDistanceGrid,
    volume_weight: Real,
    max_iterations: usize,
    tolerance: Real,
}

impl<'a> EnergyModel<'a> {
    /// Binds an energy model to a grid.
    pub fn new(grid: &'a SignedDistanceGrid, params: &DecompositionParameters) -> Self {
        EnergyModel {
            grid,
            volume_weight: params.volume_weight,
            max_iterations: params.max_optimizer_iterations,
            tolerance: params.convergence_tolerance,
        }
    }

    /// The energy of `b`: the weight integrated over the box interior plus
    /// the scaled difference between the lattice volume and the box volume.
    pub fn energy(&self, b: &Box3) -> Real {
        let min = b.min();
        let max = b.max();

        self.interior_weight_integral(&min, &max)
            + self.volume_lambda() * (self.grid.aabb().volume() - b.volume())
    }

    /// The analytic gradient of [`EnergyModel::energy`] with respect to the
    /// six extents, in [`Extent::ALL`] order.
    ///
    /// Moving a face outward swallows a slab of volume: the interior integral
    /// changes by the weight integrated over the face, the deficit term by
    /// the face's area times the reward rate.
    pub fn gradient(&self, b: &Box3) -> ExtentsVector<Real> {
        let min = b.min();
        let max = b.max();
        let lambda = self.volume_lambda();
        let mut gradient = ExtentsVector::zeros();

        for extent in Extent::ALL {
            let a = extent.axis().index();
            let u = (a + 1) % 3;
            let v = (a + 2) % 3;
            let at = match extent {
                Extent::Min(_) => min[a],
                Extent::Max(_) => max[a],
            };

            let face = self.face_weight_integral(a, at, &min, &max);
            let area = (max[u] - min[u]) * (max[v] - min[v]);

            gradient[extent.index()] = match extent {
                Extent::Min(_) => lambda * area - face,
                Extent::Max(_) => face - lambda * area,
            };
        }

        gradient
    }

    /// The gradient with the components of resting extents zeroed.
    ///
    /// An extent rests when it sits on one of its bounds and the raw gradient
    /// points further into it: a face on a constraint point may not shrink
    /// past it, and a face on the lattice boundary may not grow past it. Each
    /// of the six extents activates its clamp independently.
    pub fn projected_gradient(&self, b: &Box3) -> ExtentsVector<Real> {
        let mut gradient = self.gradient(b);

        let tolerance = self.grid.spacing() * 1.0e-9;
        let bounds = self.grid.aabb();
        let min = b.min();
        let max = b.max();

        for a in 0..3 {
            let mut lowest = Real::MAX;
            let mut highest = -Real::MAX;
            for point in b.constraints() {
                lowest = lowest.min(point[a]);
                highest = highest.max(point[a]);
            }

            let i_min = a;
            let i_max = 3 + a;

            if min[a] >= lowest - tolerance && gradient[i_min] < 0.0 {
                gradient[i_min] = 0.0;
            }
            if min[a] <= bounds.mins[a] + tolerance && gradient[i_min] > 0.0 {
                gradient[i_min] = 0.0;
            }
            if max[a] <= highest + tolerance && gradient[i_max] > 0.0 {
                gradient[i_max] = 0.0;
            }
            if max[a] >= bounds.maxs[a] - tolerance && gradient[i_max] < 0.0 {
                gradient[i_max] = 0.0;
            }
        }

        gradient
    }

    /// Steepest descent with backtracking on the energy value.
    ///
    /// The step decays until a strictly lower, finite energy is found and
    /// regrows after every accepted move. The box state never leaves the last
    /// finite iterate: candidates with non-finite energy are discarded during
    /// backtracking, so the method returns the best state reached rather than
    /// propagating the failure. When `history` is given, the initial state and
    /// every accepted iterate are appended to it.
    ///
    /// Returns [`DecompositionError::OptimizationDivergence`] only when the
    /// starting box itself has non-finite energy.
    pub fn gradient_descent(
        &self,
        b: &mut Box3,
        mut history: Option<&mut BoxList>,
    ) -> Result<OptimizationOutcome, DecompositionError> {
        let mut energy = self.energy(b);
        if !energy.is_finite() {
            return Err(DecompositionError::OptimizationDivergence);
        }
        if let Some(history) = history.as_deref_mut() {
            history.push(b.clone());
        }

        let mut step = self.grid.spacing();

        for iteration in 1..=self.max_iterations {
            let gradient = self.projected_gradient(b);
            if gradient.norm() <= self.tolerance {
                return Ok(OptimizationOutcome::Converged {
                    iterations: iteration - 1,
                    energy,
                });
            }

            let direction = -gradient;
            let Some((next, next_energy, accepted)) =
                self.backtrack(b, &direction, step, energy)
            else {
                return Ok(OptimizationOutcome::Converged {
                    iterations: iteration - 1,
                    energy,
                });
            };

            *b = next;
            energy = next_energy;
            step = (accepted * STEP_GROWTH).min(self.grid.spacing() * MAX_STEP_SCALE);
            if let Some(history) = history.as_deref_mut() {
                history.push(b.clone());
            }
        }

        Ok(OptimizationOutcome::IterationLimit {
            iterations: self.max_iterations,
            energy,
        })
    }

    /// Quasi-Newton descent with a BFGS inverse-Hessian update.
    ///
    /// Same contract, constraint handling and failure semantics as
    /// [`EnergyModel::gradient_descent`]; the curvature information usually
    /// buys convergence in far fewer iterations. The inverse Hessian resets to
    /// the identity whenever the curvature condition fails or the predicted
    /// direction stops descending.
    pub fn bfgs(
        &self,
        b: &mut Box3,
        mut history: Option<&mut BoxList>,
    ) -> Result<OptimizationOutcome, DecompositionError> {
        let mut energy = self.energy(b);
        if !energy.is_finite() {
            return Err(DecompositionError::OptimizationDivergence);
        }
        if let Some(history) = history.as_deref_mut() {
            history.push(b.clone());
        }

        let mut inverse_hessian = ExtentsMatrix::identity();
        let mut gradient = self.projected_gradient(b);

        for iteration in 1..=self.max_iterations {
            if gradient.norm() <= self.tolerance {
                return Ok(OptimizationOutcome::Converged {
                    iterations: iteration - 1,
                    energy,
                });
            }

            let mut direction = -(inverse_hessian * gradient);
            if direction.dot(&gradient) >= 0.0 {
                inverse_hessian = ExtentsMatrix::identity();
                direction = -gradient;
            }

            let Some((next, next_energy, _)) = self.backtrack(b, &direction, 1.0, energy) else {
                return Ok(OptimizationOutcome::Converged {
                    iterations: iteration - 1,
                    energy,
                });
            };

            let displacement = next.extents_vector() - b.extents_vector();
            let next_gradient = self.projected_gradient(&next);
            let gradient_change = next_gradient - gradient;

            let curvature = gradient_change.dot(&displacement);
            if curvature > CURVATURE_CUTOFF {
                let rho = 1.0 / curvature;
                let identity = ExtentsMatrix::identity();
                let left = identity - (displacement * gradient_change.transpose()).scale(rho);
                let right = identity - (gradient_change * displacement.transpose()).scale(rho);
                inverse_hessian = left * inverse_hessian * right
                    + (displacement * displacement.transpose()).scale(rho);
            } else {
                inverse_hessian = ExtentsMatrix::identity();
            }

            *b = next;
            energy = next_energy;
            gradient = next_gradient;
            if let Some(history) = history.as_deref_mut() {
                history.push(b.clone());
            }
        }

        Ok(OptimizationOutcome::IterationLimit {
            iterations: self.max_iterations,
            energy,
        })
    }

    // Halves the step until a candidate strictly improves on `energy` with a
    // finite value. Returns the candidate, its energy and the accepted step.
    fn backtrack(
        &self,
        b: &Box3,
        direction: &ExtentsVector<Real>,
        step: Real,
        energy: Real,
    ) -> Option<(Box3, Real, Real)> {
        let mut trial = step;
        for _ in 0..BACKTRACK_LIMIT {
            let candidate = self.stepped(b, direction, trial);
            let candidate_energy = self.energy(&candidate);
            if candidate_energy.is_finite() && candidate_energy < energy {
                return Some((candidate, candidate_energy, trial));
            }
            trial *= 0.5;
        }
        None
    }

    // Moves the extents along `direction`, then restores the containment of
    // the constraint points and the lattice bounds.
    fn stepped(&self, b: &Box3, direction: &ExtentsVector<Real>, step: Real) -> Box3 {
        let mut next = b.clone();
        next.set_extents_vector(&(b.extents_vector() + direction.scale(step)));
        next.enclose_constraints();
        next.clamp_extents_to(self.grid.aabb());
        next
    }

    // The reward rate for claimed volume, halfway between what a discounted
    // border and a full-price border charge per unit of weight.
    fn volume_lambda(&self) -> Real {
        let full = MAX_PAY;
        let discounted = MIN_PAY + (MAX_PAY - MIN_PAY) * FREE_BORDER_SCALE;
        self.volume_weight * 0.5 * (full + discounted)
    }

    // Midpoint quadrature of the interpolated weight over the box interior.
    fn interior_weight_integral(&self, min: &Point<Real>, max: &Point<Real>) -> Real {
        let mut n = [0; 3];
        let mut d = [0.0; 3];
        for a in 0..3 {
            n[a] = self.samples_along(max[a] - min[a]);
            d[a] = (max[a] - min[a]) / n[a] as Real;
        }

        let mut sum = 0.0;
        for i in 0..n[0] {
            for j in 0..n[1] {
                for k in 0..n[2] {
                    let p = Point::new(
                        min[0] + (i as Real + 0.5) * d[0],
                        min[1] + (j as Real + 0.5) * d[1],
                        min[2] + (k as Real + 0.5) * d[2],
                    );
                    sum += self.grid.interpolate(&p).1;
                }
            }
        }

        sum * d[0] * d[1] * d[2]
    }

    // Midpoint quadrature of the interpolated weight over the rectangle of
    // the box face normal to `axis` at coordinate `at`.
    fn face_weight_integral(
        &self,
        axis: usize,
        at: Real,
        min: &Point<Real>,
        max: &Point<Real>,
    ) -> Real {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let nu = self.samples_along(max[u] - min[u]);
        let nv = self.samples_along(max[v] - min[v]);
        let du = (max[u] - min[u]) / nu as Real;
        let dv = (max[v] - min[v]) / nv as Real;

        let mut sum = 0.0;
        for i in 0..nu {
            for j in 0..nv {
                let mut p = Point::origin();
                p[axis] = at;
                p[u] = min[u] + (i as Real + 0.5) * du;
                p[v] = min[v] + (j as Real + 0.5) * dv;
                sum += self.grid.interpolate(&p).1;
            }
        }

        sum * du * dv
    }

    // Two samples per lattice cell, at least two per span overall.
    fn samples_along(&self, length: Real) -> usize {
        (((length / self.grid.spacing()).ceil() as usize) * 2).clamp(2, 32)
    }
}

#[cfg(test)]
mod test {
    use super::{EnergyModel, OptimizationOutcome};
    use crate::decomposition::box3::{Box3, BoxList};
    use crate::decomposition::classify::classify_faces;
    use crate::decomposition::direction::Target;
    use crate::decomposition::grid::SignedDistanceGrid;
    use crate::decomposition::parameters::DecompositionParameters;
    use crate::math::{Point, Real, Rotation};
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

    fn cube_grid(params: &DecompositionParameters) -> SignedDistanceGrid {
        SignedDistanceGrid::build(&unit_cube(), params, None, None).unwrap()
    }

    fn interior_box(min: Real, max: Real) -> Box3 {
        Box3::new(
            Point::new(min, min, min),
            Point::new(max, max, max),
            Rotation::identity(),
            Target::PLUS_Z,
        )
    }

    #[test]
    fn deep_kernel_boxes_have_a_pure_volume_energy() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        // Every sample of this box reads a stencil of kernel nodes, so the
        // interior term vanishes exactly. The reward rate is halfway between
        // the discounted and the full border price.
        let b = interior_box(0.45, 0.55);
        let lambda = params.volume_weight * 0.5 * (1.0 + 0.5);

        let expected = lambda * (grid.aabb().volume() - b.volume());
        assert!(relative_eq!(model.energy(&b), expected, epsilon = 1.0e-9));

        let gradient = model.gradient(&b);
        let area = (0.55 - 0.45) * (0.55 - 0.45);
        for a in 0..3 {
            assert!(relative_eq!(gradient[a], lambda * area, epsilon = 1.0e-9));
            assert!(relative_eq!(gradient[3 + a], -lambda * area, epsilon = 1.0e-9));
        }
    }

    #[test]
    fn growing_inside_the_kernel_lowers_the_energy() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        let small = interior_box(0.45, 0.55);
        let large = interior_box(0.4, 0.6);
        assert!(model.energy(&large) < model.energy(&small));
    }

    #[test]
    fn resting_extents_have_their_gradient_masked() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        // The max-x face lies on the surface, pinned by its constraints; the
        // border price pulls it inward but the pin must win.
        let mut b = Box3::new(
            Point::new(0.3, 0.3, 0.3),
            Point::new(1.0, 0.6, 0.6),
            Rotation::identity(),
            Target::PLUS_X,
        );
        b.set_constraints([Point::new(1.0, 0.45, 0.45); 3]);

        let raw = model.gradient(&b);
        assert!(raw[3] > 0.0);

        let projected = model.projected_gradient(&b);
        assert_eq!(projected[3], 0.0);
        // Unpinned extents keep their raw component.
        assert_eq!(projected[0], raw[0]);
    }

    #[test]
    fn descent_energies_never_increase() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        // Seeded from a bottom triangle, growing upward into the kernel.
        let triangle = unit_cube().triangle(0);
        let mut b = Box3::from_triangle(&triangle, Rotation::identity(), Target::MINUS_Z, 0.1);
        b.clamp_extents_to(grid.aabb());

        let start_energy = model.energy(&b);
        let mut history = BoxList::new();
        let outcome = model.gradient_descent(&mut b, Some(&mut history)).unwrap();

        assert!(outcome.energy() <= start_energy);
        assert!(relative_eq!(outcome.energy(), model.energy(&b), epsilon = 1.0e-9));
        assert!(history.len() >= 2);

        let mut previous = Real::MAX;
        for state in history.iter() {
            let energy = model.energy(state);
            assert!(energy <= previous + 1.0e-12);
            previous = energy;
        }
    }

    #[test]
    fn bfgs_keeps_the_seed_triangle_inside() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        // A face of the x = 1 side of the cube.
        let triangle = unit_cube().triangle(6);
        let mut b = Box3::from_triangle(&triangle, Rotation::identity(), Target::PLUS_X, 0.1);
        b.clamp_extents_to(grid.aabb());

        let start_energy = model.energy(&b);
        let outcome = model.bfgs(&mut b, None).unwrap();
        assert!(outcome.energy() <= start_energy);

        for point in *b.constraints() {
            assert!(b.contains_local_point(&point));
        }
        assert!(b.is_valid());

        // The free min-x face settles strictly inside the border band: it
        // neither stops short of it nor escapes through the surface onto the
        // lattice bound.
        assert!(b.min().x > 0.0);
        assert!(b.min().x < 0.2);
    }

    #[test]
    fn growth_stalls_inside_the_far_border_band() {
        let params = cube_parameters();
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        // Seeded on the bottom, the free top face climbs through the kernel
        // but the band under the opposite surface must charge more than the
        // volume pays; swallowing the whole lattice is never optimal.
        let triangle = unit_cube().triangle(0);
        let mut b = Box3::from_triangle(&triangle, Rotation::identity(), Target::MINUS_Z, 0.1);
        b.clamp_extents_to(grid.aabb());

        let _ = model.bfgs(&mut b, None).unwrap();

        assert!(b.max().z > 0.5);
        assert!(b.max().z < 1.0);
    }

    #[test]
    fn discounted_borders_are_extruded_through() {
        let cube = unit_cube();
        let mut params = cube_parameters();
        params.heightfield_mode = true;

        let classes = classify_faces(&cube, Target::PLUS_Z, 0.5, 0.0);
        let grid =
            SignedDistanceGrid::build(&cube, &params, Some(Target::PLUS_Z), Some(&classes))
                .unwrap();
        let model = EnergyModel::new(&grid, &params);

        // Growing along +z from a top face, the bottom border is discounted:
        // it stays cheaper than the volume reward all the way down, so the
        // box extrudes through it to the lattice floor.
        let triangle = cube.triangle(2);
        let mut b = Box3::from_triangle(&triangle, Rotation::identity(), Target::PLUS_Z, 0.1);
        b.clamp_extents_to(grid.aabb());

        let _ = model.bfgs(&mut b, None).unwrap();

        assert!(b.min().z < 0.05);
    }

    #[test]
    fn the_iteration_cap_is_hard() {
        let mut params = cube_parameters();
        params.max_optimizer_iterations = 1;
        let grid = cube_grid(&params);
        let model = EnergyModel::new(&grid, &params);

        let triangle = unit_cube().triangle(0);
        let mut b = Box3::from_triangle(&triangle, Rotation::identity(), Target::MINUS_Z, 0.1);
        b.clamp_extents_to(grid.aabb());

        let outcome = model.gradient_descent(&mut b, None).unwrap();
        assert!(outcome.iterations() <= 1);
        assert!(matches!(outcome, OptimizationOutcome::IterationLimit { .. }));
    }
}
