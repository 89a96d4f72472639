//! Decimation-driven coverage loop growing boxes over the whole surface.

use crate::decomposition::box3::{Box3, BoxList};
use crate::decomposition::classify::classify_faces;
use crate::decomposition::direction::{orientation_rotation, Target};
use crate::decomposition::energy::EnergyModel;
use crate::decomposition::error::DecompositionError;
use crate::decomposition::grid::SignedDistanceGrid;
use crate::decomposition::parameters::DecompositionParameters;
use crate::shape::TriMesh;
use crate::transformation::decimate_to_face_budget;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Identifier of one independent decomposition combination.
///
/// Without heightfield mode there is one combination per orientation. With
/// it, every orientation is paired with each of the canonical targets.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinationKey {
    /// Index of the canonical orientation the surface was rotated with.
    pub orientation: usize,
    /// Target the combination's grid is biased toward, if any.
    pub target: Option<Target>,
}

/// The grid and the boxes grown against it for one combination.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct Combination {
    /// Signed-distance grid of the rotated surface.
    pub grid: SignedDistanceGrid,
    /// Boxes accumulated over the coverage iterations, in insertion order.
    pub boxes: BoxList,
}

/// Result of a whole-surface covering run.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct Decomposition {
    combinations: BTreeMap<CombinationKey, Combination>,
    covered_faces: Vec<u32>,
    total_faces: usize,
}

impl Decomposition {
    /// The per-combination grids and box lists, ordered by key.
    pub fn combinations(&self) -> impl ExactSizeIterator<Item = (&CombinationKey, &Combination)> {
        self.combinations.iter()
    }

    /// The combination with the given key.
    pub fn combination(&self, key: &CombinationKey) -> Option<&Combination> {
        self.combinations.get(key)
    }

    /// Ids of the faces covered by at least one box, in ascending order.
    pub fn covered_faces(&self) -> &[u32] {
        &self.covered_faces
    }

    /// Number of faces of the decomposed surface.
    pub fn total_faces(&self) -> usize {
        self.total_faces
    }

    /// Number of boxes across all combinations.
    pub fn num_boxes(&self) -> usize {
        self.combinations.values().map(|c| c.boxes.len()).sum()
    }

    /// Whether every face of the surface is covered by some box.
    pub fn is_complete(&self) -> bool {
        self.covered_faces.len() == self.total_faces
    }

    /// All boxes flattened into a single list, ordered combination-major,
    /// with ids renumbered to match their position in the flat list.
    pub fn all_boxes(&self) -> BoxList {
        let mut all = BoxList::new();
        let mut id = 0;
        for combination in self.combinations.values() {
            for item in combination.boxes.iter() {
                let mut item = item.clone();
                item.set_id(id);
                id += 1;
                all.push(item);
            }
        }
        all
    }
}

/// Covers a surface with boxes by seeding candidates on progressively finer
/// decimations of it and growing each against its combination's grid.
pub struct CoverageEngine {
    params: DecompositionParameters,
}

impl CoverageEngine {
    /// Creates an engine after validating the parameters.
    pub fn new(params: DecompositionParameters) -> Result<CoverageEngine, DecompositionError> {
        params.validate()?;
        Ok(CoverageEngine { params })
    }

    /// The parameters this engine runs with.
    pub fn params(&self) -> &DecompositionParameters {
        &self.params
    }

    /// Grows boxes until every face of `mesh` is covered by at least one of
    /// them.
    ///
    /// Candidates are seeded on the faces of a decimated copy of the surface,
    /// skipping faces already covered. The decimation budget starts small and
    /// doubles each iteration, so early boxes grow from coarse faces spanning
    /// large regions and later ones fill the remaining gaps. Once the budget
    /// reaches the full face count, every uncovered face seeds its own box;
    /// an iteration that still makes no progress at that point fails with
    /// [`DecompositionError::CoverageStall`].
    pub fn decompose(&self, mesh: &TriMesh) -> Result<Decomposition, DecompositionError> {
        let total_faces = mesh.num_triangles();
        let rotated: Vec<TriMesh> = (0..self.params.orientations)
            .map(|orientation| mesh.rotated(&orientation_rotation(orientation)))
            .collect();

        let keys = self.combination_keys();
        let build = |key: &CombinationKey| {
            (*key, self.build_grid(&rotated[key.orientation], *key))
        };
        #[cfg(not(feature = "parallel"))]
        let built: Vec<_> = keys.iter().map(build).collect();
        #[cfg(feature = "parallel")]
        let built: Vec<_> = keys.par_iter().map(build).collect();

        let mut grids = BTreeMap::new();
        let mut first_error = None;
        for (key, result) in built {
            match result {
                Ok(grid) => {
                    let _ = grids.insert(key, grid);
                }
                Err(error) => {
                    log::warn!("skipping combination {key:?}: {error}");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        if grids.is_empty() {
            return Err(first_error.unwrap_or(DecompositionError::CoverageStall {
                covered: 0,
                total: total_faces,
            }));
        }

        let mut boxes: BTreeMap<CombinationKey, BoxList> = BTreeMap::new();
        let mut covered: HashSet<u32> = HashSet::new();
        let mut budget = self.params.initial_decimation_budget;

        loop {
            let decimated: Vec<_> = rotated
                .iter()
                .map(|surface| decimate_to_face_budget(surface, budget))
                .collect();

            let mut work: Vec<(CombinationKey, Box3)> = Vec::new();
            for (key, grid) in &grids {
                for face in &decimated[key.orientation] {
                    if covered.contains(&face.birth_face) {
                        continue;
                    }

                    let normal = rotated[key.orientation].face_normal(face.birth_face);
                    let target = match key.target {
                        Some(target) => {
                            if self.params.only_nearest_target
                                && Target::nearest(&normal) != target
                            {
                                continue;
                            }
                            target
                        }
                        None => Target::nearest(&normal),
                    };

                    let mut seed = Box3::from_triangle(
                        &face.triangle,
                        orientation_rotation(key.orientation),
                        target,
                        self.params.kernel_distance,
                    );
                    seed.clamp_extents_to(grid.aabb());
                    work.push((*key, seed));
                }
            }

            let grow = |(key, seed): (CombinationKey, Box3)| {
                self.grow_candidate(&grids[&key], &rotated[key.orientation], seed)
                    .map(|(item, faces)| (key, item, faces))
            };
            #[cfg(not(feature = "parallel"))]
            let grown: Vec<_> = work.into_iter().map(grow).collect();
            #[cfg(feature = "parallel")]
            let grown: Vec<_> = work.into_par_iter().map(grow).collect();

            let mut new_boxes = 0;
            for (key, item, faces) in grown.into_iter().flatten() {
                covered.extend(faces);
                boxes.entry(key).or_default().push(item);
                new_boxes += 1;
            }

            log::info!(
                "budget {budget}: covered {}/{total_faces} faces with {new_boxes} new boxes",
                covered.len(),
            );

            if covered.len() >= total_faces {
                break;
            }
            if budget >= total_faces {
                return Err(DecompositionError::CoverageStall {
                    covered: covered.len(),
                    total: total_faces,
                });
            }
            budget = (budget * 2).min(total_faces);
        }

        let mut combinations = BTreeMap::new();
        for (key, grid) in grids {
            let list = boxes.remove(&key).unwrap_or_default();
            let _ = combinations.insert(key, Combination { grid, boxes: list });
        }

        let mut covered_faces: Vec<u32> = covered.into_iter().collect();
        covered_faces.sort_unstable();

        Ok(Decomposition {
            combinations,
            covered_faces,
            total_faces,
        })
    }

    fn combination_keys(&self) -> Vec<CombinationKey> {
        let mut keys = Vec::new();
        for orientation in 0..self.params.orientations {
            if self.params.heightfield_mode {
                for target in Target::all() {
                    keys.push(CombinationKey {
                        orientation,
                        target: Some(target),
                    });
                }
            } else {
                keys.push(CombinationKey {
                    orientation,
                    target: None,
                });
            }
        }
        keys
    }

    fn build_grid(
        &self,
        surface: &TriMesh,
        key: CombinationKey,
    ) -> Result<SignedDistanceGrid, DecompositionError> {
        let classification = key.target.map(|target| {
            classify_faces(
                surface,
                target,
                self.params.flip_angle_threshold,
                self.params.flip_area_threshold,
            )
        });
        let mut grid =
            SignedDistanceGrid::build(surface, &self.params, key.target, classification.as_ref())?;
        grid.reset_signed_distances();
        Ok(grid)
    }

    /// Grows one candidate and collects the faces it fully contains.
    ///
    /// Optimization failures discard the candidate instead of aborting the
    /// covering run; the faces it would have covered are picked up by a
    /// later iteration.
    fn grow_candidate(
        &self,
        grid: &SignedDistanceGrid,
        surface: &TriMesh,
        mut seed: Box3,
    ) -> Option<(Box3, Vec<u32>)> {
        let model = EnergyModel::new(grid, &self.params);
        let outcome = match model.bfgs(&mut seed, None) {
            Ok(outcome) => outcome,
            Err(error) => {
                log::warn!("discarding a candidate box: {error}");
                return None;
            }
        };
        log::trace!(
            "grew a box in {} iterations down to energy {}",
            outcome.iterations(),
            outcome.energy(),
        );

        let mut hits = Vec::new();
        surface.bvh().intersect_aabb(&seed.local_aabb(), &mut hits);
        let mut faces: Vec<u32> = hits
            .into_iter()
            .filter(|fid| seed.contains_triangle(&surface.triangle(*fid)))
            .collect();
        faces.sort_unstable();
        seed.set_covered_faces(faces.clone());
        Some((seed, faces))
    }
}
