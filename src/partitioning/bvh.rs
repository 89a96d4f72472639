use crate::bounding_volume::Aabb;
use crate::math::{Point, Real};
use crate::utils::WeightedValue;

use smallvec::{smallvec, SmallVec};
use std::collections::BinaryHeap;

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug)]
enum BvhChildren {
    Leaf(u32),
    Internal { left: u32, right: u32 },
}

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug)]
struct BvhNode {
    aabb: Aabb,
    children: BvhChildren,
}

/// A binary bounding-volume-hierarchy over a set of Aabbs.
///
/// Leaves are identified by their index in the slice the tree was built from.
/// The tree is built by recursively splitting the leaf set at the median of
/// the leaf centers along the widest extent of their merged Aabb.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
}

impl Bvh {
    /// Builds a hierarchy over the given leaf Aabbs.
    pub fn from_leaves(leaves: &[Aabb]) -> Bvh {
        let mut result = Bvh { nodes: Vec::new() };

        if !leaves.is_empty() {
            result.nodes.reserve(leaves.len() * 2 - 1);
            let mut ids: Vec<u32> = (0..leaves.len() as u32).collect();
            let _ = result.build_recursive(leaves, &mut ids);
        }

        result
    }

    fn build_recursive(&mut self, leaves: &[Aabb], ids: &mut [u32]) -> u32 {
        let mut aabb = Aabb::new_invalid();
        for id in ids.iter() {
            aabb.merge(&leaves[*id as usize]);
        }

        let node_id = self.nodes.len() as u32;
        self.nodes.push(BvhNode {
            aabb,
            children: BvhChildren::Leaf(ids[0]),
        });

        if ids.len() > 1 {
            // Median split along the widest extent of the merged Aabb.
            let axis = aabb.extents().imax();
            ids.sort_unstable_by(|id1, id2| {
                let c1 = leaves[*id1 as usize].center()[axis];
                let c2 = leaves[*id2 as usize].center()[axis];
                c1.partial_cmp(&c2).unwrap_or(std::cmp::Ordering::Equal)
            });

            let (left_ids, right_ids) = ids.split_at_mut(ids.len() / 2);
            let left = self.build_recursive(leaves, left_ids);
            let right = self.build_recursive(leaves, right_ids);
            self.nodes[node_id as usize].children = BvhChildren::Internal { left, right };
        }

        node_id
    }

    /// The Aabb enclosing every leaf of this hierarchy.
    pub fn root_aabb(&self) -> Aabb {
        self.nodes
            .first()
            .map(|node| node.aabb)
            .unwrap_or_else(Aabb::new_invalid)
    }

    /// Collects the indices of every leaf whose Aabb intersects the given one.
    pub fn intersect_aabb(&self, aabb: &Aabb, out: &mut Vec<u32>) {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack: SmallVec<[u32; 32]> = smallvec![0];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }

            match node.children {
                BvhChildren::Leaf(leaf) => out.push(leaf),
                BvhChildren::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Finds the leaf minimizing the given cost, with a best-first traversal.
    ///
    /// `leaf_cost` must return the squared distance (or any cost bounded from
    /// below by the squared distance between `point` and the leaf Aabb) so
    /// that subtree bounds remain admissible.
    pub fn best_leaf(
        &self,
        point: &Point<Real>,
        mut leaf_cost: impl FnMut(u32) -> Real,
    ) -> Option<(u32, Real)> {
        if self.nodes.is_empty() {
            return None;
        }

        let bound = |node: &BvhNode| {
            let dist = node.aabb.distance_to_local_point(point);
            dist * dist
        };

        // `BinaryHeap` is a max-heap so costs are negated to pop the most
        // promising subtree first.
        let mut queue = BinaryHeap::new();
        queue.push(WeightedValue::new(0u32, -bound(&self.nodes[0])));

        let mut best: Option<(u32, Real)> = None;

        while let Some(entry) = queue.pop() {
            if let Some((_, best_cost)) = best {
                if -entry.cost >= best_cost {
                    break;
                }
            }

            match self.nodes[entry.value as usize].children {
                BvhChildren::Leaf(leaf) => {
                    let cost = leaf_cost(leaf);
                    if best.map(|(_, c)| cost < c).unwrap_or(true) {
                        best = Some((leaf, cost));
                    }
                }
                BvhChildren::Internal { left, right } => {
                    for child in [left, right] {
                        queue.push(WeightedValue::new(
                            child,
                            -bound(&self.nodes[child as usize]),
                        ));
                    }
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod test {
    use super::Bvh;
    use crate::bounding_volume::Aabb;
    use crate::math::Point;

    fn grid_leaves() -> Vec<Aabb> {
        // Sixteen unit boxes along the x axis.
        (0..16)
            .map(|i| {
                let x = i as f64 * 2.0;
                Aabb::new(Point::new(x, 0.0, 0.0), Point::new(x + 1.0, 1.0, 1.0))
            })
            .collect()
    }

    #[test]
    fn intersect_aabb_finds_exactly_the_overlapping_leaves() {
        let leaves = grid_leaves();
        let bvh = Bvh::from_leaves(&leaves);

        let mut hits = Vec::new();
        bvh.intersect_aabb(
            &Aabb::new(Point::new(3.5, 0.0, 0.0), Point::new(8.5, 1.0, 1.0)),
            &mut hits,
        );
        hits.sort_unstable();

        // Leaves 2, 3, 4 span x in [4, 5], [6, 7], [8, 9]... leaf 1 ends at 3.
        assert_eq!(hits, vec![2, 3, 4]);
    }

    #[test]
    fn best_leaf_returns_the_closest_center() {
        let leaves = grid_leaves();
        let bvh = Bvh::from_leaves(&leaves);

        let query = Point::new(10.6, 0.5, 0.5);
        let (leaf, cost) = bvh
            .best_leaf(&query, |id| {
                na::distance_squared(&leaves[id as usize].center(), &query)
            })
            .unwrap();

        // Leaf 5 is centered at (10.5, 0.5, 0.5).
        assert_eq!(leaf, 5);
        assert!(relative_eq!(cost, 0.01, epsilon = 1.0e-10));
    }

    #[test]
    fn empty_hierarchy_answers_nothing() {
        let bvh = Bvh::from_leaves(&[]);
        let mut hits = Vec::new();
        bvh.intersect_aabb(
            &Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0)),
            &mut hits,
        );

        assert!(hits.is_empty());
        assert!(bvh.best_leaf(&Point::origin(), |_| 0.0).is_none());
        assert!(!bvh.root_aabb().contains_local_point(&Point::origin()));
    }

    #[test]
    fn root_aabb_encloses_every_leaf() {
        let leaves = grid_leaves();
        let bvh = Bvh::from_leaves(&leaves);
        let root = bvh.root_aabb();

        for leaf in &leaves {
            assert!(root.contains(leaf));
        }
    }
}
