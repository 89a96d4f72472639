//! Removal of boxes made redundant by the rest of a covering.

use crate::decomposition::box3::BoxList;
use crate::math::Real;

/// Removes every box whose covered faces are all covered by other boxes too.
///
/// The redundant box with the smallest volume is dropped first and the
/// remaining coverage is re-evaluated after each removal, so overlapping
/// boxes never disappear together. The union of covered faces is preserved:
/// a covering that was complete stays complete. Face ids must be smaller
/// than `total_faces`.
pub fn prune_redundant_boxes(boxes: &mut BoxList, total_faces: usize) {
    loop {
        let mut counts = vec![0u32; total_faces];
        for item in boxes.iter() {
            for fid in item.covered_faces() {
                counts[*fid as usize] += 1;
            }
        }

        let mut victim: Option<(usize, Real)> = None;
        for (index, item) in boxes.iter().enumerate() {
            let unique = item
                .covered_faces()
                .iter()
                .filter(|fid| counts[**fid as usize] == 1)
                .count();
            if unique > 0 {
                continue;
            }

            let volume = item.volume();
            if victim.map_or(true, |(_, smallest)| volume < smallest) {
                victim = Some((index, volume));
            }
        }

        let Some((index, _)) = victim else { break };
        let removed = boxes.remove(index);
        log::debug!("pruned redundant box {}", removed.id());
    }
}
