use std::collections::BTreeMap;

use crate::graph::Embedding;
use crate::mine::Partition;
use crate::types::VId;

/// For each vertex slot of the pattern, the distinct graph vertex ids seen
/// at that slot, each mapped to the first embedding that witnessed it.
pub fn vertex_sets(sgs: &[Embedding]) -> Vec<BTreeMap<VId, usize>> {
    if sgs.is_empty() {
        return Vec::new();
    }
    (0..sgs[0].vertices().len())
        .map(|i| {
            let mut seen = BTreeMap::new();
            for (j, sg) in sgs.iter().enumerate() {
                seen.entry(sg.vertices()[i].id).or_insert(j);
            }
            seen
        })
        .collect()
}

/// Filters a partition down to its minimum-image-support witnesses: the
/// slot with the fewest distinct vertex ids wins (first such slot on ties)
/// and its first-witness embeddings, in vertex-id order, are the support
/// set. Anti-monotone under edge extension, so safe for pruning.
pub fn minimum_image_support(sgs: Partition) -> Partition {
    if sgs.len() <= 1 {
        return sgs;
    }
    let sets = vertex_sets(&sgs);
    let mut arg = 0;
    for (i, set) in sets.iter().enumerate() {
        if set.len() < sets[arg].len() {
            arg = i;
        }
    }
    sets[arg].values().map(|&j| sgs[j].clone()).collect()
}
