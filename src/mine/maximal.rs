use crate::graph::{Embedding, Graph};
use crate::mine::MineError;
use crate::store::{StoreFactory, SubGraphStore};
use crate::types::Label;

/// Emits the labels in `all` that are not sub-patterns of another label in
/// `all`, in descending label order.
///
/// Walks the store backward (strictly descending keys); the first pair of
/// each key plants the labels of its one-edge-removed parents in a side
/// tree, so by the time a smaller key comes up, any strict supergraph seen
/// earlier has already marked it. The side tree lives in `factory` for the
/// duration of the call.
pub fn maximal_sub_graphs(
    g: &Graph,
    all: &SubGraphStore,
    factory: &mut StoreFactory,
) -> Result<Vec<Label>, MineError> {
    let labels = factory.unique_index()?;
    let mut out = Vec::new();
    let mut cur: Option<Label> = None;
    let mut had = false;
    for (key, bytes) in all.backward()? {
        if let Some(c) = &cur {
            if *c != key {
                if !had {
                    out.push(c.clone());
                }
                had = false;
            }
        }
        if labels.has(&key)? {
            had = true;
        }
        if cur.as_ref() != Some(&key) {
            // plant all of the (potential) parents of this pattern
            let sg = Embedding::deserialize(g, &bytes)?;
            for pos in 0..sg.edges().len() {
                let parent = sg.remove_edge(g, pos).short_label();
                if !labels.has(&parent)? {
                    labels.add(&parent)?;
                }
            }
        }
        cur = Some(key);
    }
    if !had {
        if let Some(c) = cur {
            out.push(c);
        }
    }
    labels.delete()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VId;

    fn chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let vs: Vec<VId> = (0..n).map(|_| g.add_vertex("a")).collect();
        for w in vs.windows(2) {
            g.add_edge(w[0], w[1], "e");
        }
        g
    }

    fn store_with(sgs: &[Embedding]) -> SubGraphStore {
        let s = SubGraphStore::anonymous().unwrap();
        for sg in sgs {
            s.add(&sg.short_label(), &sg.serialize()).unwrap();
        }
        s
    }

    #[test]
    fn immediate_sub_patterns_are_suppressed() {
        let g = chain(3);
        let edge = Embedding::single(&g, 0).extend(&g, 0);
        let path = edge.extend(&g, 1);
        let all = store_with(&[edge.clone(), path.clone()]);
        let mut factory = StoreFactory::anonymous();
        let maximal = maximal_sub_graphs(&g, &all, &mut factory).unwrap();
        assert_eq!(maximal, vec![path.short_label()]);
        all.delete().unwrap();
    }

    #[test]
    fn incomparable_patterns_both_survive() {
        // a 2-path and a fork share no sub/super relation
        let mut g = Graph::new();
        let a = g.add_vertex("a");
        let b = g.add_vertex("a");
        let c = g.add_vertex("a");
        let d = g.add_vertex("a");
        g.add_edge(a, b, "e");
        g.add_edge(b, c, "e");
        g.add_edge(b, d, "e");
        let path = Embedding::single(&g, a).extend(&g, 0).extend(&g, 1);
        let fork = Embedding::single(&g, b).extend(&g, 1).extend(&g, 2);
        let all = store_with(&[path.clone(), fork.clone()]);
        let mut factory = StoreFactory::anonymous();
        let mut maximal = maximal_sub_graphs(&g, &all, &mut factory).unwrap();
        maximal.sort();
        let mut expected = vec![path.short_label(), fork.short_label()];
        expected.sort();
        assert_eq!(maximal, expected);
        all.delete().unwrap();
    }

    #[test]
    fn filter_is_idempotent() {
        let g = chain(3);
        let edge = Embedding::single(&g, 0).extend(&g, 0);
        let path = edge.extend(&g, 1);
        let all = store_with(&[edge, path.clone()]);
        let mut factory = StoreFactory::anonymous();
        let first = maximal_sub_graphs(&g, &all, &mut factory).unwrap();
        let survivors = store_with(&[path]);
        let second = maximal_sub_graphs(&g, &survivors, &mut factory).unwrap();
        assert_eq!(first, second);
        all.delete().unwrap();
        survivors.delete().unwrap();
    }

    #[test]
    fn multiple_embeddings_per_label_plant_once() {
        let g = chain(4);
        let edges: Vec<Embedding> = (0..3)
            .map(|e| Embedding::single(&g, g.edge(e).src).extend(&g, e))
            .collect();
        let all = store_with(&edges);
        let mut factory = StoreFactory::anonymous();
        let maximal = maximal_sub_graphs(&g, &all, &mut factory).unwrap();
        assert_eq!(maximal, vec![edges[0].short_label()]);
        all.delete().unwrap();
    }
}
