use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{Embedding, Graph};
use crate::types::Label;

/// A "remove one edge" relation between lattice nodes, directed sub → super.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeEdge {
    pub src: usize,
    pub targ: usize,
}

/// The sub-pattern Hasse diagram of an embedding, one node per distinct
/// label. Nodes are ordered bottom-to-top with the full pattern last (the
/// absorbing state); the bottom row is the single-vertex patterns.
pub struct Lattice {
    pub v: Vec<Embedding>,
    pub e: Vec<LatticeEdge>,
}

impl Lattice {
    pub fn build(g: &Graph, top: &Embedding) -> Lattice {
        let mut nodes: HashMap<Label, Embedding> = HashMap::new();
        let mut rels: HashSet<(Label, Label)> = HashSet::new();
        let top_label = top.short_label();
        nodes.insert(top_label.clone(), top.clone());
        let mut queue = VecDeque::new();
        queue.push_back(top.clone());
        while let Some(sg) = queue.pop_front() {
            let label = sg.short_label();
            for pos in 0..sg.edges().len() {
                let sub = sg.remove_edge(g, pos);
                if sub.edges().len() + 1 != sg.edges().len() {
                    // the removal disconnected the pattern; the surviving
                    // component is not an immediate sub-pattern
                    continue;
                }
                let sub_label = sub.short_label();
                rels.insert((sub_label.clone(), label.clone()));
                if !nodes.contains_key(&sub_label) {
                    nodes.insert(sub_label, sub.clone());
                    queue.push_back(sub);
                }
            }
        }

        let mut keys: Vec<Label> = nodes.keys().cloned().collect();
        keys.sort_by_key(|k| {
            let sg = &nodes[k];
            (sg.edges().len(), sg.vertices().len(), k.clone())
        });
        debug_assert_eq!(keys.last(), Some(&top_label));
        let index: HashMap<&Label, usize> =
            keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let mut e: Vec<LatticeEdge> = rels
            .iter()
            .map(|(sub, sup)| LatticeEdge {
                src: index[sub],
                targ: index[sup],
            })
            .collect();
        e.sort_by_key(|le| (le.src, le.targ));
        let v = keys.iter().map(|k| nodes[k].clone()).collect();
        Lattice { v, e }
    }
}
