use std::collections::HashMap;

use crate::graph::{canon, Graph, GraphError};
use crate::types::{Color, Label, VId};

/// A vertex occurrence inside an embedding, stored in canonical slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbVertex {
    /// Identity of the occurrence in the data graph.
    pub id: VId,
    pub color: Color,
}

/// An edge of an embedding; `src` and `targ` are slot positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EmbEdge {
    pub src: usize,
    pub targ: usize,
    pub color: Color,
}

/// One occurrence of a pattern in the data graph: a connected subgraph
/// identified by its vertex and edge identities.
///
/// Vertices are kept in canonical slot order (automorphism ties broken by
/// discovery order), so embeddings of the same pattern expose corresponding
/// vertices at the same slot and [`short_label`] is a direct encoding of
/// the stored data. An embedding is distinct from its isomorphism class:
/// a symmetric subgraph occurs once per automorphism-distinct slot
/// assignment. All operations produce new values; an embedding is never
/// mutated.
///
/// [`short_label`]: Embedding::short_label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    v: Vec<EmbVertex>,
    e: Vec<EmbEdge>,
}

impl Embedding {
    /// The one-vertex subgraph at `v`.
    pub fn single(g: &Graph, v: VId) -> Embedding {
        Embedding {
            v: vec![EmbVertex {
                id: v,
                color: g.vertex(v).color,
            }],
            e: Vec::new(),
        }
    }

    /// Extends this embedding with the graph edge at `edge_idx`, pulling in
    /// the missing endpoint when there is one.
    pub fn extend(&self, g: &Graph, edge_idx: usize) -> Embedding {
        let edge = g.edge(edge_idx);
        let mut ids: Vec<VId> = self.v.iter().map(|v| v.id).collect();
        ids.push(edge.src);
        ids.push(edge.targ);
        let mut triples = self.triples();
        triples.push((edge.src, edge.targ, edge.color));
        Self::build(g, ids, triples)
    }

    /// Removes the edge at slot position `pos`. Vertices left isolated are
    /// discarded; if the remainder is disconnected the largest component
    /// survives (most edges, then most vertices, then the one holding the
    /// smallest slot), so the result is always connected and deterministic.
    pub fn remove_edge(&self, g: &Graph, pos: usize) -> Embedding {
        let mut triples = self.triples();
        triples.remove(pos);

        // connected components over the remaining structure
        let ids: Vec<VId> = self.v.iter().map(|v| v.id).collect();
        let index_of: HashMap<VId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut comp: Vec<usize> = (0..ids.len()).collect();
        fn root(comp: &mut Vec<usize>, mut i: usize) -> usize {
            while comp[i] != i {
                comp[i] = comp[comp[i]];
                i = comp[i];
            }
            i
        }
        for &(s, t, _) in &triples {
            let a = root(&mut comp, index_of[&s]);
            let b = root(&mut comp, index_of[&t]);
            comp[a] = b;
        }

        let mut edge_count: HashMap<usize, usize> = HashMap::new();
        let mut vert_count: HashMap<usize, usize> = HashMap::new();
        let mut min_slot: HashMap<usize, usize> = HashMap::new();
        for i in 0..ids.len() {
            let r = root(&mut comp, i);
            *vert_count.entry(r).or_insert(0) += 1;
            min_slot.entry(r).or_insert(i);
        }
        for &(s, _, _) in &triples {
            let r = root(&mut comp, index_of[&s]);
            *edge_count.entry(r).or_insert(0) += 1;
        }
        let keep = (0..ids.len())
            .map(|i| root(&mut comp, i))
            .min_by_key(|r| {
                (
                    usize::MAX - edge_count.get(r).copied().unwrap_or(0),
                    usize::MAX - vert_count[r],
                    min_slot[r],
                )
            })
            .expect("embeddings are never empty");

        let kept_ids: Vec<VId> = (0..ids.len())
            .filter(|&i| root(&mut comp, i) == keep)
            .map(|i| ids[i])
            .collect();
        let kept_triples: Vec<(VId, VId, Color)> = triples
            .into_iter()
            .filter(|&(s, _, _)| root(&mut comp, index_of[&s]) == keep)
            .collect();
        Self::build(g, kept_ids, kept_triples)
    }

    /// Whether the (src, targ, color) arc is already part of this embedding.
    pub fn has_edge(&self, src: VId, targ: VId, color: Color) -> bool {
        self.e.iter().any(|e| {
            self.v[e.src].id == src && self.v[e.targ].id == targ && e.color == color
        })
    }

    pub fn vertices(&self) -> &[EmbVertex] {
        &self.v
    }

    pub fn edges(&self) -> &[EmbEdge] {
        &self.e
    }

    /// The canonical short label: equal for two embeddings exactly when they
    /// are isomorphic as labeled subgraphs.
    pub fn short_label(&self) -> Label {
        let colors: Vec<Color> = self.v.iter().map(|v| v.color).collect();
        let edges: Vec<(usize, usize, Color)> =
            self.e.iter().map(|e| (e.src, e.targ, e.color)).collect();
        canon::encode_label(&colors, &edges)
    }

    /// A human-readable pattern name, e.g. `3:3[a,a,a](0->1:e)(1->2:e)(2->0:e)`.
    pub fn name(&self, g: &Graph) -> String {
        let mut s = format!("{}:{}[", self.v.len(), self.e.len());
        for (i, v) in self.v.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(g.color(v.color));
        }
        s.push(']');
        for e in &self.e {
            s.push_str(&format!("({}->{}:{})", e.src, e.targ, g.color(e.color)));
        }
        s
    }

    /// Serializes the embedding, identity and slot order included. Two
    /// automorphism-distinct slot assignments of the same subgraph keep
    /// distinct bytes, so the uniqueness index records them as separate
    /// occurrences.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 4 * self.v.len() + 12 * self.e.len());
        buf.extend_from_slice(&(self.v.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.e.len() as u32).to_le_bytes());
        for v in &self.v {
            buf.extend_from_slice(&v.id.to_le_bytes());
        }
        for e in &self.e {
            buf.extend_from_slice(&(e.src as u32).to_le_bytes());
            buf.extend_from_slice(&(e.targ as u32).to_le_bytes());
            buf.extend_from_slice(&e.color.to_le_bytes());
        }
        buf
    }

    pub fn deserialize(g: &Graph, bytes: &[u8]) -> Result<Embedding, GraphError> {
        let mut r = Reader { bytes, off: 0 };
        let n = r.u32()? as usize;
        let m = r.u32()? as usize;
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            let id = r.u32()?;
            if id as usize >= g.vertices().len() {
                return Err(GraphError::Corrupt(format!("vertex id {id} out of range")));
            }
            v.push(EmbVertex {
                id,
                color: g.vertex(id).color,
            });
        }
        let mut e = Vec::with_capacity(m);
        for _ in 0..m {
            let src = r.u32()? as usize;
            let targ = r.u32()? as usize;
            let color = r.u32()?;
            if src >= n || targ >= n {
                return Err(GraphError::Corrupt(format!(
                    "edge slot ({src},{targ}) out of range"
                )));
            }
            e.push(EmbEdge { src, targ, color });
        }
        if r.off != bytes.len() {
            return Err(GraphError::Corrupt("trailing bytes".to_string()));
        }
        Ok(Embedding { v, e })
    }

    /// Canonicalizes a vertex/edge identity set into an embedding. The
    /// discovery order of the vertices (existing slots first, appended
    /// endpoints last) is the canonical search's tie-breaker, so automorphic
    /// slot assignments of one subgraph stay distinct occurrences while
    /// sharing a short label; minimum-image support counts each of them.
    fn build(g: &Graph, ids: Vec<VId>, triples: Vec<(VId, VId, Color)>) -> Embedding {
        let mut uniq: Vec<VId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !uniq.contains(&id) {
                uniq.push(id);
            }
        }
        let ids = uniq;
        let mut triples = triples;
        triples.sort_unstable();
        triples.dedup();

        let index_of: HashMap<VId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let colors: Vec<Color> = ids.iter().map(|&id| g.vertex(id).color).collect();
        let raw_edges: Vec<(usize, usize, Color)> = triples
            .iter()
            .map(|&(s, t, c)| (index_of[&s], index_of[&t], c))
            .collect();

        let order = canon::canonical_order(&colors, &raw_edges);
        let mut pos = vec![0usize; ids.len()];
        for (slot, &old) in order.iter().enumerate() {
            pos[old] = slot;
        }
        let v: Vec<EmbVertex> = order
            .iter()
            .map(|&old| EmbVertex {
                id: ids[old],
                color: colors[old],
            })
            .collect();
        let mut e: Vec<EmbEdge> = raw_edges
            .iter()
            .map(|&(s, t, c)| EmbEdge {
                src: pos[s],
                targ: pos[t],
                color: c,
            })
            .collect();
        e.sort_unstable();
        Embedding { v, e }
    }

    fn triples(&self) -> Vec<(VId, VId, Color)> {
        self.e
            .iter()
            .map(|e| (self.v[e.src].id, self.v[e.targ].id, e.color))
            .collect()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl Reader<'_> {
    fn u32(&mut self) -> Result<u32, GraphError> {
        let end = self.off + 4;
        if end > self.bytes.len() {
            return Err(GraphError::Corrupt("truncated".to_string()));
        }
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.bytes[self.off..end]);
        self.off = end;
        Ok(u32::from_le_bytes(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let vs: Vec<VId> = (0..n).map(|_| g.add_vertex("a")).collect();
        for w in vs.windows(2) {
            g.add_edge(w[0], w[1], "e");
        }
        g
    }

    #[test]
    fn extend_grows_one_edge() {
        let g = chain(3);
        let sg = Embedding::single(&g, 0).extend(&g, 0);
        assert_eq!(sg.vertices().len(), 2);
        assert_eq!(sg.edges().len(), 1);
        let sg = sg.extend(&g, 1);
        assert_eq!(sg.vertices().len(), 3);
        assert_eq!(sg.edges().len(), 2);
    }

    #[test]
    fn discovery_order_preserves_the_label() {
        let g = chain(3);
        let forward = Embedding::single(&g, 0).extend(&g, 0).extend(&g, 1);
        let backward = Embedding::single(&g, 2).extend(&g, 1).extend(&g, 0);
        assert_eq!(forward.short_label(), backward.short_label());
    }

    #[test]
    fn automorphic_rotations_stay_distinct() {
        // the directed triangle occurs once per rotation of its slot
        // assignment, all under one label
        let mut g = Graph::new();
        let a = g.add_vertex("a");
        let b = g.add_vertex("a");
        let c = g.add_vertex("a");
        g.add_edge(a, b, "e");
        g.add_edge(b, c, "e");
        g.add_edge(c, a, "e");
        let rotations = [
            Embedding::single(&g, a).extend(&g, 0).extend(&g, 1).extend(&g, 2),
            Embedding::single(&g, b).extend(&g, 1).extend(&g, 2).extend(&g, 0),
            Embedding::single(&g, c).extend(&g, 2).extend(&g, 0).extend(&g, 1),
        ];
        let label = rotations[0].short_label();
        assert!(rotations.iter().all(|sg| sg.short_label() == label));
        let bytes: Vec<Vec<u8>> = rotations.iter().map(Embedding::serialize).collect();
        assert_ne!(bytes[0], bytes[1]);
        assert_ne!(bytes[1], bytes[2]);
        assert_ne!(bytes[0], bytes[2]);
    }

    #[test]
    fn same_pattern_different_occurrence() {
        let g = chain(4);
        let first = Embedding::single(&g, 0).extend(&g, 0);
        let second = Embedding::single(&g, 1).extend(&g, 1);
        assert_eq!(first.short_label(), second.short_label());
        assert_ne!(first.serialize(), second.serialize());
    }

    #[test]
    fn has_edge_by_identity() {
        let g = chain(3);
        let sg = Embedding::single(&g, 0).extend(&g, 0);
        let e0 = g.edge(0);
        let e1 = g.edge(1);
        assert!(sg.has_edge(e0.src, e0.targ, e0.color));
        assert!(!sg.has_edge(e1.src, e1.targ, e1.color));
    }

    #[test]
    fn remove_only_edge_leaves_a_vertex() {
        let g = chain(2);
        let sg = Embedding::single(&g, 0).extend(&g, 0);
        let sub = sg.remove_edge(&g, 0);
        assert_eq!(sub.vertices().len(), 1);
        assert!(sub.edges().is_empty());
    }

    #[test]
    fn remove_disconnecting_edge_keeps_a_component() {
        // 0 -> 1 -> 2 -> 3, dropping the middle edge
        let g = chain(4);
        let sg = Embedding::single(&g, 0)
            .extend(&g, 0)
            .extend(&g, 1)
            .extend(&g, 2);
        let middle = sg
            .edges()
            .iter()
            .position(|e| sg.vertices()[e.src].id == 1)
            .unwrap();
        let sub = sg.remove_edge(&g, middle);
        assert_eq!(sub.vertices().len(), 2);
        assert_eq!(sub.edges().len(), 1);
    }

    #[test]
    fn serialize_round_trip() {
        let g = chain(4);
        let sg = Embedding::single(&g, 1).extend(&g, 1).extend(&g, 2);
        let bytes = sg.serialize();
        let back = Embedding::deserialize(&g, &bytes).unwrap();
        assert_eq!(back, sg);
        assert_eq!(back.short_label(), sg.short_label());
        assert_eq!(back.serialize(), bytes);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        let g = chain(2);
        assert!(Embedding::deserialize(&g, &[1, 2, 3]).is_err());
        let mut bytes = Embedding::single(&g, 0).serialize();
        bytes.push(0);
        assert!(Embedding::deserialize(&g, &bytes).is_err());
    }
}
