use std::collections::HashMap;

use crate::types::{Color, VId};

/// A vertex of the data graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    /// Dense id, equal to the vertex's index in [`Graph::vertices`].
    pub id: VId,
    /// The id the input file gave this vertex.
    pub ext: i64,
    pub color: Color,
}

/// A directed edge of the data graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Index in [`Graph::edges`].
    pub idx: usize,
    pub src: VId,
    pub targ: VId,
    pub color: Color,
}

/// A labeled digraph, immutable once mining starts.
///
/// Vertex and edge labels share one intern table; [`Graph::color_frequency`]
/// counts every occurrence of a color across both, which is what the
/// support pre-filters compare against.
#[derive(Debug)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    kids: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
    colors: Vec<String>,
    color_ids: HashMap<String, Color>,
    frequencies: Vec<usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            kids: Vec::new(),
            parents: Vec::new(),
            colors: Vec::new(),
            color_ids: HashMap::new(),
            frequencies: Vec::new(),
        }
    }

    /// Adds a vertex whose external id equals its dense id.
    pub fn add_vertex(&mut self, label: &str) -> VId {
        let ext = self.vertices.len() as i64;
        self.add_vertex_ext(ext, label)
    }

    pub fn add_vertex_ext(&mut self, ext: i64, label: &str) -> VId {
        let id = self.vertices.len() as VId;
        let color = self.intern(label);
        self.frequencies[color as usize] += 1;
        self.vertices.push(Vertex { id, ext, color });
        self.kids.push(Vec::new());
        self.parents.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, src: VId, targ: VId, label: &str) -> usize {
        let idx = self.edges.len();
        let color = self.intern(label);
        self.frequencies[color as usize] += 1;
        self.edges.push(Edge {
            idx,
            src,
            targ,
            color,
        });
        self.kids[src as usize].push(idx);
        self.parents[targ as usize].push(idx);
        idx
    }

    fn intern(&mut self, label: &str) -> Color {
        if let Some(&c) = self.color_ids.get(label) {
            return c;
        }
        let c = self.colors.len() as Color;
        self.colors.push(label.to_string());
        self.color_ids.insert(label.to_string(), c);
        self.frequencies.push(0);
        c
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex(&self, v: VId) -> &Vertex {
        &self.vertices[v as usize]
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// Outgoing edge indices of `v`.
    pub fn kids(&self, v: VId) -> &[usize] {
        &self.kids[v as usize]
    }

    /// Incoming edge indices of `v`.
    pub fn parents(&self, v: VId) -> &[usize] {
        &self.parents[v as usize]
    }

    /// Total occurrences of `c` across vertices and edges.
    pub fn color_frequency(&self, c: Color) -> usize {
        self.frequencies[c as usize]
    }

    pub fn color(&self, c: Color) -> &str {
        &self.colors[c as usize]
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_vertex_and_edge_labels() {
        let mut g = Graph::new();
        let a = g.add_vertex("x");
        let b = g.add_vertex("x");
        g.add_edge(a, b, "x");
        let c = g.vertex(a).color;
        assert_eq!(g.vertex(b).color, c);
        assert_eq!(g.edge(0).color, c);
        assert_eq!(g.color_frequency(c), 3);
        assert_eq!(g.color(c), "x");
    }

    #[test]
    fn adjacency_tracks_direction() {
        let mut g = Graph::new();
        let a = g.add_vertex("a");
        let b = g.add_vertex("b");
        let e = g.add_edge(a, b, "e");
        assert_eq!(g.kids(a), &[e]);
        assert_eq!(g.parents(b), &[e]);
        assert!(g.kids(b).is_empty());
        assert!(g.parents(a).is_empty());
    }
}
