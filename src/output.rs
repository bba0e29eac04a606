//! Per-pattern output rendering: a numbered directory per reported pattern
//! holding the pattern name, veg and dot renderings, instance embeddings,
//! counts, and the probability matrices.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::graph::load::VertexAttrs;
use crate::graph::{Embedding, Graph};
use crate::mine::{MineError, PrMatrices};

pub struct PatternWriter<'g> {
    graph: &'g Graph,
    attrs: &'g VertexAttrs,
    out_dir: PathBuf,
}

impl<'g> PatternWriter<'g> {
    pub fn new(graph: &'g Graph, attrs: &'g VertexAttrs, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            attrs,
            out_dir: out_dir.into(),
        }
    }

    /// Writes the directory for the `idx`-th reported pattern and returns
    /// its path. `part` holds every recorded embedding of the pattern;
    /// `duplicates` is the number of walks that landed on its label.
    pub fn write_pattern(
        &self,
        idx: usize,
        part: &[Embedding],
        duplicates: usize,
    ) -> io::Result<PathBuf> {
        let dir = self.out_dir.join(idx.to_string());
        fs::create_dir_all(&dir)?;
        let pattern = &part[0];
        fs::write(
            dir.join("pattern.name"),
            format!("{}\n", pattern.name(self.graph)),
        )?;
        fs::write(dir.join("pattern.dot"), self.to_dot(pattern))?;
        fs::write(dir.join("pattern.veg"), self.to_veg(pattern, false))?;
        fs::write(dir.join("duplicates"), format!("{duplicates}\n"))?;
        fs::write(dir.join("count"), format!("{}\n", part.len()))?;
        for (j, sg) in part.iter().enumerate() {
            let inst = dir.join("instances").join(j.to_string());
            fs::create_dir_all(&inst)?;
            fs::write(inst.join("embedding.veg"), self.to_veg(sg, true))?;
            fs::write(inst.join("embedding.dot"), self.to_dot(sg))?;
        }
        Ok(dir)
    }

    pub fn write_matrices(&self, dir: &Path, matrices: &PrMatrices) -> io::Result<()> {
        let value = json!({
            "Q": matrices.q,
            "R": matrices.r,
            "u": matrices.u,
            "startingPoints": matrices.starting_points,
        });
        fs::write(dir.join("matrices.json"), serde_json::to_vec(&value)?)
    }

    pub fn write_error(&self, dir: &Path, err: &MineError) -> io::Result<()> {
        fs::write(dir.join("error"), format!("{err}\n"))
    }

    fn to_veg(&self, sg: &Embedding, with_attrs: bool) -> String {
        let mut out = String::new();
        for v in sg.vertices() {
            let vertex = self.graph.vertex(v.id);
            let mut obj = if with_attrs {
                self.attrs
                    .get(v.id as usize)
                    .cloned()
                    .unwrap_or_else(Map::new)
            } else {
                Map::new()
            };
            obj.insert("id".to_string(), Value::from(vertex.ext));
            obj.insert(
                "label".to_string(),
                Value::from(self.graph.color(v.color)),
            );
            let _ = writeln!(out, "vertex\t{}", Value::Object(obj));
        }
        for e in sg.edges() {
            let src = self.graph.vertex(sg.vertices()[e.src].id);
            let targ = self.graph.vertex(sg.vertices()[e.targ].id);
            let obj = json!({
                "src": src.ext,
                "targ": targ.ext,
                "label": self.graph.color(e.color),
            });
            let _ = writeln!(out, "edge\t{obj}");
        }
        out
    }

    fn to_dot(&self, sg: &Embedding) -> String {
        let mut out = String::from("digraph {\n");
        for (slot, v) in sg.vertices().iter().enumerate() {
            let _ = writeln!(
                out,
                "  n{} [label={:?}];",
                slot,
                self.graph.color(v.color)
            );
        }
        for e in sg.edges() {
            let _ = writeln!(
                out,
                "  n{} -> n{} [label={:?}];",
                e.src,
                e.targ,
                self.graph.color(e.color)
            );
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VId;

    fn chain(n: usize) -> (Graph, VertexAttrs) {
        let mut g = Graph::new();
        let vs: Vec<VId> = (0..n).map(|_| g.add_vertex("a")).collect();
        for w in vs.windows(2) {
            g.add_edge(w[0], w[1], "e");
        }
        let attrs = vec![Map::new(); n];
        (g, attrs)
    }

    #[test]
    fn writes_the_pattern_directory() {
        let (g, attrs) = chain(3);
        let part = vec![
            Embedding::single(&g, 0).extend(&g, 0),
            Embedding::single(&g, 1).extend(&g, 1),
        ];
        let tmp = tempfile::tempdir().unwrap();
        let writer = PatternWriter::new(&g, &attrs, tmp.path());
        let dir = writer.write_pattern(0, &part, 3).unwrap();
        assert!(dir.join("pattern.name").exists());
        assert!(dir.join("pattern.veg").exists());
        assert!(dir.join("pattern.dot").exists());
        assert_eq!(fs::read_to_string(dir.join("duplicates")).unwrap(), "3\n");
        assert_eq!(fs::read_to_string(dir.join("count")).unwrap(), "2\n");
        assert!(dir.join("instances/0/embedding.veg").exists());
        assert!(dir.join("instances/1/embedding.veg").exists());
    }

    #[test]
    fn veg_lines_round_trip_through_the_loader() {
        let (g, attrs) = chain(3);
        let sg = Embedding::single(&g, 0).extend(&g, 0).extend(&g, 1);
        let tmp = tempfile::tempdir().unwrap();
        let writer = PatternWriter::new(&g, &attrs, tmp.path());
        let veg = writer.to_veg(&sg, true);
        let (loaded, _) =
            crate::graph::load::load_veg(std::io::Cursor::new(veg)).unwrap();
        assert_eq!(loaded.vertices().len(), 3);
        assert_eq!(loaded.edges().len(), 2);
    }
}
