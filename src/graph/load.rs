//! Loader for the line-oriented veg format:
//!
//! ```text
//! vertex\t{"id":<int>,"label":<string>, ...}
//! edge\t{"src":<int>,"targ":<int>,"label":<string>, ...}
//! ```
//!
//! Extra JSON keys are ignored but retained as node attributes for output.
//! Input may be a plain file, a gzipped file (`.gz`), or a directory whose
//! files are concatenated. Malformed lines are collected and reported as a
//! single aggregated error once the whole input has been read.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::graph::Graph;
use crate::types::VId;

/// Raw JSON attributes per vertex, aligned with the dense vertex ids.
pub type VertexAttrs = Vec<Map<String, Value>>;

#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct LoadError {
    pub line: usize,
    pub kind: LoadErrorKind,
}

#[derive(Debug, Error)]
pub enum LoadErrorKind {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("bad json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown line type {0:?}")]
    UnknownLineType(String),
    #[error("missing integer {0:?}")]
    MissingInt(&'static str),
    #[error("missing string \"label\"")]
    MissingLabel,
    #[error("duplicate vertex id {0}")]
    DuplicateVertex(i64),
    #[error("edge references unknown vertex id {0}")]
    UnknownVertex(i64),
}

/// Every malformed line of one load, aggregated.
#[derive(Debug, Error)]
pub struct LoadErrors(pub Vec<LoadError>);

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{err}")?;
        }
        write!(f, "]")
    }
}

/// Opens `path` for reading: a directory concatenates its files, a `.gz`
/// suffix gunzips.
pub fn open_input(path: &Path) -> io::Result<Box<dyn Read>> {
    if path.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(path)?
            .collect::<io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();
        let mut readers: Vec<Box<dyn Read>> = Vec::with_capacity(entries.len());
        for p in entries {
            readers.push(open_file(&p)?);
        }
        Ok(Box::new(Concat { readers }))
    } else {
        open_file(path)
    }
}

fn open_file(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

struct Concat {
    readers: Vec<Box<dyn Read>>,
}

impl Read for Concat {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(first) = self.readers.first_mut() {
            let n = first.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.readers.remove(0);
        }
        Ok(0)
    }
}

/// Loads a graph from `path`.
pub fn load_path(path: &Path) -> Result<(Graph, VertexAttrs), LoadErrors> {
    let reader = open_input(path).map_err(|e| {
        LoadErrors(vec![LoadError {
            line: 0,
            kind: e.into(),
        }])
    })?;
    load_veg(BufReader::new(reader))
}

/// Loads a graph from line-oriented veg input.
pub fn load_veg<R: BufRead>(reader: R) -> Result<(Graph, VertexAttrs), LoadErrors> {
    let mut g = Graph::new();
    let mut attrs: VertexAttrs = Vec::new();
    let mut vids: HashMap<i64, VId> = HashMap::new();
    let mut errors: Vec<LoadError> = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let lineno = lineno + 1;
        let mut fail = |kind: LoadErrorKind| {
            errors.push(LoadError { line: lineno, kind });
        };
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                fail(e.into());
                break;
            }
        };
        let Some((line_type, data)) = line.split_once('\t') else {
            continue; // blank or separator-free lines are skipped
        };
        match line_type.trim() {
            "vertex" => {
                if let Err(kind) = load_vertex(&mut g, &mut attrs, &mut vids, data.trim()) {
                    fail(kind);
                }
            }
            "edge" => {
                if let Err(kind) = load_edge(&mut g, &vids, data.trim()) {
                    fail(kind);
                }
            }
            other => fail(LoadErrorKind::UnknownLineType(other.to_string())),
        }
    }

    if errors.is_empty() {
        Ok((g, attrs))
    } else {
        Err(LoadErrors(errors))
    }
}

fn load_vertex(
    g: &mut Graph,
    attrs: &mut VertexAttrs,
    vids: &mut HashMap<i64, VId>,
    data: &str,
) -> Result<(), LoadErrorKind> {
    let obj: Map<String, Value> = serde_json::from_str(data)?;
    let id = int_field(&obj, "id")?;
    let label = str_field(&obj)?;
    if vids.contains_key(&id) {
        return Err(LoadErrorKind::DuplicateVertex(id));
    }
    let vid = g.add_vertex_ext(id, label.trim());
    vids.insert(id, vid);
    attrs.push(obj);
    Ok(())
}

fn load_edge(g: &mut Graph, vids: &HashMap<i64, VId>, data: &str) -> Result<(), LoadErrorKind> {
    let obj: Map<String, Value> = serde_json::from_str(data)?;
    let src = int_field(&obj, "src")?;
    let targ = int_field(&obj, "targ")?;
    let label = str_field(&obj)?;
    let &u = vids.get(&src).ok_or(LoadErrorKind::UnknownVertex(src))?;
    let &v = vids.get(&targ).ok_or(LoadErrorKind::UnknownVertex(targ))?;
    g.add_edge(u, v, label.trim());
    Ok(())
}

fn int_field(obj: &Map<String, Value>, name: &'static str) -> Result<i64, LoadErrorKind> {
    obj.get(name)
        .and_then(Value::as_i64)
        .ok_or(LoadErrorKind::MissingInt(name))
}

fn str_field(obj: &Map<String, Value>) -> Result<&str, LoadErrorKind> {
    obj.get("label")
        .and_then(Value::as_str)
        .ok_or(LoadErrorKind::MissingLabel)
}
