//! The host graph library: the immutable data graph, embeddings with
//! canonical short labels, the sub-pattern lattice, and the veg loader.

pub use self::embedding::{EmbEdge, EmbVertex, Embedding};
pub use self::graph::{Edge, Graph, Vertex};
pub use self::lattice::{Lattice, LatticeEdge};

pub(crate) mod canon;
mod embedding;
#[allow(clippy::module_inception)]
mod graph;
mod lattice;
pub mod load;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("corrupt embedding bytes: {0}")]
    Corrupt(String),
}
