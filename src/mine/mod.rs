//! The mining engine: sharded collectors over the store layer, the
//! extension pipeline, minimum-image support, the random walk through the
//! subgraph partial order, the absorbing-chain probability matrices, and
//! the maximal-pattern filter.

pub use self::collectors::Collectors;
pub use self::maximal::maximal_sub_graphs;
pub use self::random_walk::{
    MinerConfig, Partition, PrMatrices, RandomWalkMiner, Sparse, SparseEntry,
};
pub use self::support::{minimum_image_support, vertex_sets};

mod collectors;
mod maximal;
mod random_walk;
mod support;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MineError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),
    #[error("building probability matrices: {0}")]
    Matrices(String),
}
