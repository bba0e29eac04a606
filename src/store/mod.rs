//! Persistent ordered stores over an embedded B+tree (redb).
//!
//! Three flavors share the same backing abstraction: [`SubGraphStore`]
//! (label → serialized embeddings, duplicates allowed), [`UniquenessIndex`]
//! (a set of serialized embeddings) and [`LabelSetMap`] (label → sorted
//! label set, single-valued). Stores hold scratch data with the lifetime of
//! one mining run: commits skip fsync and `delete` unlinks the backing
//! file. redb serializes writers per database and gives readers MVCC
//! snapshots, so the stores are shared by reference across threads.

pub use self::sets::LabelSetMap;
pub use self::subgraphs::SubGraphStore;
pub use self::unique::UniquenessIndex;

mod sets;
mod subgraphs;
mod unique;

use std::path::{Path, PathBuf};

use redb::backends::InMemoryBackend;
use redb::Database;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store database: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("store transaction: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("store table: {0}")]
    Table(#[from] redb::TableError),
    #[error("store access: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("store commit: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

fn create_db(path: Option<&Path>) -> Result<(Database, Option<PathBuf>)> {
    match path {
        Some(p) => Ok((Database::create(p)?, Some(p.to_path_buf()))),
        None => Ok((
            Database::builder().create_with_backend(InMemoryBackend::new())?,
            None,
        )),
    }
}

fn remove_backing(path: Option<PathBuf>) -> Result<()> {
    if let Some(p) = path {
        std::fs::remove_file(p)?;
    }
    Ok(())
}

/// Creates the numbered stores of one mining run, either file-backed under a
/// cache directory or anonymous in memory.
pub struct StoreFactory {
    dir: Option<PathBuf>,
    sub_graphs: usize,
    unique: usize,
    sets: usize,
}

impl StoreFactory {
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            sub_graphs: 0,
            unique: 0,
            sets: 0,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            dir: None,
            sub_graphs: 0,
            unique: 0,
            sets: 0,
        }
    }

    pub fn sub_graphs(&mut self) -> Result<SubGraphStore> {
        match Self::name(&self.dir, "subgraphs", &mut self.sub_graphs) {
            Some(p) => SubGraphStore::create(&p),
            None => SubGraphStore::anonymous(),
        }
    }

    pub fn unique_index(&mut self) -> Result<UniquenessIndex> {
        match Self::name(&self.dir, "unique-idx", &mut self.unique) {
            Some(p) => UniquenessIndex::create(&p),
            None => UniquenessIndex::anonymous(),
        }
    }

    pub fn label_sets(&mut self) -> Result<LabelSetMap> {
        match Self::name(&self.dir, "sets", &mut self.sets) {
            Some(p) => LabelSetMap::create(&p),
            None => LabelSetMap::anonymous(),
        }
    }

    fn name(dir: &Option<PathBuf>, kind: &str, count: &mut usize) -> Option<PathBuf> {
        let n = *count;
        *count += 1;
        dir.as_ref().map(|d| d.join(format!("{kind}-{n}.redb")))
    }
}
