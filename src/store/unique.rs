use std::path::{Path, PathBuf};

use redb::{Database, Durability, TableDefinition};

use crate::store::{create_db, remove_backing, Result};

const UNIQUE: TableDefinition<&[u8], ()> = TableDefinition::new("unique");

/// A set of serialized embeddings; the membership check behind the
/// collectors' per-shard de-duplication, and the "seen parent labels" tree
/// of the maximal filter.
pub struct UniquenessIndex {
    db: Database,
    path: Option<PathBuf>,
}

impl UniquenessIndex {
    pub fn create(path: &Path) -> Result<Self> {
        let (db, path) = create_db(Some(path))?;
        Self::open(db, path)
    }

    pub fn anonymous() -> Result<Self> {
        let (db, path) = create_db(None)?;
        Self::open(db, path)
    }

    fn open(db: Database, path: Option<PathBuf>) -> Result<Self> {
        let mut txn = db.begin_write()?;
        txn.set_durability(Durability::None);
        txn.open_table(UNIQUE)?;
        txn.commit()?;
        Ok(Self { db, path })
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(UNIQUE)?;
        Ok(table.get(key)?.is_some())
    }

    pub fn add(&self, key: &[u8]) -> Result<()> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(Durability::None);
        {
            let mut table = txn.open_table(UNIQUE)?;
            table.insert(key, ())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn delete(self) -> Result<()> {
        let Self { db, path } = self;
        drop(db);
        remove_backing(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let idx = UniquenessIndex::anonymous().unwrap();
        assert!(!idx.has(b"x").unwrap());
        idx.add(b"x").unwrap();
        assert!(idx.has(b"x").unwrap());
        idx.add(b"x").unwrap();
        assert!(idx.has(b"x").unwrap());
        assert!(!idx.has(b"y").unwrap());
    }

    #[test]
    fn file_backed_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unique-idx-0.redb");
        let idx = UniquenessIndex::create(&path).unwrap();
        idx.add(b"x").unwrap();
        idx.delete().unwrap();
        assert!(!path.exists());
    }
}
