use std::path::{Path, PathBuf};

use redb::{
    Database, Durability, MultimapTableDefinition, ReadableMultimapTable, ReadableTableMetadata,
};

use crate::store::{create_db, remove_backing, Result};
use crate::types::Label;

const SUBGRAPHS: MultimapTableDefinition<&[u8], &[u8]> = MultimapTableDefinition::new("subgraphs");

/// The multimap of recorded embeddings: canonical label → serialized
/// embedding, duplicates (distinct values under one key) allowed.
///
/// `keys` is sorted and distinct; `iterate`/`backward` walk the pairs in
/// ascending / strictly descending key order, with each key's values
/// contiguous.
pub struct SubGraphStore {
    db: Database,
    path: Option<PathBuf>,
}

impl SubGraphStore {
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
        txn.open_multimap_table(SUBGRAPHS)?;
        txn.commit()?;
        Ok(Self { db, path })
    }

    pub fn add(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(Durability::None);
        {
            let mut table = txn.open_multimap_table(SUBGRAPHS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        Ok(table.get(key)?.next().transpose()?.is_some())
    }

    pub fn count(&self, key: &[u8]) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        let mut n = 0;
        for value in table.get(key)? {
            value?;
            n += 1;
        }
        Ok(n)
    }

    /// All values stored under `key`, in the store's value order.
    pub fn find(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        let mut out = Vec::new();
        for value in table.get(key)? {
            out.push(value?.value().to_vec());
        }
        Ok(out)
    }

    /// The distinct keys, ascending.
    pub fn keys(&self) -> Result<Vec<Label>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            out.push(key.value().to_vec());
        }
        Ok(out)
    }

    /// All (key, value) pairs in ascending key order.
    pub fn iterate(&self) -> Result<Vec<(Label, Vec<u8>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, values) = entry?;
            for value in values {
                out.push((key.value().to_vec(), value?.value().to_vec()));
            }
        }
        Ok(out)
    }

    /// All (key, value) pairs in strictly descending key order.
    pub fn backward(&self) -> Result<Vec<(Label, Vec<u8>)>> {
        let mut pairs = self.iterate()?;
        pairs.reverse();
        Ok(pairs)
    }

    /// Total number of stored pairs.
    pub fn size(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(SUBGRAPHS)?;
        Ok(table.len()? as usize)
    }

    /// Closes the store and unlinks its backing file.
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
    fn duplicates_under_one_key() {
        let s = SubGraphStore::anonymous().unwrap();
        s.add(b"k", b"v1").unwrap();
        s.add(b"k", b"v2").unwrap();
        assert!(s.has(b"k").unwrap());
        assert!(!s.has(b"q").unwrap());
        assert_eq!(s.count(b"k").unwrap(), 2);
        assert_eq!(s.count(b"q").unwrap(), 0);
        assert_eq!(s.size().unwrap(), 2);
        let mut found = s.find(b"k").unwrap();
        found.sort();
        assert_eq!(found, vec![b"v1".to_vec(), b"v2".to_vec()]);
    }

    #[test]
    fn keys_sorted_distinct() {
        let s = SubGraphStore::anonymous().unwrap();
        s.add(b"b", b"1").unwrap();
        s.add(b"a", b"1").unwrap();
        s.add(b"b", b"2").unwrap();
        assert_eq!(s.keys().unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn backward_is_descending_by_key() {
        let s = SubGraphStore::anonymous().unwrap();
        s.add(b"a", b"1").unwrap();
        s.add(b"c", b"1").unwrap();
        s.add(b"b", b"1").unwrap();
        s.add(b"b", b"2").unwrap();
        let keys: Vec<Label> = s.backward().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![b"c".to_vec(), b"b".to_vec(), b"b".to_vec(), b"a".to_vec()]
        );
    }

    #[test]
    fn delete_unlinks_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subgraphs-0.redb");
        let s = SubGraphStore::create(&path).unwrap();
        s.add(b"k", b"v").unwrap();
        assert!(path.exists());
        s.delete().unwrap();
        assert!(!path.exists());
    }
}
