use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use redb::{Database, Durability, TableDefinition};

use crate::store::{create_db, remove_backing, Result, StoreError};
use crate::types::Label;

const SETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sets");

/// A single-valued map from label to a sorted set of labels; the backing of
/// the extension and supported-extension memo tables. `put` replaces any
/// existing value.
pub struct LabelSetMap {
    db: Database,
    path: Option<PathBuf>,
}

impl LabelSetMap {
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
        txn.open_table(SETS)?;
        txn.commit()?;
        Ok(Self { db, path })
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETS)?;
        Ok(table.get(key)?.is_some())
    }

    pub fn put(&self, key: &[u8], set: &BTreeSet<Label>) -> Result<()> {
        let value = serialize_set(set);
        let mut txn = self.db.begin_write()?;
        txn.set_durability(Durability::None);
        {
            let mut table = txn.open_table(SETS)?;
            table.insert(key, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<BTreeSet<Label>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETS)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(deserialize_set(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn delete(self) -> Result<()> {
        let Self { db, path } = self;
        drop(db);
        remove_backing(path)
    }
}

fn serialize_set(set: &BTreeSet<Label>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + set.iter().map(|l| 4 + l.len()).sum::<usize>());
    buf.extend_from_slice(&(set.len() as u32).to_le_bytes());
    for label in set {
        buf.extend_from_slice(&(label.len() as u32).to_le_bytes());
        buf.extend_from_slice(label);
    }
    buf
}

fn deserialize_set(bytes: &[u8]) -> Result<BTreeSet<Label>> {
    let mut set = BTreeSet::new();
    let mut off = 0;
    let u32_at = |off: &mut usize| -> Result<usize> {
        let end = *off + 4;
        let slice = bytes
            .get(*off..end)
            .ok_or_else(|| StoreError::Corrupt("truncated label set".to_string()))?;
        let mut b = [0u8; 4];
        b.copy_from_slice(slice);
        *off = end;
        Ok(u32::from_le_bytes(b) as usize)
    };
    let count = u32_at(&mut off)?;
    for _ in 0..count {
        let len = u32_at(&mut off)?;
        let end = off + len;
        let label = bytes
            .get(off..end)
            .ok_or_else(|| StoreError::Corrupt("truncated label set".to_string()))?;
        set.insert(label.to_vec());
        off = end;
    }
    if off != bytes.len() {
        return Err(StoreError::Corrupt("trailing label set bytes".to_string()));
    }
    Ok(set)
}
