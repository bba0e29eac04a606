use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};
use itertools::Itertools;
use log::{error, warn};

use crate::graph::Embedding;
use crate::store::{self, StoreFactory, SubGraphStore, UniquenessIndex};
use crate::tools::fnv32a;
use crate::types::Label;

enum Msg {
    Add { label: Label, bytes: Vec<u8> },
    Flush(Sender<()>),
}

struct Shard {
    graphs: SubGraphStore,
    unique: UniquenessIndex,
}

/// Parallel, hash-sharded ingestion of (label, embedding) pairs.
///
/// Each of the N shards owns one [`SubGraphStore`] and one
/// [`UniquenessIndex`] and runs a single consumer thread behind a bounded(1)
/// channel, so per-shard de-duplication is race-free and a busy shard
/// back-pressures the producer. `shard(label) = fnv1a32(label) mod N` is
/// stable across all operations, which pins every label to exactly one
/// shard.
pub struct Collectors {
    shards: Vec<Arc<Shard>>,
    senders: Vec<Sender<Msg>>,
    handles: Vec<JoinHandle<()>>,
}

impl Collectors {
    pub fn new(n: usize, factory: &mut StoreFactory) -> store::Result<Collectors> {
        assert!(n > 0, "collectors need at least one shard");
        let mut shards = Vec::with_capacity(n);
        let mut senders = Vec::with_capacity(n);
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            let shard = Arc::new(Shard {
                graphs: factory.sub_graphs()?,
                unique: factory.unique_index()?,
            });
            let (tx, rx) = bounded(1);
            let worker = Arc::clone(&shard);
            handles.push(thread::spawn(move || shard_worker(&worker, &rx)));
            shards.push(shard);
            senders.push(tx);
        }
        Ok(Collectors {
            shards,
            senders,
            handles,
        })
    }

    /// Routes `sg` to its label's shard. Blocks while that shard is busy.
    pub fn send(&self, sg: &Embedding) {
        let label = sg.short_label();
        let bytes = sg.serialize();
        let idx = self.shard_of(&label);
        self.senders[idx]
            .send(Msg::Add { label, bytes })
            .expect("collector shard terminated");
    }

    /// Blocks until every shard has drained the pairs sent so far.
    pub fn flush(&self) {
        let (ack, done) = bounded(self.senders.len());
        for sender in &self.senders {
            sender
                .send(Msg::Flush(ack.clone()))
                .expect("collector shard terminated");
        }
        drop(ack);
        for _ in 0..self.senders.len() {
            let _ = done.recv();
        }
    }

    /// The serialized embeddings recorded under `key`.
    pub fn find(&self, key: &[u8]) -> store::Result<Vec<Vec<u8>>> {
        self.shards[self.shard_of(key)].graphs.find(key)
    }

    /// All distinct labels across the shards, ascending.
    pub fn keys(&self) -> store::Result<Vec<Label>> {
        let mut streams = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            streams.push(shard.graphs.keys()?);
        }
        Ok(streams.into_iter().kmerge().dedup().collect())
    }

    /// Streams one (label, embeddings) partition per distinct label,
    /// produced concurrently across the shards. No cross-shard order.
    pub fn parts(&self) -> Receiver<(Label, Vec<Vec<u8>>)> {
        let (tx, rx) = bounded(0);
        for shard in &self.shards {
            let shard = Arc::clone(shard);
            let tx = tx.clone();
            thread::spawn(move || {
                let keys = match shard.graphs.keys() {
                    Ok(keys) => keys,
                    Err(e) => {
                        error!("collector shard scan failed: {e}");
                        return;
                    }
                };
                for key in keys {
                    match shard.graphs.find(&key) {
                        Ok(part) => {
                            if tx.send((key, part)).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            error!("collector shard scan failed: {e}");
                            return;
                        }
                    }
                }
            });
        }
        drop(tx);
        rx
    }

    /// Total number of recorded pairs.
    pub fn size(&self) -> store::Result<usize> {
        let mut sum = 0;
        for shard in &self.shards {
            sum += shard.graphs.size()?;
        }
        Ok(sum)
    }

    /// Closes the ingestion channels and joins the shard workers.
    pub fn close(&mut self) {
        self.senders.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("collector shard worker panicked");
            }
        }
    }

    /// Tears the shard stores down.
    pub fn delete(mut self) -> store::Result<()> {
        self.close();
        for shard in std::mem::take(&mut self.shards) {
            match Arc::into_inner(shard) {
                Some(shard) => {
                    shard.graphs.delete()?;
                    shard.unique.delete()?;
                }
                None => warn!("collector shard still referenced; leaving its stores behind"),
            }
        }
        Ok(())
    }

    fn shard_of(&self, label: &[u8]) -> usize {
        fnv32a(label) as usize % self.shards.len()
    }
}

impl Drop for Collectors {
    fn drop(&mut self) {
        self.close();
    }
}

fn shard_worker(shard: &Shard, rx: &Receiver<Msg>) {
    for msg in rx {
        match msg {
            Msg::Add { label, bytes } => {
                if let Err(e) = ingest(shard, &label, &bytes) {
                    // store failures are fatal for the run
                    error!("collector shard store failure: {e}");
                    panic!("collector shard store failure: {e}");
                }
            }
            Msg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

fn ingest(shard: &Shard, label: &[u8], bytes: &[u8]) -> store::Result<()> {
    if !shard.unique.has(bytes)? {
        shard.unique.add(bytes)?;
        shard.graphs.add(label, bytes)?;
    }
    Ok(())
}
