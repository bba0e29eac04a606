use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::graph::{Embedding, Graph, Lattice};
use crate::mine::{minimum_image_support, Collectors, MineError};
use crate::store::{LabelSetMap, StoreFactory};
use crate::tools::hex;
use crate::types::Label;

/// The embeddings of one pattern, after the minimum-image filter.
pub type Partition = Vec<Embedding>;

/// One entry of a sparse probability matrix. `value` is always
/// `1 / inverse`; the integer is carried so downstream consumers can redo
/// the arithmetic exactly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SparseEntry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
    pub inverse: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sparse {
    pub rows: usize,
    pub cols: usize,
    pub entries: Vec<SparseEntry>,
}

/// The absorbing-Markov-chain description of the walk that can reach one
/// sampled pattern: transient-to-transient transitions `q`, the
/// transient-to-absorbing column `r`, the initial distribution `u` over the
/// single-vertex lattice nodes, and the starting-population size.
#[derive(Debug, Clone)]
pub struct PrMatrices {
    pub starting_points: usize,
    pub q: Sparse,
    pub r: Sparse,
    pub u: Sparse,
}

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Minimum support for a pattern to be walked through or reported.
    pub support: usize,
    /// Minimum vertex count for a reported pattern.
    pub min_vertices: usize,
    /// Number of samples to publish on the report channel.
    pub sample_size: usize,
    /// Worker count for the collectors, extension and support fan-outs.
    pub p_level: usize,
}

impl MinerConfig {
    pub fn new(support: usize, min_vertices: usize, sample_size: usize) -> Self {
        let p_level = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            support,
            min_vertices,
            sample_size,
            p_level,
        }
    }
}

/// Samples frequent connected subgraph patterns by random walks through the
/// subgraph partial order.
///
/// Construction seeds every sufficiently frequent one-vertex embedding into
/// the shared collectors and snapshots the starting points; [`sample`]
/// then drives walks on its own thread and publishes each validated
/// pattern's label on the returned channel.
///
/// [`sample`]: RandomWalkMiner::sample
pub struct RandomWalkMiner {
    graph: Arc<Graph>,
    support: usize,
    min_vertices: usize,
    sample_size: usize,
    p_level: usize,
    all_embeddings: Collectors,
    extended: LabelSetMap,
    supported_extensions: LabelSetMap,
    starting_points: Vec<Label>,
    rng: Mutex<StdRng>,
    tries: AtomicUsize,
}

impl RandomWalkMiner {
    pub fn new(
        graph: Arc<Graph>,
        config: MinerConfig,
        factory: &mut StoreFactory,
    ) -> Result<Arc<Self>, MineError> {
        let all_embeddings = Collectors::new(config.p_level, factory)?;
        let extended = factory.label_sets()?;
        let supported_extensions = factory.label_sets()?;

        for v in graph.vertices() {
            if graph.color_frequency(v.color) >= config.support {
                all_embeddings.send(&Embedding::single(&graph, v.id));
            }
        }
        all_embeddings.flush();
        let starting_points = all_embeddings.keys()?;
        info!(
            "{} starting points at support {}",
            starting_points.len(),
            config.support
        );

        Ok(Arc::new(Self {
            graph,
            support: config.support,
            min_vertices: config.min_vertices,
            sample_size: config.sample_size,
            p_level: config.p_level,
            all_embeddings,
            extended,
            supported_extensions,
            starting_points,
            rng: Mutex::new(StdRng::from_entropy()),
            tries: AtomicUsize::new(0),
        }))
    }

    /// Starts the sampling thread. The channel closes once `sample_size`
    /// patterns have been published (or sampling gave up; see
    /// [`RandomWalkMiner::tries`]).
    pub fn sample(self: Arc<Self>) -> (Receiver<Label>, JoinHandle<()>) {
        let (tx, rx) = bounded(0);
        let handle = thread::spawn(move || {
            if let Err(e) = self.run_samples(&tx) {
                log::error!("sampling aborted: {e}");
            }
        });
        (rx, handle)
    }

    /// Number of walks attempted so far.
    pub fn tries(&self) -> usize {
        self.tries.load(Ordering::Relaxed)
    }

    /// Every recorded embedding under `label`, unfiltered.
    pub fn embeddings(&self, label: &[u8]) -> Result<Partition, MineError> {
        let mut out = Vec::new();
        for bytes in self.all_embeddings.find(label)? {
            out.push(Embedding::deserialize(&self.graph, &bytes)?);
        }
        Ok(out)
    }

    /// Deletes every backing store of this miner.
    pub fn delete(self) -> Result<(), MineError> {
        self.all_embeddings.delete()?;
        self.extended.delete()?;
        self.supported_extensions.delete()?;
        Ok(())
    }

    fn run_samples(&self, report: &Sender<Label>) -> Result<(), MineError> {
        for _ in 0..self.sample_size {
            'retry: loop {
                self.tries.fetch_add(1, Ordering::Relaxed);
                let part = self.walk()?;
                if part.len() < self.support {
                    info!("sampled a pattern without enough support");
                    if self.starting_points.is_empty() {
                        warn!("no color meets the support threshold; closing the report");
                        return Ok(());
                    }
                    continue 'retry;
                }
                if part[0].vertices().len() < self.min_vertices {
                    info!("sampled a pattern with too few vertices");
                    continue 'retry;
                }
                let label = part[0].short_label();
                for sg in &part[1..] {
                    if sg.short_label() != label {
                        info!("partition mixes labels; retrying");
                        continue 'retry;
                    }
                }
                info!("sampled {}", part[0].name(&self.graph));
                if report.send(label).is_err() {
                    return Ok(()); // the report consumer went away
                }
                break 'retry;
            }
        }
        Ok(())
    }

    /// One walk: climb while a supported extension exists, stop at a dead
    /// end or a fixed point, return the node the walk stopped on.
    fn walk(&self) -> Result<Partition, MineError> {
        let mut node = self.random_initial_partition()?;
        if node.is_empty() {
            return Ok(node);
        }
        let exts = self.extensions(&node)?;
        let mut next = self.random_partition(&node[0].short_label(), &exts)?;
        while next.len() >= self.support {
            node = next;
            let exts = self.extensions(&node)?;
            next = self.random_partition(&node[0].short_label(), &exts)?;
            if next.len() >= self.support && next[0].edges().len() == node[0].edges().len() {
                break;
            }
        }
        Ok(node)
    }

    fn random_initial_partition(&self) -> Result<Partition, MineError> {
        if self.starting_points.is_empty() {
            return Ok(Vec::new());
        }
        let i = self.rng.lock().gen_range(0..self.starting_points.len());
        self.partition(&self.starting_points[i])
    }

    /// The MIS-filtered partition of `key`.
    fn partition(&self, key: &[u8]) -> Result<Partition, MineError> {
        let mut part = Vec::new();
        for bytes in self.all_embeddings.find(key)? {
            part.push(Embedding::deserialize(&self.graph, &bytes)?);
        }
        Ok(minimum_image_support(part))
    }

    /// Every one-edge extension label of the partition's pattern, memoized
    /// per label. First computation feeds all extended embeddings through
    /// the collectors and waits for them to drain, so the extension set and
    /// the recorded partitions stay consistent.
    fn extensions(&self, sgs: &[Embedding]) -> Result<BTreeSet<Label>, MineError> {
        if sgs.is_empty() {
            return Ok(BTreeSet::new());
        }
        let label = sgs[0].short_label();
        if let Some(keys) = self.extended.get(&label)? {
            return Ok(keys);
        }
        let mut keys = BTreeSet::new();
        self.extend(sgs, |sg| {
            self.all_embeddings.send(&sg);
            keys.insert(sg.short_label());
        });
        self.all_embeddings.flush();
        self.extended.put(&label, &keys)?;
        Ok(keys)
    }

    /// The producer / worker-pool pipeline behind [`extensions`]: one
    /// producer walks the vertex slots and incident graph edges, `p_level`
    /// workers perform the edge extensions, and `send` consumes the
    /// extended embeddings on the calling thread.
    ///
    /// [`extensions`]: RandomWalkMiner::extensions
    fn extend(&self, sgs: &[Embedding], mut send: impl FnMut(Embedding)) {
        let g = &*self.graph;
        let support = self.support;
        let (extend_tx, extend_rx) = bounded::<(usize, usize)>(1);
        let (extended_tx, extended_rx) = bounded::<Embedding>(1);
        thread::scope(|scope| {
            for _ in 0..self.p_level {
                let rx = extend_rx.clone();
                let tx = extended_tx.clone();
                scope.spawn(move || {
                    for (sg_idx, e_idx) in rx {
                        if tx.send(sgs[sg_idx].extend(g, e_idx)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(extend_rx);
            drop(extended_tx);
            scope.spawn(move || {
                let add = |sg_idx: usize, e_idx: usize| {
                    let e = g.edge(e_idx);
                    if g.color_frequency(e.color) < support
                        || g.color_frequency(g.vertex(e.src).color) < support
                        || g.color_frequency(g.vertex(e.targ).color) < support
                    {
                        return;
                    }
                    if sgs[sg_idx].has_edge(e.src, e.targ, e.color) {
                        return;
                    }
                    let _ = extend_tx.send((sg_idx, e_idx));
                };
                for i in 0..sgs[0].vertices().len() {
                    for (j, sg) in sgs.iter().enumerate() {
                        if i >= sg.vertices().len() {
                            continue;
                        }
                        let v = sg.vertices()[i].id;
                        for &e in g.kids(v) {
                            add(j, e);
                        }
                        for &e in g.parents(v) {
                            add(j, e);
                        }
                    }
                }
            });
            for sg in extended_rx {
                send(sg);
            }
        });
    }

    /// The subset of `keys` whose partition meets the support threshold,
    /// memoized per source label. Both computations of a racing pair yield
    /// the same set, so last-writer-wins is fine.
    fn supported_keys(&self, from: &[u8], keys: &BTreeSet<Label>) -> Result<BTreeSet<Label>, MineError> {
        if let Some(keys) = self.supported_extensions.get(from)? {
            return Ok(keys);
        }
        let supported: BTreeSet<Label> = keys
            .par_iter()
            .map(|key| -> Result<Option<Label>, MineError> {
                if self.partition(key)?.len() >= self.support {
                    Ok(Some(key.clone()))
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        self.supported_extensions.put(from, &supported)?;
        Ok(supported)
    }

    /// A uniformly random supported extension of `from`, materialized; empty
    /// when no candidate survives.
    fn random_partition(
        &self,
        from: &[u8],
        keys: &BTreeSet<Label>,
    ) -> Result<Partition, MineError> {
        let supported: Vec<Label> = self.supported_keys(from, keys)?.into_iter().collect();
        if supported.is_empty() {
            return Ok(Vec::new());
        }
        let i = self.rng.lock().gen_range(0..supported.len());
        self.partition(&supported[i])
    }

    /// Builds the absorbing-chain matrices for the pattern of `sg`. Panics
    /// inside the build surface as a per-pattern error; sampling and the
    /// remaining patterns are unaffected.
    pub fn pr_matrices(&self, sg: &Embedding) -> Result<PrMatrices, MineError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.build_matrices(sg))) {
            Ok(result) => result,
            Err(cause) => Err(MineError::Matrices(panic_message(cause.as_ref()))),
        }
    }

    fn build_matrices(&self, sg: &Embedding) -> Result<PrMatrices, MineError> {
        let lattice = Lattice::build(&self.graph, sg);
        debug!(
            "lattice size {} for {}",
            lattice.v.len(),
            sg.name(&self.graph)
        );
        let p = self.probabilities(&lattice)?;
        debug!("transition probabilities {p:?}");
        let vp = self.starting_points.len();
        let n = lattice.v.len();
        let mut q = Sparse {
            rows: n - 1,
            cols: n - 1,
            entries: Vec::new(),
        };
        let mut r = Sparse {
            rows: n - 1,
            cols: 1,
            entries: Vec::new(),
        };
        let mut u = Sparse {
            rows: 1,
            cols: n - 1,
            entries: Vec::new(),
        };
        for (i, x) in lattice.v.iter().enumerate() {
            if x.vertices().len() == 1 && x.edges().is_empty() && i < n - 1 {
                u.entries.push(SparseEntry {
                    row: 0,
                    col: i,
                    value: 1.0 / vp as f64,
                    inverse: vp,
                });
            }
        }
        for e in &lattice.e {
            let inverse = p[e.src] as usize;
            let entry = SparseEntry {
                row: e.src,
                col: if e.targ >= n - 1 { 0 } else { e.targ },
                value: 1.0 / inverse as f64,
                inverse,
            };
            if e.targ >= n - 1 {
                r.entries.push(entry);
            } else {
                q.entries.push(entry);
            }
        }
        Ok(PrMatrices {
            starting_points: vp,
            q,
            r,
            u,
        })
    }

    /// Per lattice node, the number of supported one-edge extensions: the
    /// inverse of the uniform transition probability the walk used there.
    /// The absorbing node carries the -1 sentinel, and a zero count clamps
    /// to 1 so the absorbing node stays reachable.
    fn probabilities(&self, lattice: &Lattice) -> Result<Vec<i64>, MineError> {
        let mut p = vec![0i64; lattice.v.len()];
        for (i, sg) in lattice.v.iter().enumerate() {
            if i + 1 == lattice.v.len() {
                p[i] = -1;
                continue;
            }
            let key = sg.short_label();
            let part = self.partition(&key)?;
            let keys = self.extensions(&part)?;
            let count = self.supported_keys(&key, &keys)?.len();
            if count == 0 {
                debug!(
                    "no supported extension recorded for lattice node {}; clamping",
                    hex(&key)
                );
                p[i] = 1;
            } else {
                p[i] = count as i64;
            }
        }
        Ok(p)
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "matrix construction panicked".to_string()
    }
}
