use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};

use sgsample::graph::load;
use sgsample::mine::{maximal_sub_graphs, MinerConfig, RandomWalkMiner};
use sgsample::output::PatternWriter;
use sgsample::store::StoreFactory;
use sgsample::types::Label;

/// Samples frequent connected subgraph patterns from a labeled digraph and
/// emits, per sampled pattern, its embeddings and the absorbing-chain
/// matrices of the random walk that found it.
#[derive(Parser)]
#[command(name = "sgsample", version, about)]
struct Cli {
    /// Minimum support
    #[arg(short, long)]
    support: usize,

    /// Minimum number of vertices for a reported pattern
    #[arg(short, long, default_value_t = 1)]
    min_vertices: usize,

    /// Number of samples to collect
    #[arg(long)]
    sample_size: usize,

    /// Output directory (overwritten)
    #[arg(short, long)]
    output: PathBuf,

    /// Disk cache directory for the backing stores
    #[arg(short, long)]
    cache: PathBuf,

    /// Worker count (defaults to the CPU count)
    #[arg(long)]
    workers: Option<usize>,

    /// Skip the probability matrices
    #[arg(long)]
    no_probabilities: bool,

    /// Input graph in veg format: a file, a gzipped file, or a directory
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.support < 1 {
        bail!("--support must be at least 1");
    }
    if cli.sample_size < 1 {
        bail!("--sample-size must be at least 1");
    }
    empty_dir(&cli.output).context("preparing the output directory")?;
    fs::create_dir_all(&cli.cache).context("preparing the cache directory")?;

    let (graph, attrs) = load::load_path(&cli.input).context("loading the graph")?;
    let graph = Arc::new(graph);
    info!(
        "loaded graph: {} vertices, {} edges",
        graph.vertices().len(),
        graph.edges().len()
    );

    let mut config = MinerConfig::new(cli.support, cli.min_vertices, cli.sample_size);
    if let Some(workers) = cli.workers {
        if workers < 1 {
            bail!("--workers must be at least 1");
        }
        config.p_level = workers;
    }
    let mut factory = StoreFactory::file(&cli.cache);
    let miner = RandomWalkMiner::new(Arc::clone(&graph), config, &mut factory)
        .context("initializing the miner")?;

    let (report, sampler) = Arc::clone(&miner).sample();
    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    for label in report {
        *counts.entry(label).or_insert(0) += 1;
    }
    if sampler.join().is_err() {
        bail!("the sampling thread panicked; see the log");
    }
    info!("finished mining after {} tries; writing output", miner.tries());
    fs::write(cli.output.join("tries"), format!("{}\n", miner.tries()))?;

    // keep only the sampled patterns that are not sub-patterns of another
    // sampled pattern
    let reported = factory.sub_graphs()?;
    for label in counts.keys() {
        for bytes in miner.embeddings(label)?.iter().map(|sg| sg.serialize()) {
            reported.add(label, &bytes)?;
        }
    }
    let maximal: BTreeSet<Label> = maximal_sub_graphs(&graph, &reported, &mut factory)?
        .into_iter()
        .collect();
    reported.delete()?;

    let writer = PatternWriter::new(&graph, &attrs, &cli.output);
    let mut count = 0;
    for (label, duplicates) in &counts {
        if !maximal.contains(label) {
            info!("dropping a sampled pattern that is a sub-pattern of another sample");
            continue;
        }
        let part = miner.embeddings(label)?;
        let dir = writer.write_pattern(count, &part, *duplicates)?;
        if !cli.no_probabilities {
            match miner.pr_matrices(&part[0]) {
                Ok(matrices) => writer.write_matrices(&dir, &matrices)?,
                Err(e) => {
                    warn!("matrices for pattern {count} failed: {e}");
                    writer.write_error(&dir, &e)?;
                }
            }
        }
        count += 1;
    }
    fs::write(cli.output.join("count"), format!("{count}\n"))?;
    info!("wrote {count} patterns");

    match Arc::try_unwrap(miner) {
        Ok(miner) => miner.delete().context("tearing down the cache stores")?,
        Err(_) => warn!("miner still referenced; leaving the cache stores behind"),
    }
    Ok(())
}

/// Ensures `dir` exists and is empty, deleting whatever was there before.
fn empty_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}
