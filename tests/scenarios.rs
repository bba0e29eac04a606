use std::sync::Arc;

use sgsample::graph::{Embedding, Graph};
use sgsample::mine::{minimum_image_support, MinerConfig, RandomWalkMiner};
use sgsample::store::StoreFactory;
use sgsample::types::{Label, VId};

fn config(support: usize, min_vertices: usize, sample_size: usize) -> MinerConfig {
    let mut config = MinerConfig::new(support, min_vertices, sample_size);
    config.p_level = 2;
    config
}

fn run(graph: Graph, config: MinerConfig) -> (Arc<RandomWalkMiner>, Vec<Label>) {
    let graph = Arc::new(graph);
    let mut factory = StoreFactory::anonymous();
    let miner = RandomWalkMiner::new(graph, config, &mut factory).unwrap();
    let (report, sampler) = Arc::clone(&miner).sample();
    let labels: Vec<Label> = report.iter().collect();
    sampler.join().unwrap();
    (miner, labels)
}

fn triangle(g: &mut Graph) -> (VId, VId, VId) {
    let a = g.add_vertex("a");
    let b = g.add_vertex("a");
    let c = g.add_vertex("a");
    g.add_edge(a, b, "e");
    g.add_edge(b, c, "e");
    g.add_edge(c, a, "e");
    (a, b, c)
}

fn chain(n: usize) -> Graph {
    let mut g = Graph::new();
    let vs: Vec<VId> = (0..n).map(|_| g.add_vertex("a")).collect();
    for w in vs.windows(2) {
        g.add_edge(w[0], w[1], "e");
    }
    g
}

#[test]
fn triangle_is_sampled_whole() {
    let mut g = Graph::new();
    let (a, b, c) = triangle(&mut g);
    let mis = minimum_image_support(
        [a, b, c]
            .iter()
            .map(|&v| Embedding::single(&g, v))
            .collect(),
    );
    assert_eq!(mis.len(), 3);

    let (miner, labels) = run(g, config(1, 1, 1));
    assert_eq!(labels.len(), 1);
    assert!(miner.tries() >= 1);
    // one recorded occurrence per rotation of the triangle's slot
    // assignment, all sharing the reported label
    let part = miner.embeddings(&labels[0]).unwrap();
    assert_eq!(part.len(), 3);
    assert!(part.iter().all(|sg| sg.short_label() == labels[0]));
    assert_eq!(part[0].vertices().len(), 3);
    assert_eq!(part[0].edges().len(), 3);
    assert_eq!(minimum_image_support(part).len(), 3);
}

#[test]
fn two_triangles_support_the_triangle_pattern() {
    let mut g = Graph::new();
    triangle(&mut g);
    triangle(&mut g);

    let (miner, labels) = run(g, config(2, 3, 1));
    assert_eq!(labels.len(), 1);
    // three rotations per triangle occurrence
    let part = miner.embeddings(&labels[0]).unwrap();
    assert_eq!(part.len(), 6);
    assert_eq!(part[0].vertices().len(), 3);
    assert_eq!(part[0].edges().len(), 3);
    assert_eq!(minimum_image_support(part.clone()).len(), 6);

    let matrices = miner.pr_matrices(&part[0]).unwrap();
    // a single one-vertex pattern feeds the whole walk
    assert_eq!(matrices.starting_points, 1);
    assert_eq!(matrices.u.entries.len(), 1);
    assert_eq!(matrices.u.entries[0].value, 1.0);
    // lattice: vertex -> edge -> 2-path -> triangle
    assert_eq!(matrices.q.rows, 3);
    assert_eq!(matrices.q.entries.len(), 2);
    assert_eq!(matrices.r.entries.len(), 1);
    row_sums_are_one(&matrices.q, &matrices.r);
}

#[test]
fn all_distinct_colors_yield_nothing() {
    let mut g = Graph::new();
    let a = g.add_vertex("a");
    let b = g.add_vertex("b");
    let c = g.add_vertex("c");
    g.add_edge(a, b, "x");
    g.add_edge(b, c, "y");

    let (miner, labels) = run(g, config(2, 1, 1));
    assert!(labels.is_empty());
    assert!(miner.tries() >= 1);
}

#[test]
fn chain_reports_the_longest_supported_path() {
    // 4 identical edges; the 3-edge path is the largest pattern with 2
    // embeddings
    let (miner, labels) = run(chain(5), config(2, 2, 1));
    assert_eq!(labels.len(), 1);
    let part = miner.embeddings(&labels[0]).unwrap();
    assert_eq!(part[0].edges().len(), 3);
    assert_eq!(part.len(), 2);

    let matrices = miner.pr_matrices(&part[0]).unwrap();
    // the reported pattern's lattice has k+1 = 4 states
    assert_eq!(matrices.q.rows, 3);
    assert_eq!(matrices.r.entries.len(), 1);
    assert_eq!(matrices.u.entries.len(), 1);
    assert_eq!(matrices.starting_points, 1);
    row_sums_are_one(&matrices.q, &matrices.r);
}

#[test]
fn single_vertex_patterns_are_emittable() {
    let mut g = Graph::new();
    g.add_vertex("a");

    let (miner, labels) = run(g, config(1, 1, 1));
    assert_eq!(labels.len(), 1);
    let part = miner.embeddings(&labels[0]).unwrap();
    assert_eq!(part[0].vertices().len(), 1);
    assert!(part[0].edges().is_empty());
}

#[test]
fn zero_sample_size_closes_immediately() {
    let (miner, labels) = run(chain(3), config(1, 1, 0));
    assert!(labels.is_empty());
    assert_eq!(miner.tries(), 0);
}

#[test]
fn duplicate_samples_share_one_label() {
    let mut g = Graph::new();
    triangle(&mut g);
    let (_miner, labels) = run(g, config(1, 3, 4));
    assert_eq!(labels.len(), 4);
    assert!(labels.iter().all(|l| *l == labels[0]));
}

fn row_sums_are_one(q: &sgsample::mine::Sparse, r: &sgsample::mine::Sparse) {
    let mut sums = vec![0.0f64; q.rows];
    let mut touched = vec![false; q.rows];
    for e in &q.entries {
        sums[e.row] += e.value;
        touched[e.row] = true;
    }
    for e in &r.entries {
        sums[e.row] += e.value;
        touched[e.row] = true;
    }
    for (row, sum) in sums.iter().enumerate() {
        if touched[row] {
            assert!(
                (sum - 1.0).abs() < 1e-9,
                "row {row} sums to {sum}, expected 1"
            );
        }
    }
}
