//! Canonical vertex ordering for small labeled digraphs.
//!
//! Individualization-refinement: iterated color refinement over
//! (edge color, direction, neighbor cell) signatures, then backtracking over
//! the first non-singleton cell. The minimal encoding over all discrete
//! refinements is the canonical form, so two inputs yield equal encodings
//! exactly when they are isomorphic as labeled digraphs. Exponential in the
//! worst case; the patterns mined here stay small.

use crate::types::Color;

struct Shape {
    colors: Vec<Color>,
    out: Vec<Vec<(usize, Color)>>,
    inn: Vec<Vec<(usize, Color)>>,
}

/// Computes the canonical ordering of `0..colors.len()`: the returned
/// permutation maps slot -> input index. Edges are (src, targ, color)
/// triples over input indices.
///
/// Ties between automorphic orderings resolve to the first minimal leaf of
/// the search, so the result is deterministic for a fixed input ordering.
pub(crate) fn canonical_order(colors: &[Color], edges: &[(usize, usize, Color)]) -> Vec<usize> {
    let n = colors.len();
    if n <= 1 {
        return (0..n).collect();
    }
    let mut out = vec![Vec::new(); n];
    let mut inn = vec![Vec::new(); n];
    for &(s, t, c) in edges {
        out[s].push((t, c));
        inn[t].push((s, c));
    }
    let shape = Shape {
        colors: colors.to_vec(),
        out,
        inn,
    };

    let mut by_color: Vec<usize> = (0..n).collect();
    by_color.sort_by_key(|&v| shape.colors[v]);
    let mut cells: Vec<Vec<usize>> = Vec::new();
    for v in by_color {
        match cells.last_mut() {
            Some(cell) if shape.colors[cell[0]] == shape.colors[v] => cell.push(v),
            _ => cells.push(vec![v]),
        }
    }
    let cells = refine(&shape, cells);
    let mut best: Option<(Vec<u8>, Vec<usize>)> = None;
    search(&shape, cells, &mut best);
    best.expect("refinement always reaches a discrete partition").1
}

/// Encodes a pattern already expressed in slot space: `colors` in slot
/// order, `edges` as sorted (src, targ, color) slot triples. This byte
/// string is the short label format.
pub(crate) fn encode_label(colors: &[Color], edges: &[(usize, usize, Color)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 4 * colors.len() + 12 * edges.len());
    buf.extend_from_slice(&(colors.len() as u32).to_be_bytes());
    buf.extend_from_slice(&(edges.len() as u32).to_be_bytes());
    for &c in colors {
        buf.extend_from_slice(&c.to_be_bytes());
    }
    for &(s, t, c) in edges {
        buf.extend_from_slice(&(s as u32).to_be_bytes());
        buf.extend_from_slice(&(t as u32).to_be_bytes());
        buf.extend_from_slice(&c.to_be_bytes());
    }
    buf
}

type Signature = (Vec<(Color, usize)>, Vec<(Color, usize)>);

/// Splits cells until the partition is equitable. Cells only ever split, and
/// sub-cells are ordered by signature, so the resulting partition is
/// invariant under relabeling of the input.
fn refine(shape: &Shape, mut cells: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let n = shape.colors.len();
    loop {
        let mut cell_of = vec![0usize; n];
        for (i, cell) in cells.iter().enumerate() {
            for &v in cell {
                cell_of[v] = i;
            }
        }
        let signature = |v: usize| -> Signature {
            let mut o: Vec<(Color, usize)> = shape.out[v]
                .iter()
                .map(|&(t, c)| (c, cell_of[t]))
                .collect();
            let mut i: Vec<(Color, usize)> = shape.inn[v]
                .iter()
                .map(|&(s, c)| (c, cell_of[s]))
                .collect();
            o.sort_unstable();
            i.sort_unstable();
            (o, i)
        };
        let mut next: Vec<Vec<usize>> = Vec::with_capacity(cells.len());
        for cell in &cells {
            if cell.len() == 1 {
                next.push(cell.clone());
                continue;
            }
            let mut keyed: Vec<(Signature, usize)> =
                cell.iter().map(|&v| (signature(v), v)).collect();
            keyed.sort();
            let mut start = 0;
            while start < keyed.len() {
                let mut end = start + 1;
                while end < keyed.len() && keyed[end].0 == keyed[start].0 {
                    end += 1;
                }
                next.push(keyed[start..end].iter().map(|&(_, v)| v).collect());
                start = end;
            }
        }
        if next.len() == cells.len() {
            return next;
        }
        cells = next;
    }
}

fn search(shape: &Shape, cells: Vec<Vec<usize>>, best: &mut Option<(Vec<u8>, Vec<usize>)>) {
    if let Some(pos) = cells.iter().position(|c| c.len() > 1) {
        for &v in &cells[pos] {
            let mut next = Vec::with_capacity(cells.len() + 1);
            for (i, cell) in cells.iter().enumerate() {
                if i == pos {
                    next.push(vec![v]);
                    next.push(cell.iter().copied().filter(|&u| u != v).collect());
                } else {
                    next.push(cell.clone());
                }
            }
            search(shape, refine(shape, next), best);
        }
    } else {
        let order: Vec<usize> = cells.iter().map(|c| c[0]).collect();
        let enc = encode(shape, &order);
        match best {
            Some((b, _)) if *b <= enc => {}
            _ => *best = Some((enc, order)),
        }
    }
}

fn encode(shape: &Shape, order: &[usize]) -> Vec<u8> {
    let mut pos = vec![0usize; order.len()];
    for (p, &v) in order.iter().enumerate() {
        pos[v] = p;
    }
    let colors: Vec<Color> = order.iter().map(|&v| shape.colors[v]).collect();
    let mut edges: Vec<(usize, usize, Color)> = Vec::new();
    for (v, outs) in shape.out.iter().enumerate() {
        for &(t, c) in outs {
            edges.push((pos[v], pos[t], c));
        }
    }
    edges.sort_unstable();
    encode_label(&colors, &edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(colors: &[Color], edges: &[(usize, usize, Color)]) -> Vec<u8> {
        let order = canonical_order(colors, edges);
        let mut pos = vec![0usize; colors.len()];
        for (p, &v) in order.iter().enumerate() {
            pos[v] = p;
        }
        let slot_colors: Vec<Color> = order.iter().map(|&v| colors[v]).collect();
        let mut slot_edges: Vec<(usize, usize, Color)> = edges
            .iter()
            .map(|&(s, t, c)| (pos[s], pos[t], c))
            .collect();
        slot_edges.sort_unstable();
        encode_label(&slot_colors, &slot_edges)
    }

    #[test]
    fn permutation_invariant() {
        // a directed path 0 -> 1 -> 2, presented in two vertex orders
        let l1 = label(&[5, 5, 5], &[(0, 1, 9), (1, 2, 9)]);
        let l2 = label(&[5, 5, 5], &[(2, 0, 9), (0, 1, 9)]);
        assert_eq!(l1, l2);
    }

    #[test]
    fn triangle_rotations_agree() {
        let l1 = label(&[1, 1, 1], &[(0, 1, 2), (1, 2, 2), (2, 0, 2)]);
        let l2 = label(&[1, 1, 1], &[(1, 2, 2), (2, 0, 2), (0, 1, 2)]);
        let l3 = label(&[1, 1, 1], &[(2, 1, 2), (1, 0, 2), (0, 2, 2)]);
        assert_eq!(l1, l2);
        assert_eq!(l1, l3);
    }

    #[test]
    fn path_differs_from_fork() {
        let path = label(&[1, 1, 1], &[(0, 1, 2), (1, 2, 2)]);
        let fork = label(&[1, 1, 1], &[(0, 1, 2), (0, 2, 2)]);
        assert_ne!(path, fork);
    }

    #[test]
    fn direction_matters() {
        let fwd = label(&[1, 2], &[(0, 1, 3)]);
        let bwd = label(&[1, 2], &[(1, 0, 3)]);
        assert_ne!(fwd, bwd);
    }

    #[test]
    fn vertex_colors_matter() {
        let ab = label(&[1, 2], &[(0, 1, 3)]);
        let aa = label(&[1, 1], &[(0, 1, 3)]);
        assert_ne!(ab, aa);
    }

    #[test]
    fn parallel_edges_by_color() {
        let one = label(&[1, 1], &[(0, 1, 2)]);
        let two = label(&[1, 1], &[(0, 1, 2), (0, 1, 3)]);
        assert_ne!(one, two);
    }

    #[test]
    fn singleton() {
        assert_eq!(canonical_order(&[7], &[]), vec![0]);
    }
}
