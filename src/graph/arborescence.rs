//! Maximum spanning arborescence (Chu-Liu/Edmonds).
//!
//! Recursive contraction form: pick the best incoming edge of every non-root
//! node; if that selection has no cycle it is optimal. Otherwise contract one
//! cycle into a single node, reweight the edges entering it by the cycle edge
//! they would replace, solve the smaller problem and expand.
//!
//! Nodes without any incoming candidate stay unattached, so the result is a
//! forest when the input is not fully connected. A cycle that nothing outside
//! of it can enter is reported as [`DecodeError::Unreachable`].

use crate::errors::{DecodeError, Result};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// A directed edge between dense node indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    source: usize,
    target: usize,
    weight: f64,
    /// Index into the caller's edge slice
    origin: usize,
}

/// Choose, for every node, the incoming edge of a maximum spanning
/// arborescence rooted at `root`.
///
/// Returns one entry per node: the index (into `edges`) of the chosen
/// incoming edge, or `None` for the root and for nodes nothing points to.
/// Among equally heavy incoming edges the earliest one in `edges` wins.
pub fn maximum_spanning_arborescence(
    num_nodes: usize,
    root: usize,
    edges: &[WeightedEdge],
) -> Result<Vec<Option<usize>>> {
    if root >= num_nodes {
        return Err(DecodeError::internal(format!(
            "root {} outside graph of {} node(s)",
            root, num_nodes
        )));
    }

    let candidates: Vec<Candidate> = edges
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.source != e.target && e.target != root && e.source < num_nodes && e.target < num_nodes
        })
        .map(|(origin, e)| Candidate {
            source: e.source,
            target: e.target,
            weight: e.weight,
            origin,
        })
        .collect();

    solve(num_nodes, root, &candidates)
}

fn solve(num_nodes: usize, root: usize, edges: &[Candidate]) -> Result<Vec<Option<usize>>> {
    let best = best_incoming(num_nodes, root, edges);

    let Some(cycle) = find_cycle(&best, edges, root) else {
        return Ok(best.iter().map(|b| b.map(|i| edges[i].origin)).collect());
    };

    let mut in_cycle = vec![false; num_nodes];
    for &v in &cycle {
        in_cycle[v] = true;
    }

    // Contracted numbering: nodes outside the cycle keep their relative
    // order, the cycle becomes the last node.
    let mut remap = vec![0usize; num_nodes];
    let mut next = 0;
    for v in 0..num_nodes {
        if !in_cycle[v] {
            remap[v] = next;
            next += 1;
        }
    }
    let super_node = next;
    for &v in &cycle {
        remap[v] = super_node;
    }

    let mut contracted = Vec::with_capacity(edges.len());
    // origin of an edge entering the cycle -> the cycle node it enters
    let mut entering: FxHashMap<usize, usize> = FxHashMap::default();
    for e in edges {
        let (source_in, target_in) = (in_cycle[e.source], in_cycle[e.target]);
        if source_in && target_in {
            continue;
        }
        let weight = if target_in {
            let replaced = best[e.target].map(|i| edges[i].weight).ok_or_else(|| {
                DecodeError::internal("cycle node without a selected incoming edge")
            })?;
            entering.insert(e.origin, e.target);
            e.weight - replaced
        } else {
            e.weight
        };
        contracted.push(Candidate {
            source: remap[e.source],
            target: remap[e.target],
            weight,
            origin: e.origin,
        });
    }

    let sub = solve(super_node + 1, remap[root], &contracted)?;

    let entry = sub[super_node].ok_or_else(|| {
        DecodeError::unreachable(format!(
            "cycle of {} node(s) has no incoming edge from outside",
            cycle.len()
        ))
    })?;
    let entry_target = *entering.get(&entry).ok_or_else(|| {
        DecodeError::internal(format!("edge {} does not enter the contracted cycle", entry))
    })?;

    let mut chosen = vec![None; num_nodes];
    for v in 0..num_nodes {
        chosen[v] = if !in_cycle[v] {
            sub[remap[v]]
        } else if v == entry_target {
            Some(entry)
        } else {
            best[v].map(|i| edges[i].origin)
        };
    }
    Ok(chosen)
}

fn best_incoming(num_nodes: usize, root: usize, edges: &[Candidate]) -> Vec<Option<usize>> {
    let mut best: Vec<Option<usize>> = vec![None; num_nodes];
    for (i, e) in edges.iter().enumerate() {
        if e.target == root || e.source == e.target {
            continue;
        }
        match best[e.target] {
            Some(j) if edges[j].weight.total_cmp(&e.weight) != Ordering::Less => {}
            _ => best[e.target] = Some(i),
        }
    }
    best
}

fn find_cycle(best: &[Option<usize>], edges: &[Candidate], root: usize) -> Option<Vec<usize>> {
    let mut visited_from: Vec<Option<usize>> = vec![None; best.len()];
    for start in 0..best.len() {
        let mut path = Vec::new();
        let mut cur = start;
        while cur != root {
            if let Some(walk) = visited_from[cur] {
                if walk == start {
                    if let Some(pos) = path.iter().position(|&v| v == cur) {
                        return Some(path[pos..].to_vec());
                    }
                }
                break;
            }
            visited_from[cur] = Some(start);
            path.push(cur);
            match best[cur] {
                Some(i) => cur = edges[i].source,
                None => break,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: usize, target: usize, weight: f64) -> WeightedEdge {
        WeightedEdge {
            source,
            target,
            weight,
        }
    }

    fn parents(edges: &[WeightedEdge], chosen: &[Option<usize>]) -> Vec<Option<usize>> {
        chosen.iter().map(|c| c.map(|i| edges[i].source)).collect()
    }

    #[test]
    fn test_no_cycle_picks_best_incoming() {
        let edges = vec![edge(0, 1, 5.0), edge(0, 2, 1.0), edge(1, 2, 3.0)];
        let chosen = maximum_spanning_arborescence(3, 0, &edges).unwrap();
        assert_eq!(parents(&edges, &chosen), vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn test_breaks_cycle() {
        // Greedy choice 1 <- 2, 2 <- 3, 3 <- 1 is a cycle; the best fix
        // enters it at the node that loses the least.
        let edges = vec![
            edge(0, 1, 1.0),
            edge(0, 2, 2.0),
            edge(0, 3, 1.0),
            edge(2, 1, 10.0),
            edge(3, 2, 10.0),
            edge(1, 3, 10.0),
        ];
        let chosen = maximum_spanning_arborescence(4, 0, &edges).unwrap();
        // Entering at 2 costs 10 - 2 = 8, at 1 or 3 costs 9.
        assert_eq!(
            parents(&edges, &chosen),
            vec![None, Some(2), Some(0), Some(1)]
        );
    }

    #[test]
    fn test_classic_example() {
        // "John saw Mary" from McDonald et al. (2005): 1 = John, 2 = saw,
        // 3 = Mary. Optimum is 0->2, 2->1, 2->3.
        let edges = vec![
            edge(0, 1, 9.0),
            edge(0, 2, 10.0),
            edge(0, 3, 9.0),
            edge(1, 2, 20.0),
            edge(2, 1, 30.0),
            edge(1, 3, 3.0),
            edge(3, 1, 11.0),
            edge(2, 3, 30.0),
            edge(3, 2, 0.0),
        ];
        let chosen = maximum_spanning_arborescence(4, 0, &edges).unwrap();
        assert_eq!(
            parents(&edges, &chosen),
            vec![None, Some(2), Some(0), Some(2)]
        );
    }

    #[test]
    fn test_nested_cycles() {
        let edges = vec![
            edge(0, 1, 1.0),
            edge(1, 2, 10.0),
            edge(2, 1, 10.0),
            edge(2, 3, 10.0),
            edge(3, 4, 10.0),
            edge(4, 3, 10.0),
            edge(4, 2, 1.0),
        ];
        let chosen = maximum_spanning_arborescence(5, 0, &edges).unwrap();
        let p = parents(&edges, &chosen);
        assert_eq!(p, vec![None, Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_ties_prefer_first_edge() {
        let edges = vec![edge(0, 2, 1.0), edge(1, 2, 1.0), edge(0, 1, 1.0)];
        let chosen = maximum_spanning_arborescence(3, 0, &edges).unwrap();
        assert_eq!(chosen[2], Some(0));
    }

    #[test]
    fn test_ignores_edges_into_root_and_self_loops() {
        let edges = vec![edge(1, 0, 100.0), edge(1, 1, 100.0), edge(0, 1, 1.0)];
        let chosen = maximum_spanning_arborescence(2, 0, &edges).unwrap();
        assert_eq!(chosen, vec![None, Some(2)]);
    }

    #[test]
    fn test_node_without_incoming_is_left_out() {
        let edges = vec![edge(2, 1, 1.0)];
        let chosen = maximum_spanning_arborescence(3, 0, &edges).unwrap();
        assert_eq!(chosen, vec![None, Some(0), None]);
    }

    #[test]
    fn test_closed_cycle_is_unreachable() {
        let edges = vec![edge(1, 2, 1.0), edge(2, 3, 1.0), edge(3, 1, 1.0)];
        let err = maximum_spanning_arborescence(4, 0, &edges).unwrap_err();
        assert!(matches!(err, DecodeError::Unreachable { .. }));
    }

    #[test]
    fn test_root_out_of_range() {
        let err = maximum_spanning_arborescence(2, 5, &[]).unwrap_err();
        assert!(err.is_internal());
    }
}
