//! Maximum spanning tree decoder
//!
//! Attaches EDUs so that the resulting subgraph is a maximum spanning
//! arborescence of the candidate graph rooted at the configured root.

use crate::decoding::{Decoder, Edge, Instance};
use crate::errors::{DecodeError, Result};
use crate::graph::DigraphBuilder;
use crate::types::DecodeConfig;
use rustc_hash::FxHashMap;

/// Decoder backed by the Chu-Liu/Edmonds arborescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MstDecoder {
    /// Score edges by log-probability (maximize the product of
    /// probabilities) instead of raw probability (maximize the sum)
    pub use_prob: bool,
}

impl Default for MstDecoder {
    fn default() -> Self {
        Self { use_prob: true }
    }
}

impl MstDecoder {
    /// Create a decoder scoring by log-probability
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to choose between log-probability and raw scores
    pub fn with_use_prob(mut self, use_prob: bool) -> Self {
        self.use_prob = use_prob;
        self
    }
}

/// Clamp a probability into `[f64::MIN_POSITIVE, ..]`; NaN maps to the
/// lower bound.
pub fn clean_probability(probability: f64) -> f64 {
    if probability.is_nan() || probability < f64::MIN_POSITIVE {
        f64::MIN_POSITIVE
    } else {
        probability
    }
}

/// Keep a single instance per unordered pair of nodes: the most probable.
///
/// If both `(foo, bar, p1, r1)` and `(bar, foo, p2, r2)` are present only one
/// survives, so the prepared graph has no 2-cycles. Probabilities are compared
/// after [`clean_probability`]. On equal probabilities the instance seen first
/// wins. Output follows the order in which each pair was first seen.
pub fn remove_local_cycles(instances: &[Instance]) -> Vec<&Instance> {
    let mut bucket_of: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    let mut kept: Vec<&Instance> = Vec::new();

    for instance in instances {
        let src = instance.source.id.as_str();
        let tgt = instance.target.id.as_str();
        let key = if src <= tgt { (src, tgt) } else { (tgt, src) };

        match bucket_of.get(&key) {
            Some(&b) => {
                let p = clean_probability(instance.probability);
                if p.total_cmp(&clean_probability(kept[b].probability)).is_gt() {
                    kept[b] = instance;
                }
            }
            None => {
                bucket_of.insert(key, kept.len());
                kept.push(instance);
            }
        }
    }

    kept
}

/// Edge weight for a probability.
///
/// The probability goes through [`clean_probability`] in both modes, so zero,
/// negative and NaN probabilities give finite weights below every valid one.
/// With `use_prob` the weight is its logarithm.
pub fn edge_weight(probability: f64, use_prob: bool) -> f64 {
    let p = clean_probability(probability);
    if use_prob {
        p.ln()
    } else {
        p
    }
}

fn build_graph(instances: &[Instance], root: &str, use_prob: bool) -> DigraphBuilder {
    let kept = remove_local_cycles(instances);
    let mut builder = DigraphBuilder::with_capacity(kept.len() / 2 + 1, kept.len());
    builder.get_or_create_node(root);

    for instance in kept {
        if instance.target.id == root {
            continue;
        }
        let src = builder.get_or_create_node(&instance.source.id);
        let tgt = builder.get_or_create_node(&instance.target.id);
        builder.add_edge(
            src,
            tgt,
            edge_weight(instance.probability, use_prob),
            instance.label,
        );
    }

    builder
}

impl Decoder for MstDecoder {
    fn decode(&self, instances: &[Instance], cfg: &DecodeConfig) -> Result<Vec<Edge>> {
        let builder = build_graph(instances, &cfg.root_id, self.use_prob);
        let root = builder
            .node_id(&cfg.root_id)
            .ok_or_else(|| DecodeError::internal("root node missing from graph"))?;
        let tree = builder.mst(root)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            nodes = builder.node_count(),
            candidates = builder.edge_count(),
            chosen = tree.edge_count(),
            "mst decoded"
        );

        tree.iter_edges()
            .map(|(src, tgt)| {
                let label = builder.label(src, tgt).ok_or_else(|| {
                    DecodeError::internal(format!("no label for edge ({}, {})", src, tgt))
                })?;
                let name = |id: u32| {
                    builder
                        .node_name(id)
                        .ok_or_else(|| DecodeError::internal(format!("unknown node {}", id)))
                };
                Ok(Edge::new(name(src)?, name(tgt)?, label))
            })
            .collect()
    }
}
