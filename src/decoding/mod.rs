//! Decoders: scored instances in, a dependency forest out.
//!
//! A decoder is a stateless function from `(source, target, probability,
//! label)` instances to an edge list. [`mst::MstDecoder`] is the reference
//! implementation.

pub mod mst;

use crate::errors::Result;
use crate::table::DataPack;
use crate::types::{DecodeConfig, Edu, LabelCode, UNRELATED_CODE};
use std::sync::Arc;

pub use mst::MstDecoder;

/// A scored candidate attachment
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub source: Arc<Edu>,
    pub target: Arc<Edu>,
    /// Attachment probability
    pub probability: f64,
    /// Best relation label for this attachment
    pub label: LabelCode,
}

/// A chosen attachment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: LabelCode,
}

impl Edge {
    /// Create a new edge
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: LabelCode) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label,
        }
    }
}

/// Turns scored instances into a set of edges.
///
/// # Contract
///
/// - **Input**: instances in pack row order, and the decoding config (which
///   names the root node).
/// - **Output**: the accepted edges. No edge targets the root.
/// - **Deterministic**: same input → same output.
pub trait Decoder: Send + Sync {
    /// Decode the instances into an edge list.
    fn decode(&self, instances: &[Instance], cfg: &DecodeConfig) -> Result<Vec<Edge>>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&self, instances: &[Instance], cfg: &DecodeConfig) -> Result<Vec<Edge>> {
        (**self).decode(instances, cfg)
    }
}

/// Index of the highest label score other than `UNRELATED`.
///
/// Ties go to the lowest code. Rows with no other label fall back to
/// `UNRELATED`.
pub fn best_label(row: &[f64]) -> LabelCode {
    let mut best: Option<(usize, f64)> = None;
    for (code, &score) in row.iter().enumerate() {
        if code == UNRELATED_CODE as usize {
            continue;
        }
        match best {
            Some((_, top)) if top.total_cmp(&score).is_ge() => {}
            _ => best = Some((code, score)),
        }
    }
    best.map(|(code, _)| code as LabelCode)
        .unwrap_or(UNRELATED_CODE)
}

/// One instance per row of a scored pack: the attachment score and the best
/// non-`UNRELATED` label.
pub fn simple_candidates(dpack: &DataPack) -> Result<Vec<Instance>> {
    let graph = dpack.scores()?;
    Ok(dpack
        .pairings()
        .iter()
        .zip(graph.attach.iter().zip(&graph.label))
        .map(|(pairing, (&probability, row))| Instance {
            source: pairing.source.clone(),
            target: pairing.target.clone(),
            probability,
            label: best_label(row),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Graph;
    use crate::types::{LabelVocab, Pairing, ROOT_CODE};

    #[test]
    fn test_best_label_skips_unrelated() {
        assert_eq!(best_label(&[0.9, 0.05, 0.05]), ROOT_CODE);
        assert_eq!(best_label(&[0.5, 0.1, 0.4]), 2);
        assert_eq!(best_label(&[0.0, 0.3, 0.3, 0.3]), 1);
        assert_eq!(best_label(&[1.0]), UNRELATED_CODE);
    }

    #[test]
    fn test_simple_candidates() {
        let vocab = Arc::new(LabelVocab::from_labels(["elaboration"]).unwrap());
        let root = Arc::new(Edu::fake_root("d1"));
        let e1 = Arc::new(Edu::new("e1", "d1", "s1"));
        let pack = DataPack::new(vec![Pairing::new(root, e1)], vec![1], vocab)
            .unwrap()
            .set_graph(Graph::new(vec![0.75], vec![vec![0.1, 0.2, 0.7]]))
            .unwrap();

        let instances = simple_candidates(&pack).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].probability, 0.75);
        assert_eq!(instances[0].label, 2);
        assert_eq!(instances[0].target.id, "e1");
    }

    #[test]
    fn test_simple_candidates_requires_scores() {
        let pack = DataPack::new(vec![], vec![], Arc::new(LabelVocab::new())).unwrap();
        assert!(simple_candidates(&pack).is_err());
    }
}
