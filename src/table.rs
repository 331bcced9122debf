//! Data packs: immutable tabular views over scored EDU pairings.
//!
//! A [`DataPack`] holds one document's (or sub-document's) pairings, their
//! gold targets, and optionally a [`Graph`] of attachment scores, label
//! distributions and a prediction. Every row-indexed sequence has the same
//! length for the lifetime of the pack. "Modifying" a pack always returns a
//! new one that shares the label vocabulary.

use crate::errors::{DecodeError, Result};
use crate::types::{Edu, LabelCode, LabelVocab, Pairing, ROOT_CODE, UNRELATED_CODE};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

// ============================================================================
// Graph: scores and prediction
// ============================================================================

/// Per-pairing score arrays plus the current prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    /// Predicted label code per pairing ([`UNRELATED_CODE`] = not attached)
    pub prediction: Vec<LabelCode>,
    /// Attachment probability per pairing
    pub attach: Vec<f64>,
    /// Label distribution per pairing, indexed by label code
    pub label: Vec<Vec<f64>>,
}

impl Graph {
    /// Scores with an all-unrelated prediction
    pub fn new(attach: Vec<f64>, label: Vec<Vec<f64>>) -> Self {
        Self {
            prediction: vec![UNRELATED_CODE; attach.len()],
            attach,
            label,
        }
    }

    /// A graph carrying only a prediction (zero scores)
    pub fn unscored(prediction: Vec<LabelCode>, num_labels: usize) -> Self {
        let n = prediction.len();
        Self {
            prediction,
            attach: vec![0.0; n],
            label: vec![vec![0.0; num_labels]; n],
        }
    }

    /// Replace the prediction
    pub fn with_prediction(mut self, prediction: Vec<LabelCode>) -> Self {
        self.prediction = prediction;
        self
    }

    /// Replace the attachment scores
    pub fn with_attach(mut self, attach: Vec<f64>) -> Self {
        self.attach = attach;
        self
    }

    /// Replace the label distributions
    pub fn with_label(mut self, label: Vec<Vec<f64>>) -> Self {
        self.label = label;
        self
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.attach.len()
    }

    /// Whether the graph has no rows
    pub fn is_empty(&self) -> bool {
        self.attach.is_empty()
    }

    fn check(&self, rows: usize, num_labels: usize) -> Result<()> {
        if self.attach.len() != rows {
            return Err(DecodeError::shape_mismatch("attach", rows, self.attach.len()));
        }
        if self.label.len() != rows {
            return Err(DecodeError::shape_mismatch("label", rows, self.label.len()));
        }
        if self.prediction.len() != rows {
            return Err(DecodeError::shape_mismatch(
                "prediction",
                rows,
                self.prediction.len(),
            ));
        }
        if let Some(row) = self.label.iter().find(|row| row.len() != num_labels) {
            return Err(DecodeError::shape_mismatch("label row", num_labels, row.len()));
        }
        Ok(())
    }

    fn selected(&self, idxs: &[usize]) -> Self {
        Self {
            prediction: idxs.iter().map(|&i| self.prediction[i]).collect(),
            attach: idxs.iter().map(|&i| self.attach[i]).collect(),
            label: idxs.iter().map(|&i| self.label[i].clone()).collect(),
        }
    }
}

// ============================================================================
// DataPack
// ============================================================================

/// A predicted attachment with its label spelled out
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl Link {
    /// Create a new link
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }
}

/// Immutable view over scored EDU pairings.
#[derive(Debug, Clone)]
pub struct DataPack {
    pairings: Vec<Pairing>,
    target: Vec<LabelCode>,
    labels: Arc<LabelVocab>,
    graph: Option<Graph>,
}

impl DataPack {
    /// Create an unscored pack
    pub fn new(
        pairings: Vec<Pairing>,
        target: Vec<LabelCode>,
        labels: Arc<LabelVocab>,
    ) -> Result<Self> {
        if target.len() != pairings.len() {
            return Err(DecodeError::shape_mismatch(
                "target",
                pairings.len(),
                target.len(),
            ));
        }
        if let Some(&bad) = target.iter().find(|&&t| t as usize >= labels.len()) {
            return Err(DecodeError::unknown_label(format!("code {}", bad)));
        }
        Ok(Self {
            pairings,
            target,
            labels,
            graph: None,
        })
    }

    /// Pairings in row order
    pub fn pairings(&self) -> &[Pairing] {
        &self.pairings
    }

    /// Gold label codes in row order
    pub fn target(&self) -> &[LabelCode] {
        &self.target
    }

    /// The shared label vocabulary
    pub fn labels(&self) -> &Arc<LabelVocab> {
        &self.labels
    }

    /// Scores and prediction, if any have been attached
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Scores and prediction, or an error naming the pack size
    pub fn scores(&self) -> Result<&Graph> {
        self.graph.as_ref().ok_or_else(|| {
            DecodeError::missing_scores(format!(
                "pack of {} pairing(s) has no score graph",
                self.len()
            ))
        })
    }

    /// Number of pairings
    pub fn len(&self) -> usize {
        self.pairings.len()
    }

    /// Whether the pack has no pairings
    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }

    /// Code of a label in this pack's vocabulary
    pub fn label_number(&self, label: &str) -> Result<LabelCode> {
        self.labels
            .code(label)
            .ok_or_else(|| DecodeError::unknown_label(label))
    }

    /// Label string for a code
    pub fn label_name(&self, code: LabelCode) -> Result<&str> {
        self.labels
            .get(code)
            .ok_or_else(|| DecodeError::unknown_label(format!("code {}", code)))
    }

    /// New pack with the given score graph
    pub fn set_graph(&self, graph: Graph) -> Result<Self> {
        graph.check(self.len(), self.labels.len())?;
        Ok(Self {
            graph: Some(graph),
            ..self.clone()
        })
    }

    /// New pack with the given gold targets
    pub fn with_target(&self, target: Vec<LabelCode>) -> Result<Self> {
        let mut pack = Self::new(self.pairings.clone(), target, self.labels.clone())?;
        pack.graph = self.graph.clone();
        Ok(pack)
    }

    /// New pack with the given prediction, keeping any scores
    pub fn with_prediction(&self, prediction: Vec<LabelCode>) -> Result<Self> {
        let graph = match &self.graph {
            Some(graph) => graph.clone().with_prediction(prediction),
            None => Graph::unscored(prediction, self.labels.len()),
        };
        self.set_graph(graph)
    }

    /// Row subset, in the order given
    pub fn selected(&self, idxs: &[usize]) -> Self {
        Self {
            pairings: idxs.iter().map(|&i| self.pairings[i].clone()).collect(),
            target: idxs.iter().map(|&i| self.target[i]).collect(),
            labels: self.labels.clone(),
            graph: self.graph.as_ref().map(|g| g.selected(idxs)),
        }
    }

    /// Only the rows whose gold target is attached
    pub fn attached_only(&self) -> Self {
        let idxs: Vec<usize> = self
            .target
            .iter()
            .enumerate()
            .filter(|(_, &t)| t != UNRELATED_CODE)
            .map(|(i, _)| i)
            .collect();
        self.selected(&idxs)
    }

    /// Real EDUs mentioned by the pack, in order of first appearance
    pub fn edus(&self) -> Vec<Arc<Edu>> {
        let mut seen = FxHashSet::default();
        let mut edus = Vec::new();
        for pairing in &self.pairings {
            for edu in [&pairing.source, &pairing.target] {
                if !edu.is_fake_root() && seen.insert(edu.id.as_str()) {
                    edus.push(edu.clone());
                }
            }
        }
        edus
    }

    /// The current prediction as links, leaving out unrelated rows
    pub fn prediction_links(&self) -> Result<Vec<Link>> {
        let graph = self.scores()?;
        let mut links = Vec::new();
        for (pairing, &code) in self.pairings.iter().zip(&graph.prediction) {
            if code == UNRELATED_CODE {
                continue;
            }
            links.push(Link::new(
                pairing.source.id.as_str(),
                pairing.target.id.as_str(),
                self.label_name(code)?,
            ));
        }
        Ok(links)
    }
}

/// Adapt a pack (and its targets) to intra-sentential decoding.
///
/// Keeps the intra-sentential pairings and the fake-root pairings. The gold
/// label of a fake-root pairing becomes [`ROOT`](crate::types::ROOT) when its
/// target has no attached parent inside its own sentence (it heads the
/// sentence) and `UNRELATED` otherwise.
pub fn for_intra(dpack: &DataPack, target: &[LabelCode]) -> Result<(DataPack, Vec<LabelCode>)> {
    if target.len() != dpack.len() {
        return Err(DecodeError::shape_mismatch("target", dpack.len(), target.len()));
    }

    let has_local_parent: FxHashSet<&str> = dpack
        .pairings()
        .iter()
        .zip(target)
        .filter(|(p, &t)| p.is_intra() && t != UNRELATED_CODE)
        .map(|(p, _)| p.target.id.as_str())
        .collect();

    let mut idxs = Vec::new();
    let mut intra_target = Vec::new();
    for (i, pairing) in dpack.pairings().iter().enumerate() {
        if pairing.source.is_fake_root() {
            idxs.push(i);
            intra_target.push(if has_local_parent.contains(pairing.target.id.as_str()) {
                UNRELATED_CODE
            } else {
                ROOT_CODE
            });
        } else if pairing.is_intra() {
            idxs.push(i);
            intra_target.push(target[i]);
        }
    }

    let pack = dpack.selected(&idxs).with_target(intra_target.clone())?;
    Ok((pack, intra_target))
}

/// For every row of `dpack`, the `(subpack index, row)` covering the same
/// pairing, or `None` if no subpack contains it.
pub fn locate_in_subpacks(dpack: &DataPack, subpacks: &[DataPack]) -> Vec<Option<(usize, usize)>> {
    let mut index: FxHashMap<(&str, &str), (usize, usize)> = FxHashMap::default();
    for (s, spack) in subpacks.iter().enumerate() {
        for (j, pairing) in spack.pairings().iter().enumerate() {
            index.entry(pairing.key()).or_insert((s, j));
        }
    }

    dpack
        .pairings()
        .iter()
        .map(|p| index.get(&p.key()).copied())
        .collect()
}
