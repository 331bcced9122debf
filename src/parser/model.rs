//! Parsers backed by a scoring model.
//!
//! How probabilities are produced is up to the [`ScoreModel`]. This module
//! only wires a model into the [`Parser`] contract and the fit-time cache:
//! a [`ScoringParser`] whose cache key is present restores its model from the
//! cached JSON instead of fitting it.

use crate::errors::{DecodeError, Result};
use crate::parser::{check_training_data, Cache, Parser};
use crate::table::{DataPack, Graph};
use crate::types::{DecodeConfig, LabelCode, Pairing, UNRELATED_CODE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A model producing attachment and label scores for a pack.
pub trait ScoreModel: Serialize + DeserializeOwned + Send + Sync {
    /// Learn from training packs and their gold targets.
    fn fit(&mut self, dpacks: &[DataPack], targets: &[Vec<LabelCode>]) -> Result<()>;

    /// Score every pairing of a pack. The returned graph must have one row
    /// per pairing and one label column per vocabulary entry.
    fn score(&self, dpack: &DataPack) -> Result<Graph>;
}

/// Kind of pairing, for models that score by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// The source is the fake root
    Root,
    /// Both EDUs are in the same sentence
    Intra,
    /// Everything else
    Inter,
}

impl PairKind {
    /// Classify a pairing
    pub fn of(pairing: &Pairing) -> Self {
        if pairing.source.is_fake_root() {
            PairKind::Root
        } else if pairing.is_intra() {
            PairKind::Intra
        } else {
            PairKind::Inter
        }
    }
}

/// Attachment rates per pairing kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachRates {
    pub root: f64,
    pub intra: f64,
    pub inter: f64,
}

impl AttachRates {
    /// Rate for a pairing kind
    pub fn get(&self, kind: PairKind) -> f64 {
        match kind {
            PairKind::Root => self.root,
            PairKind::Intra => self.intra,
            PairKind::Inter => self.inter,
        }
    }
}

/// Reference model scoring every pairing by corpus frequencies.
///
/// The attachment score of a pairing is the fraction of training pairings
/// of the same [`PairKind`] that are attached. Its label distribution is the
/// relative frequency of each label among attached training pairings, with
/// no mass on `UNRELATED`. Labels are stored by name, so a fitted model
/// scores packs built on any vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorModel {
    pub attach: AttachRates,
    pub labels: BTreeMap<String, f64>,
}

impl ScoreModel for PriorModel {
    fn fit(&mut self, dpacks: &[DataPack], targets: &[Vec<LabelCode>]) -> Result<()> {
        check_training_data(dpacks, targets)?;

        // (attached, total) per kind
        let mut counts = [(0usize, 0usize); 3];
        let mut label_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut attached = 0usize;

        for (dpack, target) in dpacks.iter().zip(targets) {
            for (pairing, &t) in dpack.pairings().iter().zip(target) {
                let slot = &mut counts[PairKind::of(pairing) as usize];
                slot.1 += 1;
                if t == UNRELATED_CODE {
                    continue;
                }
                slot.0 += 1;
                attached += 1;
                *label_counts
                    .entry(dpack.label_name(t)?.to_string())
                    .or_default() += 1;
            }
        }

        let rate = |(hit, total): (usize, usize)| {
            if total == 0 {
                0.0
            } else {
                hit as f64 / total as f64
            }
        };
        self.attach = AttachRates {
            root: rate(counts[PairKind::Root as usize]),
            intra: rate(counts[PairKind::Intra as usize]),
            inter: rate(counts[PairKind::Inter as usize]),
        };
        self.labels = label_counts
            .into_iter()
            .map(|(label, n)| (label, n as f64 / attached as f64))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attached,
            labels = self.labels.len(),
            "prior model fitted"
        );

        Ok(())
    }

    fn score(&self, dpack: &DataPack) -> Result<Graph> {
        let row: Vec<f64> = dpack
            .labels()
            .iter()
            .map(|(code, name)| {
                if code == UNRELATED_CODE {
                    0.0
                } else {
                    self.labels.get(name).copied().unwrap_or(0.0)
                }
            })
            .collect();

        let attach = dpack
            .pairings()
            .iter()
            .map(|p| self.attach.get(PairKind::of(p)))
            .collect();
        Ok(Graph::new(attach, vec![row; dpack.len()]))
    }
}

/// Parser writing the scores of a [`ScoreModel`] onto packs.
#[derive(Debug, Clone)]
pub struct ScoringParser<M> {
    key: String,
    model: M,
}

impl<M: ScoreModel> ScoringParser<M> {
    /// Create a parser whose model is cached under `key`
    pub fn new(key: impl Into<String>, model: M) -> Self {
        Self {
            key: key.into(),
            model,
        }
    }

    /// Cache key of the model
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The (possibly fitted) model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The model as a cache entry, for reuse by a later `fit`
    pub fn cache_entry(&self) -> Result<(String, serde_json::Value)> {
        Ok((self.key.clone(), serde_json::to_value(&self.model)?))
    }
}

impl<M: ScoreModel> Parser for ScoringParser<M> {
    fn fit(
        &mut self,
        dpacks: &[DataPack],
        targets: &[Vec<LabelCode>],
        cache: Option<&Cache>,
    ) -> Result<()> {
        if let Some(value) = cache.and_then(|c| c.get(&self.key)) {
            self.model = serde_json::from_value(value.clone()).map_err(|e| {
                DecodeError::serialization(format!("cache entry '{}': {}", self.key, e))
            })?;

            #[cfg(feature = "tracing")]
            tracing::debug!(key = %self.key, "model restored from cache");

            return Ok(());
        }
        self.model.fit(dpacks, targets)
    }

    fn transform(&self, dpack: &DataPack, _cfg: &DecodeConfig) -> Result<DataPack> {
        let graph = self.model.score(dpack)?;
        dpack.set_graph(graph)
    }
}
