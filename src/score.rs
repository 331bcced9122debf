//! Scoring decoding results against the gold targets of a pack.
//!
//! Predictions are given as [`Link`]s (see [`DataPack::prediction_links`]);
//! links labelled `UNRELATED` are ignored.

use crate::errors::Result;
use crate::table::{DataPack, Link};
use crate::types::{LabelCode, UNRELATED, UNRELATED_CODE};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;

/// Edge counts for precision / recall
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    /// Predicted edges that are gold edges
    pub correct_attach: usize,
    /// Predicted edges that are gold edges with the gold label
    pub correct_label: usize,
    /// Number of predicted edges
    pub predicted: usize,
    /// Number of gold edges
    pub reference: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl Count {
    /// Unlabelled precision
    pub fn precision(&self) -> f64 {
        ratio(self.correct_attach, self.predicted)
    }

    /// Unlabelled recall
    pub fn recall(&self) -> f64 {
        ratio(self.correct_attach, self.reference)
    }

    /// Unlabelled F1
    pub fn f1(&self) -> f64 {
        f1(self.precision(), self.recall())
    }

    /// Labelled precision
    pub fn label_precision(&self) -> f64 {
        ratio(self.correct_label, self.predicted)
    }

    /// Labelled recall
    pub fn label_recall(&self) -> f64 {
        ratio(self.correct_label, self.reference)
    }

    /// Labelled F1
    pub fn label_f1(&self) -> f64 {
        f1(self.label_precision(), self.label_recall())
    }
}

impl Add for Count {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            correct_attach: self.correct_attach + other.correct_attach,
            correct_label: self.correct_label + other.correct_label,
            predicted: self.predicted + other.predicted,
            reference: self.reference + other.reference,
        }
    }
}

impl Sum for Count {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Per-EDU head counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EduCount {
    /// EDUs whose predicted parents are exactly their gold parents
    pub correct_attach: usize,
    /// Same, with every label right as well
    pub correct_label: usize,
    /// Number of EDUs
    pub total: usize,
}

impl EduCount {
    /// Fraction of EDUs with the right parents
    pub fn attach_accuracy(&self) -> f64 {
        ratio(self.correct_attach, self.total)
    }

    /// Fraction of EDUs with the right parents and labels
    pub fn label_accuracy(&self) -> f64 {
        ratio(self.correct_label, self.total)
    }
}

impl Add for EduCount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            correct_attach: self.correct_attach + other.correct_attach,
            correct_label: self.correct_label + other.correct_label,
            total: self.total + other.total,
        }
    }
}

impl Sum for EduCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

fn attached(predictions: &[Link]) -> impl Iterator<Item = &Link> {
    predictions.iter().filter(|l| l.label != UNRELATED)
}

/// Count correct predicted edges, labelled or not.
///
/// If a pairing is predicted more than once, the last prediction counts.
pub fn score_edges(dpack: &DataPack, predictions: &[Link]) -> Result<Count> {
    let predicted: FxHashMap<(&str, &str), &str> = attached(predictions)
        .map(|l| ((l.source.as_str(), l.target.as_str()), l.label.as_str()))
        .collect();

    let gold = dpack.attached_only();
    let mut count = Count {
        predicted: predicted.len(),
        reference: gold.len(),
        ..Count::default()
    };
    for (pairing, &ref_label) in gold.pairings().iter().zip(gold.target()) {
        if let Some(&label) = predicted.get(&pairing.key()) {
            count.correct_attach += 1;
            if dpack.label_number(label)? == ref_label {
                count.correct_label += 1;
            }
        }
    }
    Ok(count)
}

/// Count EDUs whose predicted incoming links are exactly the gold ones.
///
/// An EDU is correctly attached when its set of predicted parents equals its
/// set of gold parents, and correctly labelled when the labels match too.
/// Multi-headed predictions therefore score badly.
pub fn score_edus(dpack: &DataPack, predictions: &[Link]) -> Result<EduCount> {
    let mut predicted: FxHashMap<&str, Vec<(&str, LabelCode)>> = FxHashMap::default();
    for link in attached(predictions) {
        predicted
            .entry(link.target.as_str())
            .or_default()
            .push((link.source.as_str(), dpack.label_number(&link.label)?));
    }

    let mut reference: FxHashMap<&str, Vec<(&str, LabelCode)>> = FxHashMap::default();
    for (pairing, &t) in dpack.pairings().iter().zip(dpack.target()) {
        if t == UNRELATED_CODE {
            continue;
        }
        reference
            .entry(pairing.target.id.as_str())
            .or_default()
            .push((pairing.source.id.as_str(), t));
    }

    let edus = dpack.edus();
    let mut count = EduCount {
        total: edus.len(),
        ..EduCount::default()
    };
    for edu in &edus {
        let mut pred = predicted.remove(edu.id.as_str()).unwrap_or_default();
        let mut gold = reference.remove(edu.id.as_str()).unwrap_or_default();
        pred.sort_unstable();
        gold.sort_unstable();

        if pred.iter().map(|p| p.0).eq(gold.iter().map(|g| g.0)) {
            count.correct_attach += 1;
        }
        if pred == gold {
            count.correct_label += 1;
        }
    }
    Ok(count)
}

/// Edge counts restricted to each gold label, in order of first appearance.
pub fn score_edges_by_label(dpack: &DataPack, predictions: &[Link]) -> Result<Vec<(String, Count)>> {
    let mut order: Vec<LabelCode> = Vec::new();
    let mut rows: FxHashMap<LabelCode, Vec<usize>> = FxHashMap::default();
    for (i, &t) in dpack.target().iter().enumerate() {
        if t == UNRELATED_CODE {
            continue;
        }
        rows.entry(t)
            .or_insert_with(|| {
                order.push(t);
                Vec::new()
            })
            .push(i);
    }

    order
        .into_iter()
        .map(|code| {
            let label = dpack.label_name(code)?;
            let sub = dpack.selected(&rows[&code]);
            let preds: Vec<Link> = attached(predictions)
                .filter(|l| l.label == label)
                .cloned()
                .collect();
            Ok((label.to_string(), score_edges(&sub, &preds)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DecodeError;
    use crate::types::{Edu, LabelVocab, Pairing, ROOT, ROOT_CODE};
    use std::sync::Arc;

    /// Gold: ROOT -> e1 (ROOT), e1 -> e2 (elab), e1 -> e3 (cont)
    fn pack() -> DataPack {
        let vocab = Arc::new(LabelVocab::from_labels(["elab", "cont"]).unwrap());
        let root = Arc::new(Edu::fake_root("d"));
        let e1 = Arc::new(Edu::new("e1", "d", "s1"));
        let e2 = Arc::new(Edu::new("e2", "d", "s1"));
        let e3 = Arc::new(Edu::new("e3", "d", "s2"));
        let pairings = vec![
            Pairing::new(root.clone(), e1.clone()),
            Pairing::new(root.clone(), e2.clone()),
            Pairing::new(root, e3.clone()),
            Pairing::new(e1.clone(), e2.clone()),
            Pairing::new(e1, e3.clone()),
            Pairing::new(e2, e3),
        ];
        DataPack::new(pairings, vec![ROOT_CODE, 0, 0, 2, 3, 0], vocab).unwrap()
    }

    #[test]
    fn test_score_edges() {
        let predictions = vec![
            Link::new("ROOT", "e1", ROOT),
            Link::new("e1", "e2", "cont"),
            Link::new("e2", "e3", "cont"),
            Link::new("ROOT", "e2", UNRELATED),
        ];
        let count = score_edges(&pack(), &predictions).unwrap();
        assert_eq!(
            count,
            Count {
                correct_attach: 2,
                correct_label: 1,
                predicted: 3,
                reference: 3,
            }
        );
        assert!((count.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((count.label_recall() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_edges_unknown_label() {
        let predictions = vec![Link::new("e1", "e2", "bogus")];
        let err = score_edges(&pack(), &predictions).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownLabel { .. }));
    }

    #[test]
    fn test_count_sum_and_empty_ratios() {
        let a = Count {
            correct_attach: 1,
            correct_label: 1,
            predicted: 2,
            reference: 2,
        };
        let total: Count = vec![a, a].into_iter().sum();
        assert_eq!(total.predicted, 4);
        assert_eq!(total.f1(), 0.5);
        assert_eq!(Count::default().f1(), 0.0);
    }

    #[test]
    fn test_score_edus() {
        let predictions = vec![
            Link::new("ROOT", "e1", ROOT),
            Link::new("e1", "e2", "cont"),
            // e3 gets two heads
            Link::new("e1", "e3", "cont"),
            Link::new("e2", "e3", "cont"),
        ];
        let count = score_edus(&pack(), &predictions).unwrap();
        assert_eq!(
            count,
            EduCount {
                correct_attach: 2,
                correct_label: 1,
                total: 3,
            }
        );
        assert!(count.correct_label <= count.correct_attach);
    }

    #[test]
    fn test_score_edges_by_label() {
        let predictions = vec![
            Link::new("ROOT", "e1", ROOT),
            Link::new("e1", "e2", "elab"),
            Link::new("e1", "e3", "elab"),
        ];
        let by_label = score_edges_by_label(&pack(), &predictions).unwrap();
        let labels: Vec<_> = by_label.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec![ROOT, "elab", "cont"]);

        let (_, elab) = &by_label[1];
        assert_eq!(elab.reference, 1);
        assert_eq!(elab.predicted, 2);
        assert_eq!(elab.correct_label, 1);

        let (_, cont) = &by_label[2];
        assert_eq!(cont.predicted, 0);
        assert_eq!(cont.correct_attach, 0);
    }
}
