//! Leaf parsers: decoding, gold oracle, relabelling.

use crate::decoding::{best_label, simple_candidates, Decoder, MstDecoder};
use crate::errors::{DecodeError, Result};
use crate::parser::{Cache, Parser};
use crate::table::{DataPack, Graph};
use crate::types::{DecodeConfig, LabelCode, UNRELATED_CODE};
use rustc_hash::FxHashMap;

/// Parser that decodes the scores already attached to a pack.
///
/// Fitting is a no-op. The prediction marks every pairing picked by the
/// decoder with the decoder's label and leaves the rest `UNRELATED`.
#[derive(Debug, Clone, Default)]
pub struct DecoderParser<D = MstDecoder> {
    decoder: D,
}

impl DecoderParser<MstDecoder> {
    /// A parser backed by the default MST decoder
    pub fn mst() -> Self {
        Self::new(MstDecoder::default())
    }
}

impl<D: Decoder> DecoderParser<D> {
    /// Wrap a decoder
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// The wrapped decoder
    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

impl<D: Decoder> Parser for DecoderParser<D> {
    fn fit(&mut self, _: &[DataPack], _: &[Vec<LabelCode>], _: Option<&Cache>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, dpack: &DataPack, cfg: &DecodeConfig) -> Result<DataPack> {
        let instances = simple_candidates(dpack)?;
        let edges = self.decoder.decode(&instances, cfg)?;

        let chosen: FxHashMap<(&str, &str), LabelCode> = edges
            .iter()
            .map(|e| ((e.source.as_str(), e.target.as_str()), e.label))
            .collect();

        let prediction = dpack
            .pairings()
            .iter()
            .map(|p| chosen.get(&p.key()).copied().unwrap_or(UNRELATED_CODE))
            .collect();
        dpack.with_prediction(prediction)
    }
}

/// Parser whose scores are the gold targets.
///
/// Attached pairings score 1.0 and put all of their label mass on the gold
/// label; unattached pairings score 0.0 with all mass on `UNRELATED`. The
/// prediction is left as it was (or all `UNRELATED`): follow with a decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleParser;

impl Parser for OracleParser {
    fn fit(&mut self, _: &[DataPack], _: &[Vec<LabelCode>], _: Option<&Cache>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, dpack: &DataPack, _cfg: &DecodeConfig) -> Result<DataPack> {
        let num_labels = dpack.labels().len();
        let attach = dpack
            .target()
            .iter()
            .map(|&t| if t == UNRELATED_CODE { 0.0 } else { 1.0 })
            .collect();
        let label = dpack
            .target()
            .iter()
            .map(|&t| {
                let mut row = vec![0.0; num_labels];
                row[t as usize] = 1.0;
                row
            })
            .collect();

        let graph = match dpack.graph() {
            Some(g) => g.clone().with_attach(attach).with_label(label),
            None => Graph::new(attach, label),
        };
        dpack.set_graph(graph)
    }
}

/// Parser that relabels attached predictions with the best-scoring label.
///
/// Attachment decisions are kept; only the label of attached rows changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relabeler;

impl Parser for Relabeler {
    fn fit(&mut self, _: &[DataPack], _: &[Vec<LabelCode>], _: Option<&Cache>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, dpack: &DataPack, _cfg: &DecodeConfig) -> Result<DataPack> {
        let graph = dpack.graph().ok_or_else(|| {
            DecodeError::missing_scores("relabelling needs label scores and a prediction")
        })?;

        let prediction = graph
            .prediction
            .iter()
            .zip(&graph.label)
            .map(|(&p, row)| {
                if p == UNRELATED_CODE {
                    p
                } else {
                    best_label(row)
                }
            })
            .collect();
        dpack.with_prediction(prediction)
    }
}
