//! Parsers: fit on training packs, transform a pack into a predicted one.
//!
//! ## Submodules
//!
//! - [`leaf`]: parsers wrapping a decoder, the gold oracle, and relabelling
//! - [`model`]: parsers wrapping an external scoring model
//! - [`pipeline`]: sequential composition
//! - [`intra`]: two-phase intra/inter-sentential composition
//! - [`spec`]: declarative parser construction and runtime limits

pub mod intra;
pub mod leaf;
pub mod model;
pub mod pipeline;
pub mod spec;

use crate::errors::{DecodeError, Result};
use crate::table::DataPack;
use crate::types::{DecodeConfig, LabelCode};
use std::collections::BTreeMap;

pub use intra::{
    HeadToHead, HeadToHeadParser, IntraInterPair, IntraInterParser, Recombine, SentOnly,
    SentOnlyParser, Soft, SoftParser,
};
pub use leaf::{DecoderParser, OracleParser, Relabeler};
pub use model::{PriorModel, ScoreModel, ScoringParser};
pub use pipeline::Pipeline;

/// Fit-time cache of reusable artifacts, keyed by string.
pub type Cache = BTreeMap<String, serde_json::Value>;

/// A fittable transformation from a pack to a predicted pack.
///
/// # Contract
///
/// - **`fit`**: consumes training packs with their gold targets (one target
///   vector per pack) and an optional cache. Never mutates its inputs; running
///   it again with the same inputs and cache yields the same fitted state.
/// - **`transform`**: returns a new pack whose prediction is fully populated.
///   Never mutates its input; deterministic for a given fitted state.
pub trait Parser: Send + Sync {
    /// Fit the parser on training data.
    fn fit(
        &mut self,
        dpacks: &[DataPack],
        targets: &[Vec<LabelCode>],
        cache: Option<&Cache>,
    ) -> Result<()>;

    /// Predict on a pack.
    fn transform(&self, dpack: &DataPack, cfg: &DecodeConfig) -> Result<DataPack>;
}

impl<P: Parser + ?Sized> Parser for Box<P> {
    fn fit(
        &mut self,
        dpacks: &[DataPack],
        targets: &[Vec<LabelCode>],
        cache: Option<&Cache>,
    ) -> Result<()> {
        (**self).fit(dpacks, targets, cache)
    }

    fn transform(&self, dpack: &DataPack, cfg: &DecodeConfig) -> Result<DataPack> {
        (**self).transform(dpack, cfg)
    }
}

/// Check that training packs and targets line up row for row.
pub fn check_training_data(dpacks: &[DataPack], targets: &[Vec<LabelCode>]) -> Result<()> {
    if dpacks.len() != targets.len() {
        return Err(DecodeError::shape_mismatch(
            "training targets",
            dpacks.len(),
            targets.len(),
        ));
    }
    for (dpack, target) in dpacks.iter().zip(targets) {
        if dpack.len() != target.len() {
            return Err(DecodeError::shape_mismatch(
                "training target",
                dpack.len(),
                target.len(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LabelVocab;
    use std::sync::Arc;

    #[test]
    fn test_check_training_data() {
        let pack = DataPack::new(vec![], vec![], Arc::new(LabelVocab::new())).unwrap();
        assert!(check_training_data(&[pack.clone()], &[vec![]]).is_ok());
        assert!(check_training_data(&[pack.clone()], &[]).is_err());
        assert!(check_training_data(&[pack], &[vec![0]]).is_err());
    }
}
