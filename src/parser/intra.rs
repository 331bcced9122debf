//! Two-phase parsing: within sentences first, then across them.
//!
//! An [`IntraInterParser`] holds two parsers. Phase 1 splits a document into
//! one sub-pack per sentence and runs the *intra* parser on each of them
//! independently (in parallel). Phase 2 hands the document and the sentence
//! results to a [`Recombine`] policy, which may consult the *inter* parser:
//!
//! | Policy | Recombination |
//! |--------|---------------|
//! | [`SentOnly`] | sentence labels only, fake-root links dropped |
//! | [`HeadToHead`] | inter parser links sentence heads, sentence links kept |
//! | [`Soft`] | sentence links become certain scores for the inter parser |
//!
//! # Cache keys
//!
//! Keys with the `intra:` prefix go to the intra parser with the prefix
//! stripped; every other key goes to the inter parser.

use crate::errors::{DecodeError, Result};
use crate::parser::{check_training_data, Cache, Parser};
use crate::table::{for_intra, locate_in_subpacks, DataPack};
use crate::types::{DecodeConfig, LabelCode, FAKE_ROOT_ID, UNRELATED_CODE};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// Cache key prefix routing an entry to the intra-sentential parser
pub const INTRA_PREFIX: &str = "intra:";

/// Any pair of the same sort of thing, one meant for intra-sentential
/// decoding and the other for inter-sentential decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntraInterPair<T> {
    pub intra: T,
    pub inter: T,
}

impl<T> IntraInterPair<T> {
    /// Create a new pair
    pub fn new(intra: T, inter: T) -> Self {
        Self { intra, inter }
    }
}

/// Split a cache by key prefix. Every key lands on exactly one side.
pub fn split_cache(cache: Option<&Cache>) -> IntraInterPair<Option<Cache>> {
    let Some(cache) = cache else {
        return IntraInterPair::new(None, None);
    };

    let mut intra = Cache::new();
    let mut inter = Cache::new();
    for (key, value) in cache {
        match key.strip_prefix(INTRA_PREFIX) {
            Some(stripped) => {
                intra.insert(stripped.to_string(), value.clone());
            }
            None => {
                inter.insert(key.clone(), value.clone());
            }
        }
    }
    IntraInterPair::new(Some(intra), Some(inter))
}

/// One sub-pack per sentence.
///
/// A pairing belongs to the sentence of its *target* EDU, so fake-root
/// pairings land in the sentence they point into. Sub-packs come out in order
/// of first appearance.
pub fn partition_subgroupings(dpack: &DataPack) -> Vec<DataPack> {
    let mut slot: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, pairing) in dpack.pairings().iter().enumerate() {
        let edu = &pairing.target;
        let key = (edu.grouping.as_str(), edu.subgrouping.as_str());
        let s = *slot.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[s].push(i);
    }
    groups.iter().map(|idxs| dpack.selected(idxs)).collect()
}

/// For every row of `dpack`, the label predicted by whichever sub-pack covers
/// the same pairing, or `None`.
pub fn subpack_labels(dpack: &DataPack, subpacks: &[DataPack]) -> Result<Vec<Option<LabelCode>>> {
    let predictions = subpacks
        .iter()
        .map(|spack| spack.scores().map(|g| g.prediction.as_slice()))
        .collect::<Result<Vec<_>>>()?;

    Ok(locate_in_subpacks(dpack, subpacks)
        .into_iter()
        .map(|loc| loc.map(|(s, j)| predictions[s][j]))
        .collect())
}

/// Second phase of decoding: merge sentence-level results into a document.
pub trait Recombine: Send + Sync {
    /// Combine the sentence packs `spacks` (already transformed by the intra
    /// parser) into a predicted version of the document pack `dpack`.
    fn recombine(
        &self,
        parsers: &IntraInterPair<Box<dyn Parser>>,
        dpack: &DataPack,
        spacks: &[DataPack],
        cfg: &DecodeConfig,
    ) -> Result<DataPack>;
}

/// Parser that attaches and labels in two phases: separately within each
/// sentence, then across the document.
pub struct IntraInterParser<R> {
    parsers: IntraInterPair<Box<dyn Parser>>,
    doc_scorer: Option<Box<dyn Parser>>,
    policy: R,
}

impl<R: std::fmt::Debug> std::fmt::Debug for IntraInterParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntraInterParser")
            .field("policy", &self.policy)
            .field("doc_scorer", &self.doc_scorer.is_some())
            .finish_non_exhaustive()
    }
}

/// Sentence parses only, no document structure.
pub type SentOnlyParser = IntraInterParser<SentOnly>;

/// Sentence heads linked by the inter parser.
pub type HeadToHeadParser = IntraInterParser<HeadToHead>;

/// Sentence links passed as certain evidence to the inter parser.
pub type SoftParser = IntraInterParser<Soft>;

impl<R: Recombine + Default> IntraInterParser<R> {
    /// Create a parser from an intra and an inter parser
    pub fn new(intra: impl Parser + 'static, inter: impl Parser + 'static) -> Self {
        Self::with_policy(Box::new(intra), Box::new(inter), R::default())
    }
}

impl<R: Recombine> IntraInterParser<R> {
    /// Create a parser with an explicit recombination policy
    pub fn with_policy(intra: Box<dyn Parser>, inter: Box<dyn Parser>, policy: R) -> Self {
        Self {
            parsers: IntraInterPair::new(intra, inter),
            doc_scorer: None,
            policy,
        }
    }

    /// Builder method to score the document with `scorer` between the two
    /// phases.
    ///
    /// Sentence parsing still sees the scores the document came with; the
    /// recombination policy sees the scorer's output. The scorer is fitted
    /// next to the inter parser, on the inter share of the cache.
    pub fn with_document_scorer(mut self, scorer: impl Parser + 'static) -> Self {
        self.doc_scorer = Some(Box::new(scorer));
        self
    }

    /// The wrapped parsers
    pub fn parsers(&self) -> &IntraInterPair<Box<dyn Parser>> {
        &self.parsers
    }

    /// Run the intra parser on every sentence of an intra-adapted pack.
    fn parse_sentences(&self, dpack_intra: &DataPack, cfg: &DecodeConfig) -> Result<Vec<DataPack>> {
        let subpacks = partition_subgroupings(dpack_intra);
        let intra = &self.parsers.intra;

        #[cfg(feature = "tracing")]
        tracing::debug!(sentences = subpacks.len(), "parsing sentences");

        cfg.runtime.scoped(|| {
            subpacks
                .par_iter()
                .map(|spack| intra.transform(spack, cfg))
                .collect::<Result<Vec<_>>>()
        })?
    }
}

impl<R: Recombine> Parser for IntraInterParser<R> {
    fn fit(
        &mut self,
        dpacks: &[DataPack],
        targets: &[Vec<LabelCode>],
        cache: Option<&Cache>,
    ) -> Result<()> {
        check_training_data(dpacks, targets)?;
        let caches = split_cache(cache);

        let (intra_packs, intra_targets): (Vec<_>, Vec<_>) = dpacks
            .iter()
            .zip(targets)
            .map(|(dpack, target)| for_intra(dpack, target))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        let IntraInterPair { intra, inter } = &mut self.parsers;
        let doc_scorer = &mut self.doc_scorer;
        let (intra_fit, inter_fit) = rayon::join(
            || {
                trace_stage!("fit_intra");
                intra.fit(&intra_packs, &intra_targets, caches.intra.as_ref())
            },
            || {
                trace_stage!("fit_inter");
                if let Some(scorer) = doc_scorer {
                    scorer.fit(dpacks, targets, caches.inter.as_ref())?;
                }
                inter.fit(dpacks, targets, caches.inter.as_ref())
            },
        );
        intra_fit?;
        inter_fit
    }

    fn transform(&self, dpack: &DataPack, cfg: &DecodeConfig) -> Result<DataPack> {
        // Recombination finds the root through `Edu::is_fake_root`.
        if cfg.root_id != FAKE_ROOT_ID {
            return Err(DecodeError::invalid_config(format!(
                "intra/inter parsing is rooted at '{}', not '{}'",
                FAKE_ROOT_ID, cfg.root_id
            )));
        }

        // Fake-root gold labels differ in the intra view; this only matters
        // to parsers that read the targets (oracles).
        let (dpack_intra, _) = for_intra(dpack, dpack.target())?;

        let spacks = {
            trace_stage!("intra");
            self.parse_sentences(&dpack_intra, cfg)?
        };

        let scored;
        let dpack = match &self.doc_scorer {
            Some(scorer) => {
                trace_stage!("score_document");
                scored = scorer.transform(dpack, cfg)?;
                &scored
            }
            None => dpack,
        };

        trace_stage!("recombine");
        self.policy.recombine(&self.parsers, dpack, &spacks, cfg)
    }
}

// ============================================================================
// SentOnly
// ============================================================================

/// No sentence recombination: the document prediction is the union of the
/// sentence predictions, minus any fake-root links.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentOnly;

impl Recombine for SentOnly {
    fn recombine(
        &self,
        _parsers: &IntraInterPair<Box<dyn Parser>>,
        dpack: &DataPack,
        spacks: &[DataPack],
        _cfg: &DecodeConfig,
    ) -> Result<DataPack> {
        let sent_lbl = subpack_labels(dpack, spacks)?;
        let prediction = dpack
            .pairings()
            .iter()
            .zip(sent_lbl)
            .map(|(pairing, lbl)| match lbl {
                Some(lbl) if !pairing.source.is_fake_root() => lbl,
                _ => UNRELATED_CODE,
            })
            .collect();
        dpack.with_prediction(prediction)
    }
}

// ============================================================================
// HeadToHead
// ============================================================================

/// Sentence recombination by parsing over sentence heads only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadToHead;

impl HeadToHead {
    /// Rows of `dpack` linking sentence heads to each other or to the fake
    /// root.
    ///
    /// A sentence head is the target of a fake-root pairing the intra parser
    /// attached.
    pub fn head_rows(dpack: &DataPack, sent_lbl: &[Option<LabelCode>]) -> Vec<usize> {
        let heads: FxHashSet<&str> = dpack
            .pairings()
            .iter()
            .zip(sent_lbl)
            .filter(|(p, lbl)| {
                p.source.is_fake_root() && matches!(lbl, Some(l) if *l != UNRELATED_CODE)
            })
            .map(|(p, _)| p.target.id.as_str())
            .collect();

        let is_head_or_root = |id: &str, root: bool| root || heads.contains(id);
        dpack
            .pairings()
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                is_head_or_root(&p.source.id, p.source.is_fake_root())
                    && is_head_or_root(&p.target.id, p.target.is_fake_root())
            })
            .map(|(i, _)| i)
            .collect()
    }
}

impl Recombine for HeadToHead {
    fn recombine(
        &self,
        parsers: &IntraInterPair<Box<dyn Parser>>,
        dpack: &DataPack,
        spacks: &[DataPack],
        cfg: &DecodeConfig,
    ) -> Result<DataPack> {
        let sent_lbl = subpack_labels(dpack, spacks)?;
        let head_pack = dpack.selected(&Self::head_rows(dpack, &sent_lbl));

        #[cfg(feature = "tracing")]
        tracing::debug!(rows = head_pack.len(), "parsing sentence heads");

        let head_pack = parsers.inter.transform(&head_pack, cfg)?;
        let doc_lbl = subpack_labels(dpack, std::slice::from_ref(&head_pack))?;

        let prediction = doc_lbl
            .into_iter()
            .zip(sent_lbl)
            .map(|(doc, sent)| doc.or(sent).unwrap_or(UNRELATED_CODE))
            .collect();
        dpack.with_prediction(prediction)
    }
}

// ============================================================================
// Soft
// ============================================================================

/// Sentence recombination by passing sentence links through the score
/// arrays: attached sentence links get attachment probability 1.0 and all of
/// their label mass on the chosen label, then the inter parser decodes the
/// whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Soft;

impl Soft {
    /// The document pack with sentence links rewritten as certain scores.
    pub fn soften(dpack: &DataPack, sent_lbl: &[Option<LabelCode>]) -> Result<DataPack> {
        if sent_lbl.len() != dpack.len() {
            return Err(DecodeError::shape_mismatch(
                "sentence labels",
                dpack.len(),
                sent_lbl.len(),
            ));
        }
        let graph = dpack.scores()?;
        let num_labels = dpack.labels().len();

        let mut attach = graph.attach.clone();
        let mut label = graph.label.clone();
        for (i, lbl) in sent_lbl.iter().enumerate() {
            let Some(lbl) = *lbl else { continue };
            if lbl == UNRELATED_CODE {
                continue;
            }
            if lbl as usize >= num_labels {
                return Err(DecodeError::unknown_label(format!("code {}", lbl)));
            }
            attach[i] = 1.0;
            let mut one_hot = vec![0.0; num_labels];
            one_hot[lbl as usize] = 1.0;
            label[i] = one_hot;
        }

        dpack.set_graph(graph.clone().with_attach(attach).with_label(label))
    }
}

impl Recombine for Soft {
    fn recombine(
        &self,
        parsers: &IntraInterPair<Box<dyn Parser>>,
        dpack: &DataPack,
        spacks: &[DataPack],
        cfg: &DecodeConfig,
    ) -> Result<DataPack> {
        let sent_lbl = subpack_labels(dpack, spacks)?;
        let softened = Self::soften(dpack, &sent_lbl)?;
        parsers.inter.transform(&softened, cfg)
    }
}
