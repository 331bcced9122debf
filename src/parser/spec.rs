//! Parser specification types.
//!
//! A [`ParserSpec`] describes a parser stack declaratively: which strategy
//! combines sentence-level and document-level decoding, where each stage
//! gets its scores from, and runtime threading limits. It is validated and
//! then built into a boxed [`Parser`].
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "strategy": "head_to_head",
//!   "intra": { "scores": "given", "use_prob": true },
//!   "inter": { "scores": "prior", "cache_key": "prior", "relabel": true },
//!   "runtime": { "max_threads": 4 },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::decoding::MstDecoder;
use crate::errors::{DecodeError, Result};
use crate::parser::intra::{HeadToHead, IntraInterParser, Recombine, SentOnly, Soft};
use crate::parser::leaf::{DecoderParser, OracleParser, Relabeler};
use crate::parser::model::{PriorModel, ScoringParser};
use crate::parser::pipeline::Pipeline;
use crate::parser::Parser;
use crate::types::{DecodeConfig, FAKE_ROOT_ID};

/// Current spec version
pub const SPEC_VERSION: u32 = 1;

/// Default cache key of a prior-scored stage
pub const DEFAULT_PRIOR_KEY: &str = "prior";

/// Top-level parser specification (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    /// How sentence and document decoding are combined.
    #[serde(default)]
    pub strategy: Strategy,

    /// Sentence-level stage. Ignored by [`Strategy::Doc`].
    #[serde(default)]
    pub intra: StageSpec,

    /// Document-level stage.
    #[serde(default)]
    pub inter: StageSpec,

    /// Runtime threading controls.
    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// Root node id; the fake root when omitted.
    #[serde(default)]
    pub root_id: Option<String>,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

/// Decoding strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Decode the whole document in one pass with the `inter` stage.
    #[default]
    Doc,
    /// Sentences only; no document structure.
    SentOnly,
    /// Link sentence heads with the `inter` stage.
    HeadToHead,
    /// Pass sentence links to the `inter` stage as certain scores.
    Soft,
}

/// Where a stage gets its scores from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Scores already on the pack.
    #[default]
    Given,
    /// Scores derived from the gold targets.
    Oracle,
    /// Scores from a [`PriorModel`].
    Prior,
}

/// One decoding stage: scoring, MST decoding, optional relabelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(default)]
    pub scores: ScoreSource,

    /// Score edges by log-probability rather than raw probability.
    #[serde(default = "default_true")]
    pub use_prob: bool,

    /// Relabel attached edges with their best label after decoding.
    #[serde(default)]
    pub relabel: bool,

    /// Cache key of the stage's model (prior scores only).
    #[serde(default)]
    pub cache_key: Option<String>,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Default for StageSpec {
    fn default() -> Self {
        Self {
            scores: ScoreSource::default(),
            use_prob: true,
            relabel: false,
            cache_key: None,
            unknown_fields: HashMap::new(),
        }
    }
}

impl StageSpec {
    /// Build the stage as a pipeline of leaf parsers.
    pub fn build(&self) -> Pipeline {
        self.push_decoder(self.scorer())
    }

    /// Only the scoring step of the stage (empty for given scores).
    pub fn scorer(&self) -> Pipeline {
        let stage = Pipeline::new();
        match self.scores {
            ScoreSource::Given => stage,
            ScoreSource::Oracle => stage.with_step("oracle", OracleParser),
            ScoreSource::Prior => {
                let key = self.cache_key.as_deref().unwrap_or(DEFAULT_PRIOR_KEY);
                stage.with_step("prior", ScoringParser::new(key, PriorModel::default()))
            }
        }
    }

    /// The stage without its scoring step: decode, then relabel if asked.
    pub fn decoder(&self) -> Pipeline {
        self.push_decoder(Pipeline::new())
    }

    fn push_decoder(&self, stage: Pipeline) -> Pipeline {
        let stage = stage.with_step(
            "decode",
            DecoderParser::new(MstDecoder::new().with_use_prob(self.use_prob)),
        );
        if self.relabel {
            stage.with_step("relabel", Relabeler)
        } else {
            stage
        }
    }
}

impl ParserSpec {
    /// Parse and validate a JSON spec.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// JSON pointers of every field not recognized by the schema.
    pub fn unknown_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        let mut push = |prefix: &str, fields: &HashMap<String, serde_json::Value>| {
            let mut names: Vec<_> = fields.keys().collect();
            names.sort();
            paths.extend(names.into_iter().map(|n| format!("{}/{}", prefix, n)));
        };
        push("", &self.unknown_fields);
        push("/intra", &self.intra.unknown_fields);
        push("/inter", &self.inter.unknown_fields);
        push("/runtime", &self.runtime.unknown_fields);
        paths
    }

    /// Validate the spec.
    ///
    /// Unknown fields are errors in strict mode and logged warnings
    /// otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.v != SPEC_VERSION {
            return Err(DecodeError::invalid_config(format!(
                "unsupported spec version {} (expected {})",
                self.v, SPEC_VERSION
            )));
        }

        self.decode_config().validate()?;

        // Sentence recombination recognises the fake root by its id.
        if let (Some(root_id), true) = (&self.root_id, self.strategy != Strategy::Doc) {
            if root_id != FAKE_ROOT_ID {
                return Err(DecodeError::invalid_config(format!(
                    "root_id '{}' is only supported by the 'doc' strategy",
                    root_id
                )));
            }
        }

        let unknown = self.unknown_field_paths();
        if !unknown.is_empty() {
            if self.strict {
                return Err(DecodeError::invalid_config(format!(
                    "unknown field(s): {}",
                    unknown.join(", ")
                )));
            }
            #[cfg(feature = "tracing")]
            for path in &unknown {
                tracing::warn!(path = %path, "ignoring unknown spec field");
            }
        }

        #[cfg(feature = "tracing")]
        if self.strategy == Strategy::Doc && self.intra != StageSpec::default() {
            tracing::warn!("'intra' stage is ignored by the 'doc' strategy");
        }

        Ok(())
    }

    /// The decoding config described by this spec.
    pub fn decode_config(&self) -> DecodeConfig {
        let cfg = DecodeConfig {
            runtime: self.runtime.clone(),
            ..DecodeConfig::default()
        };
        match &self.root_id {
            Some(root_id) => cfg.with_root_id(root_id.as_str()),
            None => cfg,
        }
    }

    /// Build the parser described by this spec.
    pub fn build(&self) -> Result<Box<dyn Parser>> {
        self.validate()?;

        fn two_phase<R: Recombine + 'static>(spec: &ParserSpec, policy: R) -> Box<dyn Parser> {
            Box::new(IntraInterParser::with_policy(
                Box::new(spec.intra.build()),
                Box::new(spec.inter.build()),
                policy,
            ))
        }

        let parser: Box<dyn Parser> = match self.strategy {
            Strategy::Doc => Box::new(self.inter.build()),
            Strategy::SentOnly => two_phase(self, SentOnly),
            Strategy::HeadToHead => two_phase(self, HeadToHead),
            // Soft rewrites the document scores, so the inter stage scores
            // the document before recombination and only decodes after it.
            Strategy::Soft => Box::new(
                IntraInterParser::with_policy(
                    Box::new(self.intra.build()),
                    Box::new(self.inter.decoder()),
                    Soft,
                )
                .with_document_scorer(self.inter.scorer()),
            ),
        };
        Ok(parser)
    }
}

// ─── Runtime spec ─────────────────────────────────────────────────────────

/// Runtime threading controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Maximum number of Rayon threads for parallel work.
    /// `None` uses Rayon's default (all logical cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Disable parallelism entirely (equivalent to `max_threads: 1`).
    /// When `true`, overrides `max_threads`.
    #[serde(default)]
    pub single_thread: bool,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,

    #[serde(skip)]
    pool: SharedPool,
}

/// Lazily built thread pool, shared by clones of a [`RuntimeSpec`].
///
/// Tagged with its thread count so a clone whose limits were changed
/// afterwards builds its own pool.
#[derive(Clone, Default)]
struct SharedPool(Arc<Mutex<Option<(usize, Arc<rayon::ThreadPool>)>>>);

impl std::fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedPool")
    }
}

// Runtime state, not configuration.
impl PartialEq for SharedPool {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

fn new_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| DecodeError::internal(format!("thread pool: {}", e)))
}

impl RuntimeSpec {
    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    /// Build a new Rayon thread pool matching this config.
    ///
    /// Returns `None` when no thread limit is set (use global pool).
    pub fn build_thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.effective_threads().map(new_pool).transpose()
    }

    /// The pool matching this config, built on first use and kept for
    /// later calls (and by clones of this spec).
    pub fn thread_pool(&self) -> Result<Option<Arc<rayon::ThreadPool>>> {
        let Some(threads) = self.effective_threads() else {
            return Ok(None);
        };
        let mut slot = self
            .pool
            .0
            .lock()
            .map_err(|_| DecodeError::internal("thread pool lock poisoned"))?;
        if let Some((n, pool)) = slot.as_ref() {
            if *n == threads {
                return Ok(Some(Arc::clone(pool)));
            }
        }
        let pool = Arc::new(new_pool(threads)?);
        *slot = Some((threads, Arc::clone(&pool)));
        Ok(Some(pool))
    }

    /// Execute `f` within the Rayon thread pool matching this config.
    ///
    /// If no thread limit is set, `f` runs directly (using the global pool).
    /// Otherwise `f` runs inside [`rayon::ThreadPool::install`] on the pool
    /// from [`RuntimeSpec::thread_pool`], so any `par_iter()` within `f`
    /// uses it.
    pub fn scoped<R: Send>(&self, f: impl FnOnce() -> R + Send) -> Result<R> {
        Ok(match self.thread_pool()? {
            Some(pool) => pool.install(f),
            None => f(),
        })
    }
}
