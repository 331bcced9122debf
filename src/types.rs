//! Core types for rapid_discourse
//!
//! This module defines the fundamental data structures used throughout the library,
//! including EDUs, pairings, the label vocabulary, and decoding configuration.

use crate::errors::{DecodeError, Result};
use crate::parser::spec::RuntimeSpec;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of the sentinel EDU anchoring top-level attachments
pub const FAKE_ROOT_ID: &str = "ROOT";

/// Label for "these two EDUs are not attached"
pub const UNRELATED: &str = "UNRELATED";

/// Label carried by fake-root attachments in intra-sentential views
pub const ROOT: &str = "ROOT";

/// Dense integer code for a label
pub type LabelCode = u16;

/// Code reserved for [`UNRELATED`] in every vocabulary
pub const UNRELATED_CODE: LabelCode = 0;

/// Code reserved for [`ROOT`] in every vocabulary
pub const ROOT_CODE: LabelCode = 1;

// ============================================================================
// Label Vocabulary
// ============================================================================

/// A fixed mapping from label string to dense code.
///
/// Works like a string interner: every distinct label is stored once and gets
/// the next free code. A vocabulary is built once per corpus and then shared
/// (behind an `Arc`) by every pack derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocab {
    label_to_code: FxHashMap<Arc<str>, LabelCode>,
    code_to_label: Vec<Arc<str>>,
}

impl Default for LabelVocab {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelVocab {
    /// Create a vocabulary holding only the reserved labels
    pub fn new() -> Self {
        let reserved: [Arc<str>; 2] = [UNRELATED.into(), ROOT.into()];
        Self {
            label_to_code: FxHashMap::from_iter([
                (reserved[0].clone(), UNRELATED_CODE),
                (reserved[1].clone(), ROOT_CODE),
            ]),
            code_to_label: reserved.to_vec(),
        }
    }

    /// Create a vocabulary from relation labels (reserved labels are added first)
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for label in labels {
            vocab.intern(label.as_ref())?;
        }
        Ok(vocab)
    }

    /// Intern a label, returning its code.
    ///
    /// Fails once every [`LabelCode`] is taken.
    pub fn intern(&mut self, label: &str) -> Result<LabelCode> {
        if let Some(&code) = self.label_to_code.get(label) {
            return Ok(code);
        }

        let code = LabelCode::try_from(self.code_to_label.len()).map_err(|_| {
            DecodeError::invalid_config(format!(
                "label vocabulary is full ({} labels), cannot add '{}'",
                self.code_to_label.len(),
                label
            ))
        })?;
        let arc: Arc<str> = label.into();
        self.label_to_code.insert(arc.clone(), code);
        self.code_to_label.push(arc);
        Ok(code)
    }

    /// Look up the code of a label
    pub fn code(&self, label: &str) -> Option<LabelCode> {
        self.label_to_code.get(label).copied()
    }

    /// Get a label by its code
    pub fn get(&self, code: LabelCode) -> Option<&str> {
        self.code_to_label.get(code as usize).map(|s| s.as_ref())
    }

    /// Iterate over `(code, label)` in code order
    pub fn iter(&self) -> impl Iterator<Item = (LabelCode, &str)> {
        self.code_to_label
            .iter()
            .enumerate()
            .map(|(i, s)| (i as LabelCode, s.as_ref()))
    }

    /// Number of labels, reserved ones included
    pub fn len(&self) -> usize {
        self.code_to_label.len()
    }

    /// Always false: the reserved labels are present from construction
    pub fn is_empty(&self) -> bool {
        self.code_to_label.is_empty()
    }
}

// ============================================================================
// EDU / Pairing
// ============================================================================

/// An elementary discourse unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edu {
    /// Stable identifier, unique within a document
    pub id: String,
    /// Grouping key (document id)
    pub grouping: String,
    /// Subgrouping key (sentence id)
    pub subgrouping: String,
}

impl Edu {
    /// Create a new EDU
    pub fn new(
        id: impl Into<String>,
        grouping: impl Into<String>,
        subgrouping: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            grouping: grouping.into(),
            subgrouping: subgrouping.into(),
        }
    }

    /// The fake root of a document. It belongs to no sentence.
    pub fn fake_root(grouping: impl Into<String>) -> Self {
        Self::new(FAKE_ROOT_ID, grouping, "")
    }

    /// Whether this is the fake root sentinel
    pub fn is_fake_root(&self) -> bool {
        self.id == FAKE_ROOT_ID
    }
}

/// A candidate attachment: `source` governs `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pairing {
    pub source: Arc<Edu>,
    pub target: Arc<Edu>,
}

impl Pairing {
    /// Create a new pairing
    pub fn new(source: Arc<Edu>, target: Arc<Edu>) -> Self {
        Self { source, target }
    }

    /// The `(source id, target id)` key identifying this pairing
    pub fn key(&self) -> (&str, &str) {
        (self.source.id.as_str(), self.target.id.as_str())
    }

    /// Both EDUs are real EDUs of the same document and sentence
    pub fn is_intra(&self) -> bool {
        !self.source.is_fake_root()
            && !self.target.is_fake_root()
            && self.source.grouping == self.target.grouping
            && self.source.subgrouping == self.target.subgrouping
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration passed to every `transform` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Node id the arborescence is rooted at.
    ///
    /// Defaults to the fake root. There is no root detection yet: callers
    /// that decode graphs without a fake root must name the root themselves.
    #[serde(default = "default_root_id")]
    pub root_id: String,
    /// Threading controls for sentence-level decoding
    #[serde(default)]
    pub runtime: RuntimeSpec,
}

fn default_root_id() -> String {
    FAKE_ROOT_ID.to_string()
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            root_id: default_root_id(),
            runtime: RuntimeSpec::default(),
        }
    }
}

impl DecodeConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root_id.is_empty() {
            return Err(DecodeError::invalid_config("root_id must not be empty"));
        }

        if self.runtime.max_threads == Some(0) {
            return Err(DecodeError::invalid_config("max_threads must be > 0"));
        }

        Ok(())
    }

    /// Builder method to set the root id
    pub fn with_root_id(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }

    /// Builder method to cap the number of worker threads
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.runtime.max_threads = Some(max_threads);
        self
    }

    /// Builder method to force single-threaded decoding
    pub fn with_single_thread(mut self, single_thread: bool) -> Self {
        self.runtime.single_thread = single_thread;
        self
    }
}
