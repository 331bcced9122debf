//! # rapid_discourse
//!
//! Discourse dependency decoding: turn per-pair attachment and label scores
//! into a dependency forest over elementary discourse units (EDUs).
//!
//! ## Features
//!
//! - **MST decoding**: Chu-Liu/Edmonds maximum spanning arborescence over the
//!   candidate graph
//! - **Two-phase parsing**: decode each sentence independently (in
//!   parallel), then recombine sentences with a pluggable policy
//!   ([`SentOnly`], [`HeadToHead`], [`Soft`])
//! - **Composable parsers**: leaf parsers and [`Pipeline`]s share the
//!   [`Parser`] fit/transform contract
//! - **Declarative stacks**: [`ParserSpec`] builds a parser from JSON
//!
//! ## Example
//!
//! ```
//! use rapid_discourse::*;
//! use std::sync::Arc;
//!
//! let vocab = Arc::new(LabelVocab::from_labels(["elaboration"])?);
//! let root = Arc::new(Edu::fake_root("d1"));
//! let e1 = Arc::new(Edu::new("e1", "d1", "s1"));
//! let e2 = Arc::new(Edu::new("e2", "d1", "s1"));
//! let pack = DataPack::new(
//!     vec![
//!         Pairing::new(root.clone(), e1.clone()),
//!         Pairing::new(root, e2.clone()),
//!         Pairing::new(e1, e2),
//!     ],
//!     vec![ROOT_CODE, UNRELATED_CODE, 2],
//!     vocab,
//! )?
//! .set_graph(Graph::new(
//!     vec![0.9, 0.3, 0.8],
//!     vec![vec![0.1, 0.8, 0.1], vec![0.1, 0.8, 0.1], vec![0.1, 0.1, 0.8]],
//! ))?;
//!
//! let parsed = DecoderParser::mst().transform(&pack, &DecodeConfig::default())?;
//! assert_eq!(parsed.prediction_links()?.len(), 2);
//! # Ok::<(), DecodeError>(())
//! ```

/// Enter a tracing span for a parsing stage (when the `tracing` feature is
/// enabled). When disabled, this is a no-op and the compiler eliminates it.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("parse_stage", stage = $name).entered();
    };
}

pub mod decoding;
pub mod errors;
pub mod graph;
pub mod parser;
pub mod score;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use errors::{DecodeError, Result};
pub use table::{for_intra, DataPack, Graph, Link};
pub use types::{
    DecodeConfig, Edu, LabelCode, LabelVocab, Pairing, FAKE_ROOT_ID, ROOT, ROOT_CODE, UNRELATED,
    UNRELATED_CODE,
};

// Re-export main functionality
pub use decoding::{simple_candidates, Decoder, Edge, Instance, MstDecoder};
pub use graph::{maximum_spanning_arborescence, DigraphBuilder};
pub use parser::spec::{ParserSpec, RuntimeSpec, ScoreSource, StageSpec};
pub use parser::{
    Cache, DecoderParser, HeadToHead, HeadToHeadParser, IntraInterPair, IntraInterParser,
    OracleParser, Parser, Pipeline, PriorModel, Recombine, Relabeler, ScoreModel, ScoringParser,
    SentOnly, SentOnlyParser, Soft, SoftParser,
};
pub use score::{score_edges, score_edges_by_label, score_edus, Count, EduCount};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
