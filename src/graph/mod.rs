//! Graph construction and the arborescence algorithm.
//!
//! - [`builder`]: weighted, labelled digraph over string node names
//! - [`arborescence`]: Chu-Liu/Edmonds maximum spanning arborescence

pub mod arborescence;
pub mod builder;

pub use arborescence::{maximum_spanning_arborescence, WeightedEdge};
pub use builder::{Arborescence, DigraphBuilder};
