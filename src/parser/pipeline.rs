//! Parser made by sequencing other parsers.
//!
//! The steps are assumed to be fittable independently of each other: every
//! step is fitted on the same training data, and nothing a step predicts
//! during fitting is shown to the next one.

use crate::errors::Result;
use crate::parser::{Cache, Parser};
use crate::table::DataPack;
use crate::types::{DecodeConfig, LabelCode};

/// Apply a sequence of named parsers.
pub struct Pipeline {
    steps: Vec<(String, Box<dyn Parser>)>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create an empty pipeline (the identity transform)
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Create a pipeline from named steps
    pub fn from_steps(steps: Vec<(String, Box<dyn Parser>)>) -> Self {
        Self { steps }
    }

    /// Builder method to append a step
    pub fn with_step(mut self, name: impl Into<String>, parser: impl Parser + 'static) -> Self {
        self.steps.push((name.into(), Box::new(parser)));
        self
    }

    /// Step names, in execution order
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Parser for Pipeline {
    fn fit(
        &mut self,
        dpacks: &[DataPack],
        targets: &[Vec<LabelCode>],
        cache: Option<&Cache>,
    ) -> Result<()> {
        for (_name, parser) in &mut self.steps {
            trace_stage!(_name.as_str());
            parser.fit(dpacks, targets, cache)?;
        }
        Ok(())
    }

    fn transform(&self, dpack: &DataPack, cfg: &DecodeConfig) -> Result<DataPack> {
        let mut current = dpack.clone();
        for (_name, parser) in &self.steps {
            trace_stage!(_name.as_str());
            current = parser.transform(&current, cfg)?;
        }
        Ok(current)
    }
}
