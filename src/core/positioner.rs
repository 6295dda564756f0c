//! Pipeline stage placement.
//!
//! Third-party middleware may already occupy a channel's pipeline. The
//! positioner decides where the interceptor's stage belongs: directly after
//! the highest-priority known-compatible anchor that is present, or at the
//! very front when none is. The decision is a pure function of the pipeline
//! contents and the anchor priority list, so the same pipeline always yields
//! the same placement.

use crate::config::InterceptorConfig;
use crate::error::Result;
use crate::host::pipeline::{Pipeline, StageRef};
use tracing::{debug, trace};

/// Where a stage should be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Directly after the named anchor stage.
    After(String),
    /// No known anchor present; at the very front.
    First,
}

/// Computes and applies stage placement decisions.
#[derive(Debug, Clone)]
pub struct PipelinePositioner {
    anchors: Vec<String>,
}

impl PipelinePositioner {
    pub fn new(anchors: Vec<String>) -> Self {
        Self { anchors }
    }

    pub fn from_config(config: &InterceptorConfig) -> Self {
        Self::new(config.anchor_stages.clone())
    }

    /// Decide placement given the pipeline's current stage names.
    ///
    /// Scans the anchor priority list in order; the first anchor present in
    /// the pipeline wins.
    pub fn place(&self, stage_names: &[String]) -> Placement {
        for anchor in &self.anchors {
            if stage_names.iter().any(|name| name == anchor) {
                trace!(anchor = %anchor, "Anchor present, placing after it");
                return Placement::After(anchor.clone());
            }
        }
        trace!("No known anchor present, placing first");
        Placement::First
    }

    /// Install `stage` under `name` in `pipeline` per the placement rules.
    ///
    /// Any stage already registered under `name` is removed first, so
    /// re-running installation leaves exactly one instance.
    pub fn install(&self, pipeline: &Pipeline, name: &str, stage: StageRef) -> Result<()> {
        if pipeline.remove(name).is_some() {
            // Re-injection without prior uninjection; the stale stage must
            // not linger behind the fresh one.
            debug!(stage = name, "Removed stale stage before reinsertion");
        }

        match self.place(&pipeline.names()) {
            Placement::After(anchor) => pipeline.add_after(&anchor, name, stage),
            Placement::First => pipeline.add_first(name, stage),
        }
    }
}
