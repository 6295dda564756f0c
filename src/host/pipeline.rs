//! Ordered, named handler-stage pipelines.
//!
//! Every channel owns a pipeline: an ordered chain of named stages its
//! traffic passes through. The host populates pipelines with its own stages;
//! the interceptor inserts and removes stages by name without disturbing the
//! rest of the chain.
//!
//! Stage names are unique within a pipeline. All mutation happens under one
//! internal lock held only for the duration of the membership change; firing
//! an accept notification snapshots the chain first so stage callbacks run
//! without the lock held.

use crate::error::{InterceptError, Result};
use crate::host::channel::ConnectionChannel;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A named processing stage in a channel pipeline.
///
/// Stages installed on a listening channel's pipeline receive
/// [`Stage::on_accept`] for every newly accepted connection. Stages on a
/// connection's pipeline are looked up by name and driven directly by the
/// host's event loop.
pub trait Stage: Send + Sync {
    /// Invoked on a listening channel's pipeline when the host accepts a new
    /// connection. Runs on the accept loop's thread; must not block.
    fn on_accept(&self, _conn: &ConnectionChannel) {}

    /// Downcast support so callers can recover concrete stage types they
    /// installed (e.g. the codec pair).
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a pipeline stage.
pub type StageRef = Arc<dyn Stage>;

struct NamedStage {
    name: String,
    stage: StageRef,
}

/// The ordered chain of named stages a channel's traffic passes through.
pub struct Pipeline {
    stages: Mutex<Vec<NamedStage>>,
    sealed: AtomicBool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Mark this pipeline as tearing down. A sealed pipeline rejects stage
    /// insertion; the host seals when it begins closing the channel, which
    /// may be before the channel itself reports closed.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_sealed() {
            return Err(InterceptError::PipelineSealed);
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NamedStage>> {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a stage by name.
    pub fn get(&self, name: &str) -> Option<StageRef> {
        self.lock()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.stage.clone())
    }

    /// Whether a stage with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().iter().any(|s| s.name == name)
    }

    /// Stage names in chain order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Insert a stage at the front of the chain.
    pub fn add_first(&self, name: &str, stage: StageRef) -> Result<()> {
        self.check_open()?;
        let mut stages = self.lock();
        if stages.iter().any(|s| s.name == name) {
            return Err(InterceptError::DuplicateStage(name.to_string()));
        }
        stages.insert(
            0,
            NamedStage {
                name: name.to_string(),
                stage,
            },
        );
        Ok(())
    }

    /// Append a stage at the end of the chain.
    pub fn add_last(&self, name: &str, stage: StageRef) -> Result<()> {
        self.check_open()?;
        let mut stages = self.lock();
        if stages.iter().any(|s| s.name == name) {
            return Err(InterceptError::DuplicateStage(name.to_string()));
        }
        stages.push(NamedStage {
            name: name.to_string(),
            stage,
        });
        Ok(())
    }

    /// Insert a stage directly after the named anchor.
    pub fn add_after(&self, anchor: &str, name: &str, stage: StageRef) -> Result<()> {
        self.check_open()?;
        let mut stages = self.lock();
        if stages.iter().any(|s| s.name == name) {
            return Err(InterceptError::DuplicateStage(name.to_string()));
        }
        let pos = stages
            .iter()
            .position(|s| s.name == anchor)
            .ok_or_else(|| InterceptError::StageNotFound(anchor.to_string()))?;
        stages.insert(
            pos + 1,
            NamedStage {
                name: name.to_string(),
                stage,
            },
        );
        Ok(())
    }

    /// Remove a stage by name, returning it if present.
    pub fn remove(&self, name: &str) -> Option<StageRef> {
        let mut stages = self.lock();
        let pos = stages.iter().position(|s| s.name == name)?;
        Some(stages.remove(pos).stage)
    }

    /// Deliver a newly accepted connection to every stage in chain order.
    ///
    /// Snapshots the chain first; callbacks run without the pipeline lock so
    /// they may themselves mutate this or other pipelines.
    pub fn fire_accept(&self, conn: &ConnectionChannel) {
        let snapshot: Vec<StageRef> = self.lock().iter().map(|s| s.stage.clone()).collect();
        for stage in snapshot {
            stage.on_accept(conn);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.names()).finish()
    }
}
