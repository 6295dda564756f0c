//! # Core Interception Components
//!
//! The mechanisms injection is built from.
//!
//! ## Components
//! - **Observable**: collection wrapping that reports every append,
//!   replaying pre-existing elements at wrap time
//! - **Positioner**: deterministic stage-placement decisions against
//!   third-party-populated pipelines
//! - **Registry**: concurrent bookkeeping of instrumented listeners and
//!   per-connection codec contexts

pub mod observable;
pub mod positioner;
pub mod registry;

pub use observable::{ChannelCollection, ObservableCollection, SharedCollection, VecCollection};
pub use positioner::{PipelinePositioner, Placement};
pub use registry::ConnectionRegistry;
