//! Core interference detection for radio observations.
//!
//! Flagging strategies are trees of actions that run over an
//! [`ArtifactSet`]. A [`ForEachBaselineAction`] streams every selected
//! baseline of a data source through its subtree on a pool of worker
//! threads, while the leaves run the detection algorithms: multi-window
//! threshold flagging, high-pass background removal, morphological
//! segmentation and the baseline-length outlier selector.

pub mod actions;
pub mod algorithms;
pub mod imagesets;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod progress;
pub mod statistics;
pub mod strategy;
pub mod telemetry;

pub use actions::{run_strategy, ActionBlock, ForEachBaselineAction};
pub use pipeline::{BaselineSelection, PipelineConfig, PipelineReport, PipelineWarning};
pub use prelude::{Action, ActionKind, ArtifactSet, RfiError, RfiResult};
pub use progress::{LoggingListener, NullListener, ProgressListener};
pub use strategy::{Strategy, StrategyConfig};
