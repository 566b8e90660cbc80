//! The action tree: composable steps that transform an [`ArtifactSet`].

pub mod action;
pub mod artifacts;
pub mod baseline_selection_action;
pub mod block;
pub mod for_each_baseline;
pub mod highpass_action;
pub mod iteration;
pub mod morphology_action;
pub mod set_flagging;
pub mod statistics_action;
pub mod threshold_action;
pub mod write_flags;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{run_strategy, Action, ActionContainer, ActionKind};
pub use artifacts::ArtifactSet;
pub use baseline_selection_action::{BaselineSelectionAction, SelectionMode};
pub use block::ActionBlock;
pub use for_each_baseline::ForEachBaselineAction;
pub use highpass_action::HighPassFilterAction;
pub use iteration::IterationBlock;
pub use morphology_action::MorphologyAction;
pub use set_flagging::{FlaggingMode, SetFlaggingAction};
pub use statistics_action::FlagStatisticsAction;
pub use threshold_action::ThresholdAction;
pub use write_flags::WriteFlagsAction;
