//! Single-baseline detectors and the cross-baseline outlier selector.

pub mod baseline_selector;
pub mod highpass;
pub mod morphology;
pub mod threshold;

pub use baseline_selector::{BaselineEvaluation, BaselineSelector, SelectionResult, SelectorParams};
pub use highpass::{HighPassFilter, HighPassParams};
pub use morphology::{Morphology, MorphologyParams};
pub use threshold::{BackgroundFit, ThresholdFlagger, ThresholdOutcome, ThresholdParams};
