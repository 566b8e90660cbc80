//! Interfaces to the data sources baselines are read from, plus a synthetic
//! source used by the simulator and the tests.

pub mod image_set;
pub mod index;
pub mod synthetic;

pub use image_set::{share, BaselineTask, DataShape, ImageSet, SourceHandle};
pub use index::BaselineIndex;
pub use synthetic::{SyntheticImageSet, TestSetConfig};
