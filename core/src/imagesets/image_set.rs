use crate::imagesets::BaselineIndex;
use crate::model::{BaselineMetaData, Mask, TimeFrequencyData};
use crate::prelude::RfiResult;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Dimensions of the baselines a source serves, used for memory estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShape {
    pub polarizations: usize,
    pub time_steps: usize,
    pub channels: usize,
    pub complex: bool,
}

impl DataShape {
    pub fn bytes_per_sample(&self) -> usize {
        if self.complex {
            2 * std::mem::size_of::<f32>()
        } else {
            std::mem::size_of::<f32>()
        }
    }

    /// Bytes held by one baseline's samples.
    pub fn baseline_bytes(&self) -> u64 {
        self.polarizations as u64
            * self.bytes_per_sample() as u64
            * self.time_steps as u64
            * self.channels as u64
    }
}

/// One unit of pipeline work: a baseline and the data read for it.
#[derive(Debug)]
pub struct BaselineTask {
    pub index: Box<dyn BaselineIndex>,
    pub data: TimeFrequencyData,
    pub metadata: Arc<BaselineMetaData>,
}

/// A source of baselines. Reads are split into issuing requests and
/// collecting results so callers can batch I/O.
pub trait ImageSet: Send {
    fn describe(&self) -> String;
    fn start_index(&self) -> RfiResult<Box<dyn BaselineIndex>>;
    fn shape_hint(&self) -> DataShape;
    fn add_read_request(&mut self, index: &dyn BaselineIndex);
    fn perform_read_requests(&mut self) -> RfiResult<()>;
    /// Returns the results of performed requests in request order.
    fn get_next_requested(&mut self) -> RfiResult<BaselineTask>;
    /// Persists per-polarization flags for the baseline at `index`.
    fn write_flags(&mut self, index: &dyn BaselineIndex, masks: &[Mask]) -> RfiResult<()>;
}

/// Shared handle to a data source; the mutex serializes all I/O on it.
pub type SourceHandle = Arc<Mutex<Box<dyn ImageSet>>>;

pub fn share(source: Box<dyn ImageSet>) -> SourceHandle {
    Arc::new(Mutex::new(source))
}
