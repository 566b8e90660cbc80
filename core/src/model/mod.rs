//! Containers for one baseline's samples, flags and observation metadata.

pub mod image;
pub mod mask;
pub mod metadata;
pub mod segmented;
pub mod tf_data;

pub use image::Image;
pub use mask::Mask;
pub use metadata::{AntennaInfo, BandInfo, BaselineMetaData, ChannelInfo, FieldInfo, Uvw};
pub use segmented::{BoundingBox, SegmentAxis, SegmentClass, SegmentInfo, SegmentedImage};
pub use tf_data::{PhaseRepresentation, Polarization, TimeFrequencyData};
