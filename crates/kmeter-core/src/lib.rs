//! kmeter-core: shared types, errors, and the channel/algorithm registries
//! for the K-System average-loudness engine.

mod algorithm;
mod ballistics;
mod channel;
mod error;
mod sample;

pub use algorithm::AlgorithmId;
pub use ballistics::{level2decibel, meter_minimum_decibel, METER_MINIMUM_DECIBEL};
pub use channel::{bs1770_weight_for_index, ChannelRole};
pub use error::{EngineError, EngineResult};
pub use sample::{Block, Sample};
