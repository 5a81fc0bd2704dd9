//! Media sources and media period adapters.

mod clipping;
mod concatenating;
mod empty;
mod time_offset;

pub use clipping::ClippingMediaPeriod;
pub use concatenating::{
    ConcatenatingMediaSource, ConcatenatingMediaSourceBuilder, TimelineUpdateScheduler,
};
pub use empty::{EmptySampleStream, UnavailableMediaPeriod};
pub use time_offset::TimeOffsetMediaPeriod;
