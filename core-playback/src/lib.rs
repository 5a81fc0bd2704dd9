//! # Media Period Queue
//!
//! The loading lookahead of a media player: the ordered sequence of media
//! periods from the one being played to the one being buffered.
//!
//! ## Overview
//!
//! This crate handles:
//! - Holders wrapping one media period each, with its track selection,
//!   sample streams and renderer-time offset ([`holder`])
//! - The playing → reading → loading queue of holders, timeline resolution
//!   and a preload pool ([`queue`])
//! - Presenting several child timelines as one window ([`timeline`]) and a
//!   media source that plays its children back to back ([`source`])
//! - Marshaling period and source callbacks onto the playback thread
//!   ([`scheduler`]) and the driver applying them ([`pipeline`])
//!
//! ## Time
//!
//! Positions are microseconds in an `i64`. Period time is relative to a
//! period's start; renderer time is `period time + renderer offset` and grows
//! monotonically across the queue.
//!
//! ## Threading
//!
//! The queue and its holders belong to one playback thread. Periods and
//! sources may call back from any thread; those calls become
//! [`scheduler::PlaybackMessage`]s.

pub mod allocator;
pub mod config;
pub mod error;
pub mod events;
pub mod holder;
pub mod period_id;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod source;
pub mod time;
pub mod timeline;
pub mod track_selection;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use allocator::{Allocation, DefaultAllocator};
pub use config::QueueConfig;
pub use error::{PlaybackError, Result};
pub use events::{EventBus, EventSeverity, QueueEvent};
pub use holder::{are_durations_compatible, HolderId, MediaPeriodHolder, MediaPeriodHolderFactory};
pub use period_id::{AdPosition, ChildPeriodUid, MediaPeriodId, MediaPeriodInfo, PeriodUid};
pub use pipeline::PlaybackPipeline;
pub use queue::MediaPeriodQueue;
pub use scheduler::{PlaybackMessage, PlaybackReceiver, PlaybackSender};
pub use source::{ClippingMediaPeriod, ConcatenatingMediaSource, TimeOffsetMediaPeriod};
pub use time::{LoadPosition, INITIAL_RENDERER_POSITION_OFFSET_US};
pub use timeline::{ConcatenatedTimeline, Period, RepeatMode, SinglePeriodTimeline, Timeline, Window};
pub use track_selection::{
    TrackGroup, TrackGroupArray, TrackSelection, TrackSelectorResult, TrackType,
};
pub use traits::{
    LoadingInfo, MediaPeriod, MediaPeriodCallback, MediaSource, RendererCapabilities,
    SampleStream, SourceInfoRefreshListener, TrackSelector,
};
