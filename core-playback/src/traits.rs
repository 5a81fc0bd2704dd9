//! # Collaborator Traits
//!
//! The narrow interfaces through which the period queue talks to the rest of
//! a player: media sources that create decodable periods, the periods
//! themselves, their sample streams, the track selector and the renderers.
//!
//! ## Threading Model
//!
//! The queue and every holder are owned by the single playback thread. Media
//! periods load on worker threads owned by their source and report back only
//! through [`MediaPeriodCallback`], which may be invoked from any thread.
//! Sources are `Send + Sync` and use interior mutability.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::allocator::DefaultAllocator;
//! use core_playback::period_id::{MediaPeriodId, PeriodUid};
//! use core_playback::traits::MediaSource;
//!
//! fn create_first_period(source: &dyn MediaSource, allocator: &DefaultAllocator) {
//!     let Some(timeline) = source.timeline() else {
//!         return;
//!     };
//!     let uid = timeline.uid_of_period(0);
//!     let period = source
//!         .create_period(&MediaPeriodId::new(uid, 0), allocator, 0)
//!         .expect("create period");
//!     source.release_period(period).ok();
//! }
//! ```

use crate::allocator::DefaultAllocator;
use crate::error::Result;
use crate::period_id::MediaPeriodId;
use crate::time::LoadPosition;
use crate::timeline::Timeline;
use crate::track_selection::{TrackGroupArray, TrackSelection, TrackSelectorResult, TrackType};
use std::any::Any;
use std::sync::Arc;

// ============================================================================
// Media Periods
// ============================================================================

/// Lets a boxed trait object be turned back into its concrete type.
///
/// Sources that wrap the periods of other sources use this to unwrap a period
/// handed back to `release_period`.
pub trait AsAny: Any + Send {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send> AsAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Notifications from a media period, possibly delivered on a loader thread.
pub trait MediaPeriodCallback: Send + Sync {
    /// Preparation finished; track groups are available.
    fn on_prepared(&self);

    /// The period wants `continue_loading` to be called.
    fn on_continue_loading_requested(&self);
}

/// Playback state handed to a loading period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingInfo {
    /// Current playback position, relative to the loading period.
    pub playback_position_us: i64,
    pub playback_speed: f32,
    /// Wall-clock time of the last rebuffer, if any.
    pub last_rebuffer_realtime_ms: Option<i64>,
}

impl LoadingInfo {
    pub fn new(playback_position_us: i64, playback_speed: f32) -> Self {
        Self {
            playback_position_us,
            playback_speed,
            last_rebuffer_realtime_ms: None,
        }
    }

    /// Same info with the playback position moved into another time base.
    pub fn with_playback_position_us(mut self, playback_position_us: i64) -> Self {
        self.playback_position_us = playback_position_us;
        self
    }
}

/// A stream of samples for one renderer, created by a media period.
pub trait SampleStream: Send {
    fn is_ready(&self) -> bool;

    /// Reports a fatal error encountered while loading this stream, if any.
    fn maybe_throw_error(&self) -> Result<()>;
}

/// One loadable, decodable period of media.
///
/// All positions are relative to the period.
pub trait MediaPeriod: AsAny {
    /// Starts asynchronous preparation. `callback.on_prepared` fires once
    /// track groups are available.
    fn prepare(&mut self, callback: Arc<dyn MediaPeriodCallback>, position_us: i64);

    /// Reports an error that is preventing preparation, if any.
    fn maybe_throw_prepare_error(&self) -> Result<()>;

    /// Only valid after preparation.
    fn track_groups(&self) -> TrackGroupArray;

    /// Reconciles the period's streams with a new set of selections.
    ///
    /// `streams[i]` may be kept when `may_retain[i]` is set and the selection
    /// is unchanged; otherwise the period drops it and, if `selections[i]` is
    /// set, creates a replacement and sets `reset_flags[i]`. Returns the
    /// position at which the streams actually start.
    fn select_tracks(
        &mut self,
        selections: &[Option<Arc<dyn TrackSelection>>],
        may_retain: &[bool],
        streams: &mut [Option<Box<dyn SampleStream>>],
        reset_flags: &mut [bool],
        position_us: i64,
    ) -> i64;

    /// Returns a pending position discontinuity, consuming it.
    fn read_discontinuity(&mut self) -> Option<i64> {
        None
    }

    /// Position up to which all enabled streams are buffered.
    fn buffered_position_us(&self) -> LoadPosition;

    /// Position from which the next load would start.
    fn next_load_position_us(&self) -> LoadPosition;

    /// Asks the period to load more. Returns `true` if loading progressed.
    fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool;

    fn is_loading(&self) -> bool;

    /// Lets the period discard buffered media it no longer needs.
    fn reevaluate_buffer(&mut self, position_us: i64);
}

// ============================================================================
// Media Sources
// ============================================================================

/// Receives "the timeline of this source changed" notifications.
///
/// Implementations must be callable from any thread.
pub trait SourceInfoRefreshListener: Send + Sync {
    fn on_source_info_refreshed(&self);
}

/// Provides a timeline and creates the media periods it describes.
pub trait MediaSource: Send + Sync {
    /// The current timeline, or `None` while unknown.
    fn timeline(&self) -> Option<Arc<dyn Timeline>>;

    /// Creates the period identified by `id`, starting at `start_position_us`.
    fn create_period(
        &self,
        id: &MediaPeriodId,
        allocator: &DefaultAllocator,
        start_position_us: i64,
    ) -> Result<Box<dyn MediaPeriod>>;

    /// Releases a period previously returned by `create_period`.
    fn release_period(&self, period: Box<dyn MediaPeriod>) -> Result<()>;

    /// Starts the source. Timeline changes are reported to `listener`.
    fn prepare_source(&self, _listener: Arc<dyn SourceInfoRefreshListener>) -> Result<()> {
        Ok(())
    }

    /// Called on the playback thread after a refresh notification. Returns the
    /// timeline to use from now on.
    fn handle_source_info_refresh(&self) -> Result<Option<Arc<dyn Timeline>>> {
        Ok(self.timeline())
    }

    fn enable(&self) {}

    fn disable(&self) {}

    fn release_source(&self) {}

    /// Sources that only learn their duration late must be given a placeholder
    /// duration when concatenated.
    fn requires_placeholder_duration(&self) -> bool {
        false
    }
}

// ============================================================================
// Track Selection Collaborators
// ============================================================================

/// What the queue needs to know about one renderer.
pub trait RendererCapabilities: Send + Sync {
    fn name(&self) -> &str;

    fn track_type(&self) -> TrackType;
}

/// Chooses tracks for every renderer from a period's track groups.
pub trait TrackSelector: Send + Sync {
    /// Returns one slot per renderer, in renderer order.
    ///
    /// Fails with [`crate::PlaybackError::TrackSelectionFailed`] on an invalid
    /// renderer/track combination.
    fn select_tracks(
        &self,
        renderers: &[Arc<dyn RendererCapabilities>],
        track_groups: &TrackGroupArray,
        period_id: &MediaPeriodId,
        timeline: &dyn Timeline,
    ) -> Result<TrackSelectorResult>;

    /// The given result is now the one being played.
    fn on_selection_activated(&self, _result: &TrackSelectorResult) {}
}
