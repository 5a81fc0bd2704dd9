//! # Concatenating Media Source
//!
//! Plays several child sources back to back as a single window.
//!
//! ## Overview
//!
//! - Global period uids are `PeriodUid::Child { child_index, uid }` composites.
//! - Child window sequence numbers are `window_sequence_number * child_count + child_index`,
//!   so repeated occurrences of the concatenation stay distinct in every child.
//! - Children are enabled lazily when one of their periods is created and
//!   disabled again once none of their periods is active.
//! - Child timeline refreshes may arrive on any thread. They are coalesced by
//!   a [`TimelineUpdateScheduler`] into one notification for the playback
//!   thread, which rebuilds the [`ConcatenatedTimeline`] in
//!   `handle_source_info_refresh`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let source = ConcatenatingMediaSource::builder()
//!     .add(intro)
//!     .add_with_placeholder(progressive_episode, Duration::from_secs(1800))
//!     .build()?;
//! ```

use super::time_offset::TimeOffsetMediaPeriod;
use crate::allocator::DefaultAllocator;
use crate::error::{PlaybackError, Result};
use crate::period_id::{MediaPeriodId, PeriodUid};
use crate::time::{duration_to_us, us_to_ms, LoadPosition};
use crate::timeline::{ConcatenatedTimeline, ConcatenationChild, Timeline};
use crate::traits::{
    LoadingInfo, MediaPeriod, MediaPeriodCallback, MediaSource, SampleStream,
    SourceInfoRefreshListener,
};
use crate::track_selection::{TrackGroupArray, TrackSelection};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Timeline Update Scheduling
// ============================================================================

/// Coalesces timeline refresh notifications.
///
/// The first `schedule` call forwards one notification to the attached
/// listener; later calls are dropped until the playback thread calls `take`.
#[derive(Default)]
pub struct TimelineUpdateScheduler {
    pending: AtomicBool,
    listener: Mutex<Option<Arc<dyn SourceInfoRefreshListener>>>,
}

impl TimelineUpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, listener: Arc<dyn SourceInfoRefreshListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn detach(&self) {
        *self.listener.lock() = None;
        self.pending.store(false, Ordering::Release);
    }

    /// Returns `true` if this call sent a notification.
    pub fn schedule(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => {
                listener.on_source_info_refreshed();
                true
            }
            None => {
                self.pending.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Clears the pending flag. Returns whether an update was pending.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

struct ChildRefreshListener {
    child_index: usize,
    scheduler: Arc<TimelineUpdateScheduler>,
}

impl SourceInfoRefreshListener for ChildRefreshListener {
    fn on_source_info_refreshed(&self) {
        debug!(child_index = self.child_index, "Child timeline refreshed");
        self.scheduler.schedule();
    }
}

// ============================================================================
// Child Periods
// ============================================================================

/// A child period shifted into concatenated time, tagged with its child.
struct ChildMediaPeriod {
    child_index: usize,
    period: TimeOffsetMediaPeriod,
}

impl MediaPeriod for ChildMediaPeriod {
    fn prepare(&mut self, callback: Arc<dyn MediaPeriodCallback>, position_us: i64) {
        self.period.prepare(callback, position_us);
    }

    fn maybe_throw_prepare_error(&self) -> Result<()> {
        self.period.maybe_throw_prepare_error()
    }

    fn track_groups(&self) -> TrackGroupArray {
        self.period.track_groups()
    }

    fn select_tracks(
        &mut self,
        selections: &[Option<Arc<dyn TrackSelection>>],
        may_retain: &[bool],
        streams: &mut [Option<Box<dyn SampleStream>>],
        reset_flags: &mut [bool],
        position_us: i64,
    ) -> i64 {
        self.period
            .select_tracks(selections, may_retain, streams, reset_flags, position_us)
    }

    fn read_discontinuity(&mut self) -> Option<i64> {
        self.period.read_discontinuity()
    }

    fn buffered_position_us(&self) -> LoadPosition {
        self.period.buffered_position_us()
    }

    fn next_load_position_us(&self) -> LoadPosition {
        self.period.next_load_position_us()
    }

    fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool {
        self.period.continue_loading(loading_info)
    }

    fn is_loading(&self) -> bool {
        self.period.is_loading()
    }

    fn reevaluate_buffer(&mut self, position_us: i64) {
        self.period.reevaluate_buffer(position_us);
    }
}

// ============================================================================
// Concatenating Source
// ============================================================================

struct ChildSource {
    source: Arc<dyn MediaSource>,
    initial_placeholder_duration_us: Option<i64>,
}

#[derive(Default)]
struct ChildState {
    period_time_offsets_by_uid: HashMap<PeriodUid, i64>,
    active_media_periods: usize,
    enabled: bool,
}

/// Builder for [`ConcatenatingMediaSource`].
#[derive(Default)]
pub struct ConcatenatingMediaSourceBuilder {
    children: Vec<ChildSource>,
}

impl ConcatenatingMediaSourceBuilder {
    pub fn add(mut self, source: Arc<dyn MediaSource>) -> Self {
        self.children.push(ChildSource {
            source,
            initial_placeholder_duration_us: None,
        });
        self
    }

    /// Adds a source, assuming `placeholder_duration` until it reports its own.
    pub fn add_with_placeholder(
        mut self,
        source: Arc<dyn MediaSource>,
        placeholder_duration: Duration,
    ) -> Self {
        self.children.push(ChildSource {
            source,
            initial_placeholder_duration_us: Some(duration_to_us(placeholder_duration)),
        });
        self
    }

    pub fn build(self) -> Result<ConcatenatingMediaSource> {
        if self.children.is_empty() {
            return Err(PlaybackError::InvalidConfig(
                "must add at least one source to the concatenation".to_string(),
            ));
        }
        if let Some(index) = self.children.iter().position(|child| {
            child.source.requires_placeholder_duration()
                && child.initial_placeholder_duration_us.is_none()
        }) {
            return Err(PlaybackError::InvalidConfig(format!(
                "source {} must be added with a placeholder duration",
                index
            )));
        }

        let states = self.children.iter().map(|_| ChildState::default()).collect();
        Ok(ConcatenatingMediaSource {
            children: self.children,
            states: Mutex::new(states),
            timeline: Mutex::new(None),
            scheduler: Arc::new(TimelineUpdateScheduler::new()),
        })
    }
}

/// A [`MediaSource`] playing its children back to back in a single window.
pub struct ConcatenatingMediaSource {
    children: Vec<ChildSource>,
    states: Mutex<Vec<ChildState>>,
    timeline: Mutex<Option<Arc<ConcatenatedTimeline>>>,
    scheduler: Arc<TimelineUpdateScheduler>,
}

impl ConcatenatingMediaSource {
    pub fn builder() -> ConcatenatingMediaSourceBuilder {
        ConcatenatingMediaSourceBuilder::default()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn concatenated_timeline(&self) -> Option<Arc<ConcatenatedTimeline>> {
        self.timeline.lock().clone()
    }

    /// Number of created and not yet released periods of child `child_index`.
    pub fn active_media_periods(&self, child_index: usize) -> usize {
        self.states
            .lock()
            .get(child_index)
            .map_or(0, |state| state.active_media_periods)
    }

    pub fn is_child_enabled(&self, child_index: usize) -> bool {
        self.states
            .lock()
            .get(child_index)
            .is_some_and(|state| state.enabled)
    }

    /// Called by child `child_index` (on any thread) when its timeline changed.
    pub fn on_child_source_info_refreshed(&self, child_index: usize) {
        debug!(child_index, "Child timeline refreshed");
        self.scheduler.schedule();
    }

    /// Maps a period id reported by child `child_index` to the concatenated id.
    ///
    /// Returns `None` if the id does not belong to that child.
    pub fn media_period_id_for_child(
        &self,
        child_index: usize,
        child_id: &MediaPeriodId,
    ) -> Option<MediaPeriodId> {
        let child_count = self.children.len() as u64;
        if child_id.window_sequence_number % child_count != child_index as u64 {
            return None;
        }
        Some(
            child_id
                .copy_with_period_uid(PeriodUid::child(child_index, child_id.period_uid.clone()))
                .copy_with_window_sequence_number(child_id.window_sequence_number / child_count),
        )
    }

    /// Maps a media time (ms) reported by child `child_index` to concatenated time.
    pub fn media_time_for_child_media_time(
        &self,
        child_index: usize,
        media_time_ms: Option<i64>,
        child_id: Option<&MediaPeriodId>,
    ) -> Option<i64> {
        let media_time_ms = media_time_ms?;
        let Some(child_id) = child_id.filter(|id| !id.is_ad()) else {
            return Some(media_time_ms);
        };
        let offset_us = self
            .states
            .lock()
            .get(child_index)
            .and_then(|state| state.period_time_offsets_by_uid.get(&child_id.period_uid).copied());
        Some(match offset_us {
            Some(offset_us) => media_time_ms + us_to_ms(offset_us),
            None => media_time_ms,
        })
    }

    fn child_window_sequence_number(&self, window_sequence_number: u64, child_index: usize) -> u64 {
        window_sequence_number * self.children.len() as u64 + child_index as u64
    }

    fn disable_unused_children(&self, states: &mut [ChildState]) {
        for (index, state) in states.iter_mut().enumerate() {
            if state.enabled && state.active_media_periods == 0 {
                self.children[index].source.disable();
                state.enabled = false;
            }
        }
    }

    /// Rebuilds the concatenated timeline from the children's current timelines.
    fn update_timeline(&self) -> Result<Option<Arc<ConcatenatedTimeline>>> {
        let mut children = Vec::with_capacity(self.children.len());
        for (index, child) in self.children.iter().enumerate() {
            let Some(timeline) = child.source.handle_source_info_refresh()? else {
                debug!(child_index = index, "Child timeline not available yet");
                return Ok(self.concatenated_timeline());
            };
            children.push(ConcatenationChild::new(
                timeline,
                child.initial_placeholder_duration_us,
            ));
        }

        let Some(timeline) = ConcatenatedTimeline::try_build(&children)? else {
            debug!("Concatenation waits for a child duration");
            return Ok(self.concatenated_timeline());
        };

        let mut states = self.states.lock();
        for (index, state) in states.iter().enumerate() {
            if state.active_media_periods == 0 {
                continue;
            }
            for (uid, offset_us) in timeline.period_time_offsets(index) {
                if let Some(previous) = state.period_time_offsets_by_uid.get(uid) {
                    if previous != offset_us {
                        return Err(PlaybackError::InvalidTimeline(format!(
                            "can't handle windows with changing offset in first period ({})",
                            uid
                        )));
                    }
                }
            }
        }
        for (index, state) in states.iter_mut().enumerate() {
            state
                .period_time_offsets_by_uid
                .extend(timeline.period_time_offsets(index).clone());
        }
        drop(states);

        debug!(
            periods = timeline.period_count(),
            duration_us = ?timeline.window(0).duration_us,
            "Concatenated timeline updated"
        );
        let timeline = Arc::new(timeline);
        *self.timeline.lock() = Some(Arc::clone(&timeline));
        Ok(Some(timeline))
    }
}

impl MediaSource for ConcatenatingMediaSource {
    fn timeline(&self) -> Option<Arc<dyn Timeline>> {
        self.concatenated_timeline()
            .map(|timeline| timeline as Arc<dyn Timeline>)
    }

    fn create_period(
        &self,
        id: &MediaPeriodId,
        allocator: &DefaultAllocator,
        start_position_us: i64,
    ) -> Result<Box<dyn MediaPeriod>> {
        let child_uid = id
            .period_uid
            .as_child()
            .filter(|child| child.child_index < self.children.len())
            .ok_or_else(|| PlaybackError::PeriodNotInTimeline(id.to_string()))?;
        let child_index = child_uid.child_index;
        let child = &self.children[child_index];
        let child_id = id
            .copy_with_period_uid(child_uid.uid.clone())
            .copy_with_window_sequence_number(
                self.child_window_sequence_number(id.window_sequence_number, child_index),
            );

        let time_offset_us = {
            let mut states = self.states.lock();
            let state = &mut states[child_index];
            let offset = if id.is_ad() {
                Some(0)
            } else {
                state.period_time_offsets_by_uid.get(&child_uid.uid).copied()
            };
            let Some(offset) = offset else {
                return Err(PlaybackError::PeriodNotInTimeline(id.to_string()));
            };
            if !state.enabled {
                child.source.enable();
                state.enabled = true;
            }
            offset
        };

        let created =
            child
                .source
                .create_period(&child_id, allocator, start_position_us - time_offset_us);

        let mut states = self.states.lock();
        let period = match created {
            Ok(period) => {
                states[child_index].active_media_periods += 1;
                period
            }
            Err(err) => {
                self.disable_unused_children(&mut states);
                return Err(err);
            }
        };
        self.disable_unused_children(&mut states);

        debug!(
            period = %id,
            child_index,
            time_offset_us,
            "Created child media period"
        );
        Ok(Box::new(ChildMediaPeriod {
            child_index,
            period: TimeOffsetMediaPeriod::new(period, time_offset_us),
        }))
    }

    fn release_period(&self, period: Box<dyn MediaPeriod>) -> Result<()> {
        let child_period = period
            .into_any()
            .downcast::<ChildMediaPeriod>()
            .map_err(|_| {
                PlaybackError::UnknownPeriod("period was not created by this source".to_string())
            })?;
        let child_index = child_period.child_index;
        let result = self.children[child_index]
            .source
            .release_period(child_period.period.into_inner());

        let mut states = self.states.lock();
        let state = &mut states[child_index];
        state.active_media_periods = state.active_media_periods.saturating_sub(1);
        // The last child stays enabled while nothing is active.
        if states.iter().any(|state| state.active_media_periods > 0) {
            self.disable_unused_children(&mut states);
        }
        result
    }

    fn prepare_source(&self, listener: Arc<dyn SourceInfoRefreshListener>) -> Result<()> {
        self.scheduler.attach(listener);
        for (child_index, child) in self.children.iter().enumerate() {
            child.source.prepare_source(Arc::new(ChildRefreshListener {
                child_index,
                scheduler: Arc::clone(&self.scheduler),
            }))?;
        }
        self.scheduler.schedule();
        Ok(())
    }

    fn handle_source_info_refresh(&self) -> Result<Option<Arc<dyn Timeline>>> {
        self.scheduler.take();
        let timeline = self.update_timeline()?;
        Ok(timeline.map(|timeline| timeline as Arc<dyn Timeline>))
    }

    fn enable(&self) {
        // Children are enabled lazily when their periods are created.
    }

    fn disable(&self) {}

    fn release_source(&self) {
        self.scheduler.detach();
        let mut states = self.states.lock();
        for (index, state) in states.iter_mut().enumerate() {
            if state.active_media_periods > 0 {
                warn!(
                    child_index = index,
                    active = state.active_media_periods,
                    "Releasing child source with active periods"
                );
            }
            if state.enabled {
                self.children[index].source.disable();
                state.enabled = false;
            }
            self.children[index].source.release_source();
            state.period_time_offsets_by_uid.clear();
        }
        *self.timeline.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingListener {
        count: AtomicUsize,
    }

    impl SourceInfoRefreshListener for CountingListener {
        fn on_source_info_refreshed(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_scheduler_coalesces_until_taken() {
        let scheduler = TimelineUpdateScheduler::new();
        let listener = Arc::new(CountingListener::default());
        scheduler.attach(listener.clone());

        assert!(scheduler.schedule());
        assert!(!scheduler.schedule());
        assert!(!scheduler.schedule());
        assert_eq!(listener.count.load(Ordering::SeqCst), 1);

        assert!(scheduler.take());
        assert!(!scheduler.is_pending());
        assert!(scheduler.schedule());
        assert_eq!(listener.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scheduler_without_listener_stays_idle() {
        let scheduler = TimelineUpdateScheduler::new();
        assert!(!scheduler.schedule());
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_builder_requires_children() {
        assert!(matches!(
            ConcatenatingMediaSource::builder().build(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }
}
