//! # Media Period Holder
//!
//! The queue's node type. A holder owns one media period and tracks its
//! preparation, its current track selection, the per-renderer sample streams
//! and the offset between period time and renderer time.
//!
//! ## Overview
//!
//! - **Time**: `renderer_time = period_time + renderer_offset`.
//! - **Loading**: only the loading holder (the one with no successor) keeps its
//!   track selections enabled at the source level. [`MediaPeriodHolder::set_next`]
//!   is the single place that status changes.
//! - **Lifecycle**: `created -> prepare_called -> prepared -> released`.
//!   [`MediaPeriodHolder::release`] consumes the holder, so a holder is
//!   released at most once; after release the period's callbacks are dropped.
//! - **Errors**: prepare and stream errors are folded into
//!   [`MediaPeriodHolder::has_loading_error`]. Release errors are logged and
//!   swallowed. Inconsistent collaborator state is a contract violation and
//!   panics.

use crate::allocator::DefaultAllocator;
use crate::error::{PlaybackError, Result};
use crate::period_id::{MediaPeriodInfo, PeriodUid};
use crate::scheduler::{PlaybackMessage, PlaybackSender};
use crate::source::{ClippingMediaPeriod, EmptySampleStream, UnavailableMediaPeriod};
use crate::time::LoadPosition;
use crate::timeline::Timeline;
use crate::traits::{
    LoadingInfo, MediaPeriod, MediaPeriodCallback, MediaSource, RendererCapabilities,
    SampleStream, TrackSelector,
};
use crate::track_selection::{TrackGroupArray, TrackSelectorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Stable identity of a holder, used to route period callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(pub u64);

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "holder-{}", self.0)
    }
}

// ============================================================================
// Period Slot
// ============================================================================

/// The period owned by a holder, tagged by how it was built.
enum PeriodSlot {
    Plain(Box<dyn MediaPeriod>),
    Clipped(ClippingMediaPeriod),
    /// The source failed to create the period.
    Unavailable(UnavailableMediaPeriod),
}

impl PeriodSlot {
    fn period(&self) -> &dyn MediaPeriod {
        match self {
            PeriodSlot::Plain(period) => period.as_ref(),
            PeriodSlot::Clipped(period) => period,
            PeriodSlot::Unavailable(period) => period,
        }
    }

    fn period_mut(&mut self) -> &mut dyn MediaPeriod {
        match self {
            PeriodSlot::Plain(period) => period.as_mut(),
            PeriodSlot::Clipped(period) => period,
            PeriodSlot::Unavailable(period) => period,
        }
    }
}

// ============================================================================
// Period Callback
// ============================================================================

/// Forwards period notifications to the playback thread until the holder is released.
struct HolderCallback {
    holder: HolderId,
    sender: PlaybackSender,
    released: Arc<AtomicBool>,
}

impl HolderCallback {
    fn forward(&self, message: PlaybackMessage) {
        if self.released.load(Ordering::Acquire) {
            trace!(holder = %self.holder, ?message, "Dropping callback of released holder");
            return;
        }
        self.sender.send(message);
    }
}

impl MediaPeriodCallback for HolderCallback {
    fn on_prepared(&self) {
        self.forward(PlaybackMessage::PeriodPrepared(self.holder));
    }

    fn on_continue_loading_requested(&self) {
        self.forward(PlaybackMessage::ContinueLoadingRequested(self.holder));
    }
}

// ============================================================================
// Holder
// ============================================================================

pub struct MediaPeriodHolder {
    id: HolderId,
    uid: PeriodUid,
    info: MediaPeriodInfo,
    period: PeriodSlot,
    sample_streams: Vec<Option<Box<dyn SampleStream>>>,
    may_retain_stream_flags: Vec<bool>,
    renderers: Arc<[Arc<dyn RendererCapabilities>]>,
    track_selector: Arc<dyn TrackSelector>,
    source: Arc<dyn MediaSource>,
    track_groups: TrackGroupArray,
    track_selector_result: TrackSelectorResult,
    renderer_position_offset_us: i64,
    target_preload_buffer_duration_us: i64,
    prepare_called: bool,
    prepared: bool,
    has_enabled_tracks: bool,
    all_renderers_in_correct_state: bool,
    next: Option<HolderId>,
    is_loading_period: bool,
    released: Arc<AtomicBool>,
}

impl MediaPeriodHolder {
    /// Creates the holder and asks `source` for its period.
    ///
    /// A period with an end position is wrapped in a [`ClippingMediaPeriod`]
    /// bounded to `[0, end]`. If the source fails, the holder is still
    /// created and reports the failure through [`Self::has_loading_error`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: HolderId,
        renderers: Arc<[Arc<dyn RendererCapabilities>]>,
        renderer_position_offset_us: i64,
        track_selector: Arc<dyn TrackSelector>,
        allocator: &DefaultAllocator,
        source: Arc<dyn MediaSource>,
        info: MediaPeriodInfo,
        target_preload_buffer_duration_us: i64,
    ) -> Self {
        let renderer_count = renderers.len();
        let period = match source.create_period(&info.id, allocator, info.start_position_us) {
            Ok(period) => match info.end_position_us {
                Some(end_position_us) => PeriodSlot::Clipped(ClippingMediaPeriod::new(
                    period,
                    !info.is_preceded_by_transition_from_same_stream,
                    0,
                    Some(end_position_us),
                )),
                None => PeriodSlot::Plain(period),
            },
            Err(err) => {
                warn!(period = %info.id, error = %err, "Source failed to create media period");
                PeriodSlot::Unavailable(UnavailableMediaPeriod::new(&err))
            }
        };

        debug!(
            holder = %id,
            period = %info.id,
            start_position_us = info.start_position_us,
            renderer_offset_us = renderer_position_offset_us,
            "Created media period holder"
        );

        Self {
            id,
            uid: info.id.period_uid.clone(),
            info,
            period,
            sample_streams: (0..renderer_count).map(|_| None).collect(),
            may_retain_stream_flags: vec![false; renderer_count],
            renderers,
            track_selector,
            source,
            track_groups: TrackGroupArray::empty(),
            track_selector_result: TrackSelectorResult::empty(renderer_count),
            renderer_position_offset_us,
            target_preload_buffer_duration_us,
            prepare_called: false,
            prepared: false,
            has_enabled_tracks: false,
            all_renderers_in_correct_state: false,
            next: None,
            is_loading_period: true,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> HolderId {
        self.id
    }

    pub fn uid(&self) -> &PeriodUid {
        &self.uid
    }

    pub fn info(&self) -> &MediaPeriodInfo {
        &self.info
    }

    pub fn set_info(&mut self, info: MediaPeriodInfo) {
        self.info = info;
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_prepare_called(&self) -> bool {
        self.prepare_called
    }

    /// At least one renderer that consumes media has a stream.
    pub fn has_enabled_tracks(&self) -> bool {
        self.has_enabled_tracks
    }

    pub fn all_renderers_in_correct_state(&self) -> bool {
        self.all_renderers_in_correct_state
    }

    pub fn set_all_renderers_in_correct_state(&mut self, value: bool) {
        self.all_renderers_in_correct_state = value;
    }

    pub fn target_preload_buffer_duration_us(&self) -> i64 {
        self.target_preload_buffer_duration_us
    }

    pub fn next(&self) -> Option<HolderId> {
        self.next
    }

    /// Whether this holder is the tail of its queue and actively loading.
    pub fn is_loading_period(&self) -> bool {
        self.is_loading_period
    }

    pub fn track_groups(&self) -> &TrackGroupArray {
        &self.track_groups
    }

    pub fn track_selector_result(&self) -> &TrackSelectorResult {
        &self.track_selector_result
    }

    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    pub fn stream(&self, renderer_index: usize) -> Option<&dyn SampleStream> {
        self.sample_streams
            .get(renderer_index)
            .and_then(|stream| stream.as_deref())
    }

    /// Whether the period was wrapped for an end position.
    pub fn is_clipped(&self) -> bool {
        matches!(self.period, PeriodSlot::Clipped(_))
    }

    // ------------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------------

    pub fn to_renderer_time(&self, period_time_us: i64) -> i64 {
        period_time_us + self.renderer_position_offset_us
    }

    pub fn to_period_time(&self, renderer_time_us: i64) -> i64 {
        renderer_time_us - self.renderer_position_offset_us
    }

    pub fn renderer_offset(&self) -> i64 {
        self.renderer_position_offset_us
    }

    pub fn set_renderer_offset(&mut self, renderer_position_offset_us: i64) {
        self.renderer_position_offset_us = renderer_position_offset_us;
    }

    pub fn start_position_renderer_time(&self) -> i64 {
        self.info.start_position_us + self.renderer_position_offset_us
    }

    // ------------------------------------------------------------------------
    // Buffering
    // ------------------------------------------------------------------------

    pub fn is_fully_buffered(&self) -> bool {
        self.prepared
            && (!self.has_enabled_tracks
                || self.period.period().buffered_position_us().is_end_of_source())
    }

    pub fn is_fully_preloaded(&self) -> bool {
        if !self.prepared {
            return false;
        }
        self.is_fully_buffered()
            || self.buffered_position_us().is_some_and(|buffered| {
                buffered - self.info.start_position_us >= self.target_preload_buffer_duration_us
            })
    }

    /// Buffered position in period time.
    ///
    /// Before preparation this is the start position. End of source maps to
    /// the period duration, `None` if that is unknown.
    pub fn buffered_position_us(&self) -> Option<i64> {
        if !self.prepared {
            return Some(self.info.start_position_us);
        }
        let buffered = if self.has_enabled_tracks {
            self.period.period().buffered_position_us()
        } else {
            LoadPosition::EndOfSource
        };
        match buffered {
            LoadPosition::At(position_us) => Some(position_us),
            LoadPosition::EndOfSource => self.info.duration_us,
        }
    }

    pub fn next_load_position_us(&self) -> LoadPosition {
        if !self.prepared {
            return LoadPosition::At(0);
        }
        self.period.period().next_load_position_us()
    }

    /// Whether the period is currently loading.
    pub fn is_period_loading(&self) -> bool {
        self.period.period().is_loading()
    }

    // ------------------------------------------------------------------------
    // Preparation
    // ------------------------------------------------------------------------

    /// Starts preparing the period. Progress arrives as [`PlaybackMessage`]s on `sender`.
    pub fn prepare(&mut self, sender: &PlaybackSender, start_position_us: i64) {
        self.prepare_called = true;
        let callback = Arc::new(HolderCallback {
            holder: self.id,
            sender: sender.clone(),
            released: Arc::clone(&self.released),
        });
        self.period.period_mut().prepare(callback, start_position_us);
    }

    /// Completes preparation: selects tracks, applies them, and re-bases the
    /// renderer offset on the position the period actually starts at.
    ///
    /// # Panics
    ///
    /// Panics if the holder is already prepared.
    pub fn handle_prepared(
        &mut self,
        playback_speed: f32,
        timeline: &dyn Timeline,
        play_when_ready: bool,
    ) -> Result<()> {
        assert!(
            !self.prepared,
            "handle_prepared called twice for {} ({})",
            self.id, self.info.id
        );
        self.prepared = true;
        self.track_groups = self.period.period().track_groups();
        let selector_result = self.select_tracks(playback_speed, timeline, play_when_ready)?;

        let mut requested_start_position_us = self.info.start_position_us;
        if let Some(duration_us) = self.info.duration_us {
            if requested_start_position_us >= duration_us {
                requested_start_position_us = (duration_us - 1).max(0);
            }
        }
        let mut reset_flags = vec![false; self.renderers.len()];
        let new_start_position_us = self.apply_track_selection(
            selector_result,
            requested_start_position_us,
            false,
            &mut reset_flags,
        );
        self.renderer_position_offset_us += self.info.start_position_us - new_start_position_us;
        self.info = self.info.copy_with_start_position_us(new_start_position_us);

        debug!(
            holder = %self.id,
            period = %self.info.id,
            start_position_us = new_start_position_us,
            has_enabled_tracks = self.has_enabled_tracks,
            "Media period prepared"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Track Selection
    // ------------------------------------------------------------------------

    /// Runs the track selector against this period's track groups.
    ///
    /// # Panics
    ///
    /// Panics if the result has the wrong length, an enabled renderer that
    /// consumes media has no selection, or a disabled renderer has one.
    pub fn select_tracks(
        &self,
        playback_speed: f32,
        timeline: &dyn Timeline,
        play_when_ready: bool,
    ) -> Result<TrackSelectorResult> {
        let result = self.track_selector.select_tracks(
            &self.renderers,
            &self.track_groups,
            &self.info.id,
            timeline,
        )?;

        assert_eq!(
            result.len(),
            self.renderers.len(),
            "track selector returned {} slots for {} renderers",
            result.len(),
            self.renderers.len()
        );
        for (index, renderer) in self.renderers.iter().enumerate() {
            if result.is_renderer_enabled(index) {
                assert!(
                    result.selection(index).is_some() || renderer.track_type().is_none(),
                    "renderer {} ({}) enabled without a selection",
                    index,
                    renderer.name()
                );
            } else {
                assert!(
                    result.selection(index).is_none(),
                    "renderer {} ({}) disabled but has a selection",
                    index,
                    renderer.name()
                );
            }
        }

        for selection in result.active_selections() {
            selection.on_playback_speed(playback_speed);
            selection.on_play_when_ready_changed(play_when_ready);
        }
        Ok(result)
    }

    /// Applies `new_result` to the period and returns the position at which
    /// the streams actually start.
    ///
    /// Streams of unchanged renderers are retained unless
    /// `force_recreate_streams` is set. `stream_reset_flags[i]` is set for
    /// every stream the period recreated.
    pub fn apply_track_selection(
        &mut self,
        new_result: TrackSelectorResult,
        position_us: i64,
        force_recreate_streams: bool,
        stream_reset_flags: &mut [bool],
    ) -> i64 {
        assert_eq!(new_result.len(), self.renderers.len());
        for index in 0..new_result.len() {
            self.may_retain_stream_flags[index] = !force_recreate_streams
                && new_result.is_equivalent(Some(&self.track_selector_result), index);
        }

        // The period must only see streams it created itself.
        self.disassociate_no_sample_renderers();
        self.disable_track_selections_in_result();
        self.track_selector_result = new_result;
        self.enable_track_selections_in_result();

        let position_us = self.period.period_mut().select_tracks(
            &self.track_selector_result.selections,
            &self.may_retain_stream_flags,
            &mut self.sample_streams,
            stream_reset_flags,
            position_us,
        );
        self.associate_no_sample_renderers();

        self.has_enabled_tracks = false;
        for (index, stream) in self.sample_streams.iter().enumerate() {
            if stream.is_some() {
                assert!(
                    self.track_selector_result.is_renderer_enabled(index),
                    "stream for disabled renderer {}",
                    index
                );
                if !self.renderers[index].track_type().is_none() {
                    self.has_enabled_tracks = true;
                }
            } else {
                assert!(
                    self.track_selector_result.selection(index).is_none(),
                    "no stream for selected renderer {}",
                    index
                );
            }
        }
        position_us
    }

    fn disassociate_no_sample_renderers(&mut self) {
        for (index, renderer) in self.renderers.iter().enumerate() {
            if renderer.track_type().is_none() {
                self.sample_streams[index] = None;
            }
        }
    }

    fn associate_no_sample_renderers(&mut self) {
        for (index, renderer) in self.renderers.iter().enumerate() {
            if renderer.track_type().is_none()
                && self.track_selector_result.is_renderer_enabled(index)
            {
                self.sample_streams[index] = Some(Box::new(EmptySampleStream));
            }
        }
    }

    fn enable_track_selections_in_result(&self) {
        if !self.is_loading_period {
            return;
        }
        for (index, selection) in self.track_selector_result.selections.iter().enumerate() {
            if let Some(selection) = selection {
                if self.track_selector_result.is_renderer_enabled(index) {
                    selection.enable();
                }
            }
        }
    }

    fn disable_track_selections_in_result(&self) {
        if !self.is_loading_period {
            return;
        }
        for (index, selection) in self.track_selector_result.selections.iter().enumerate() {
            if let Some(selection) = selection {
                if self.track_selector_result.is_renderer_enabled(index) {
                    selection.disable();
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Lets the loading period discard media behind `renderer_position_us`.
    pub fn reevaluate_buffer(&mut self, renderer_position_us: i64) {
        assert!(
            self.is_loading_period,
            "reevaluate_buffer on non-loading {}",
            self.id
        );
        if self.prepared {
            let position_us = self.to_period_time(renderer_position_us);
            self.period.period_mut().reevaluate_buffer(position_us);
        }
    }

    /// Asks the loading period to load more.
    ///
    /// `loading_info.playback_position_us` is in renderer time.
    pub fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool {
        assert!(
            self.is_loading_period,
            "continue_loading on non-loading {}",
            self.id
        );
        let period_info = loading_info
            .with_playback_position_us(self.to_period_time(loading_info.playback_position_us));
        self.period.period_mut().continue_loading(&period_info)
    }

    /// Returns a pending discontinuity of the period, in period time.
    pub fn read_discontinuity(&mut self) -> Option<i64> {
        self.period.period_mut().read_discontinuity()
    }

    /// Re-applies the end position of the current info to a clipped period.
    pub fn update_clipping(&mut self) {
        if let PeriodSlot::Clipped(period) = &mut self.period {
            period.update_clipping(0, self.info.end_position_us);
        }
    }

    /// The error blocking this period, if any.
    pub fn loading_error(&self) -> Option<PlaybackError> {
        if !self.prepared {
            return self.period.period().maybe_throw_prepare_error().err();
        }
        self.sample_streams
            .iter()
            .flatten()
            .find_map(|stream| stream.maybe_throw_error().err())
    }

    pub fn has_loading_error(&self) -> bool {
        self.loading_error().is_some()
    }

    /// Whether this holder already plays what `info` describes.
    pub fn can_be_used_for_media_period_info(&self, info: &MediaPeriodInfo) -> bool {
        are_durations_compatible(self.info.duration_us, info.duration_us)
            && self.info.start_position_us == info.start_position_us
            && self.info.id == info.id
    }

    // ------------------------------------------------------------------------
    // Linking & Release
    // ------------------------------------------------------------------------

    /// Links this holder to its successor.
    ///
    /// Losing or gaining the loading status disables or enables the current
    /// selections. Setting the current value again does nothing.
    pub fn set_next(&mut self, next: Option<HolderId>) {
        if next == self.next {
            return;
        }
        self.disable_track_selections_in_result();
        self.next = next;
        self.is_loading_period = next.is_none();
        self.enable_track_selections_in_result();
    }

    /// Disables the selections and hands the period back to the source.
    pub fn release(mut self) {
        self.released.store(true, Ordering::Release);
        self.disable_track_selections_in_result();
        self.sample_streams.clear();

        let result = match self.period {
            PeriodSlot::Plain(period) => self.source.release_period(period),
            PeriodSlot::Clipped(period) => self.source.release_period(period.into_inner()),
            PeriodSlot::Unavailable(_) => Ok(()),
        };
        match result {
            Ok(()) => debug!(holder = %self.id, period = %self.info.id, "Released media period"),
            Err(err) => error!(
                holder = %self.id,
                period = %self.info.id,
                error = %err,
                "Period release failed"
            ),
        }
    }
}

impl fmt::Debug for MediaPeriodHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPeriodHolder")
            .field("id", &self.id)
            .field("period", &self.info.id)
            .field("prepared", &self.prepared)
            .field("renderer_offset_us", &self.renderer_position_offset_us)
            .field("next", &self.next)
            .finish()
    }
}

/// Two durations are compatible if they are equal or either is unknown.
pub fn are_durations_compatible(previous_duration_us: Option<i64>, new_duration_us: Option<i64>) -> bool {
    match (previous_duration_us, new_duration_us) {
        (Some(previous), Some(new)) => previous == new,
        _ => true,
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Builds holders that share one set of collaborators.
#[derive(Clone)]
pub struct MediaPeriodHolderFactory {
    renderers: Arc<[Arc<dyn RendererCapabilities>]>,
    track_selector: Arc<dyn TrackSelector>,
    source: Arc<dyn MediaSource>,
    allocator: DefaultAllocator,
    target_preload_buffer_duration_us: i64,
    next_holder_id: Arc<AtomicU64>,
}

impl MediaPeriodHolderFactory {
    pub fn new(
        renderers: Vec<Arc<dyn RendererCapabilities>>,
        track_selector: Arc<dyn TrackSelector>,
        source: Arc<dyn MediaSource>,
        allocator: DefaultAllocator,
        target_preload_buffer_duration_us: i64,
    ) -> Self {
        Self {
            renderers: renderers.into(),
            track_selector,
            source,
            allocator,
            target_preload_buffer_duration_us,
            next_holder_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn create(&self, info: MediaPeriodInfo, renderer_position_offset_us: i64) -> MediaPeriodHolder {
        let id = HolderId(self.next_holder_id.fetch_add(1, Ordering::Relaxed));
        MediaPeriodHolder::new(
            id,
            Arc::clone(&self.renderers),
            renderer_position_offset_us,
            Arc::clone(&self.track_selector),
            &self.allocator,
            Arc::clone(&self.source),
            info,
            self.target_preload_buffer_duration_us,
        )
    }

    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    pub fn source(&self) -> &Arc<dyn MediaSource> {
        &self.source
    }

    pub fn track_selector(&self) -> &Arc<dyn TrackSelector> {
        &self.track_selector
    }

    pub fn allocator(&self) -> &DefaultAllocator {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period_id::MediaPeriodId;
    use crate::scheduler::channel;
    use crate::testing::{FakeMediaSource, FakeRenderer, FakeTrackSelector};
    use crate::track_selection::TrackType;
    use mockall::mock;

    mock! {
        Source {}

        impl MediaSource for Source {
            fn timeline(&self) -> Option<Arc<dyn Timeline>>;
            fn create_period(
                &self,
                id: &crate::period_id::MediaPeriodId,
                allocator: &DefaultAllocator,
                start_position_us: i64,
            ) -> Result<Box<dyn MediaPeriod>>;
            fn release_period(&self, period: Box<dyn MediaPeriod>) -> Result<()>;
        }
    }

    fn renderers() -> Arc<[Arc<dyn RendererCapabilities>]> {
        vec![Arc::new(FakeRenderer::new("audio", TrackType::Audio)) as Arc<dyn RendererCapabilities>]
            .into()
    }

    fn info() -> MediaPeriodInfo {
        MediaPeriodInfo::new(MediaPeriodId::new(PeriodUid::Id(1), 0), 0, Some(1_000_000))
    }

    #[test]
    fn test_durations_compatibility() {
        assert!(are_durations_compatible(None, Some(5)));
        assert!(are_durations_compatible(Some(5), None));
        assert!(are_durations_compatible(None, None));
        assert!(are_durations_compatible(Some(5), Some(5)));
        assert!(!are_durations_compatible(Some(5), Some(6)));
    }

    #[test]
    fn test_release_error_is_swallowed() {
        let mut source = MockSource::new();
        source
            .expect_create_period()
            .times(1)
            .returning(|_, _, _| {
                Ok(Box::new(crate::testing::FakeMediaPeriod::new()) as Box<dyn MediaPeriod>)
            });
        source
            .expect_release_period()
            .times(1)
            .returning(|_| Err(PlaybackError::ReleaseFailed("already gone".into())));

        let holder = MediaPeriodHolder::new(
            HolderId(0),
            renderers(),
            0,
            Arc::new(FakeTrackSelector::new()),
            &DefaultAllocator::new(16),
            Arc::new(source),
            info(),
            0,
        );
        holder.release();
    }

    #[test]
    fn test_clipped_period_is_unwrapped_on_release() {
        let source = Arc::new(FakeMediaSource::single("a", Some(2_000_000)));
        let info = MediaPeriodInfo::new(MediaPeriodId::new(PeriodUid::name("a"), 0), 0, None)
            .with_end_position_us(1_000_000);
        let holder = MediaPeriodHolder::new(
            HolderId(0),
            renderers(),
            0,
            Arc::new(FakeTrackSelector::new()),
            &DefaultAllocator::new(16),
            source.clone(),
            info,
            0,
        );
        assert!(holder.is_clipped());
        holder.release();
        assert_eq!(source.released_count(), 1);
        assert_eq!(source.foreign_release_count(), 0);
    }

    #[test]
    fn test_callbacks_dropped_after_release() {
        let source = Arc::new(FakeMediaSource::single("a", Some(2_000_000)));
        let (sender, mut receiver) = channel();
        let mut holder = MediaPeriodHolder::new(
            HolderId(4),
            renderers(),
            0,
            Arc::new(FakeTrackSelector::new()),
            &DefaultAllocator::new(16),
            source.clone(),
            MediaPeriodInfo::new(MediaPeriodId::new(PeriodUid::name("a"), 0), 0, None),
            0,
        );
        holder.prepare(&sender, 0);
        let period = source.last_created().unwrap();

        period.signal_continue_loading();
        assert_eq!(
            receiver.drain(),
            vec![PlaybackMessage::ContinueLoadingRequested(HolderId(4))]
        );

        holder.release();
        period.signal_prepared();
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_create_failure_surfaces_as_loading_error() {
        let source = Arc::new(FakeMediaSource::single("a", Some(2_000_000)));
        source.fail_next_create("no such period");
        let holder = MediaPeriodHolder::new(
            HolderId(0),
            renderers(),
            0,
            Arc::new(FakeTrackSelector::new()),
            &DefaultAllocator::new(16),
            source.clone(),
            info(),
            0,
        );
        assert!(holder.has_loading_error());
        assert!(matches!(
            holder.loading_error(),
            Some(PlaybackError::SourceError(reason)) if reason.contains("no such period")
        ));
        holder.release();
        assert_eq!(source.released_count(), 0);
    }
}
