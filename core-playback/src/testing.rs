//! Deterministic fakes of the queue's collaborators.
//!
//! Available to unit tests and, with the `test-utils` feature, to integration
//! tests and downstream crates. Every fake records what was asked of it and
//! exposes knobs to inject errors.

use crate::allocator::DefaultAllocator;
use crate::error::{PlaybackError, Result};
use crate::period_id::{MediaPeriodId, PeriodUid};
use crate::time::LoadPosition;
use crate::timeline::{Period, SinglePeriodTimeline, Timeline, Window};
use crate::traits::{
    LoadingInfo, MediaPeriod, MediaPeriodCallback, MediaSource, RendererCapabilities,
    SampleStream, SourceInfoRefreshListener, TrackSelector,
};
use crate::track_selection::{
    Format, RendererConfiguration, TrackGroup, TrackGroupArray, TrackSelection,
    TrackSelectorResult, TrackType,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Renderers
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeRenderer {
    name: String,
    track_type: TrackType,
}

impl FakeRenderer {
    pub fn new(name: impl Into<String>, track_type: TrackType) -> Self {
        Self {
            name: name.into(),
            track_type,
        }
    }
}

impl RendererCapabilities for FakeRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        self.track_type
    }
}

// ============================================================================
// Media Period
// ============================================================================

/// Observable and adjustable state of a [`FakeMediaPeriod`].
pub struct FakePeriodState {
    pub track_groups: TrackGroupArray,
    pub buffered_position: LoadPosition,
    pub next_load_position: LoadPosition,
    pub prepare_error: Option<String>,
    pub stream_error: Option<String>,
    /// Position returned from `select_tracks` instead of the requested one.
    pub actual_start_override: Option<i64>,
    /// Calls `on_prepared` from inside `prepare`.
    pub auto_prepare: bool,
    pub is_loading: bool,
    /// Returned once from `read_discontinuity`.
    pub discontinuity_us: Option<i64>,
    pub callback: Option<Arc<dyn MediaPeriodCallback>>,
    pub prepare_position_us: Option<i64>,
    pub last_select_position_us: Option<i64>,
    pub last_loading_position_us: Option<i64>,
    pub last_reevaluate_position_us: Option<i64>,
    pub select_calls: usize,
    pub continue_loading_calls: usize,
    pub streams_created: usize,
}

impl Default for FakePeriodState {
    fn default() -> Self {
        Self {
            track_groups: default_track_groups(),
            buffered_position: LoadPosition::At(0),
            next_load_position: LoadPosition::At(0),
            prepare_error: None,
            stream_error: None,
            actual_start_override: None,
            auto_prepare: false,
            is_loading: false,
            discontinuity_us: None,
            callback: None,
            prepare_position_us: None,
            last_select_position_us: None,
            last_loading_position_us: None,
            last_reevaluate_position_us: None,
            select_calls: 0,
            continue_loading_calls: 0,
            streams_created: 0,
        }
    }
}

/// One audio group and one video group, each with a single format.
pub fn default_track_groups() -> TrackGroupArray {
    TrackGroupArray::new(vec![
        TrackGroup::new("audio", TrackType::Audio, vec![Format::new("aac")]),
        TrackGroup::new("video", TrackType::Video, vec![Format::new("h264")]),
    ])
}

/// Shared view of a fake period that stays valid after the period moved into a holder.
#[derive(Clone)]
pub struct FakePeriodHandle {
    state: Arc<Mutex<FakePeriodState>>,
}

impl FakePeriodHandle {
    pub fn state(&self) -> Arc<Mutex<FakePeriodState>> {
        Arc::clone(&self.state)
    }

    pub fn set_buffered_position(&self, position: LoadPosition) {
        self.state.lock().buffered_position = position;
    }

    pub fn set_stream_error(&self, message: impl Into<String>) {
        self.state.lock().stream_error = Some(message.into());
    }

    pub fn set_prepare_error(&self, message: impl Into<String>) {
        self.state.lock().prepare_error = Some(message.into());
    }

    pub fn prepare_position_us(&self) -> Option<i64> {
        self.state.lock().prepare_position_us
    }

    pub fn continue_loading_calls(&self) -> usize {
        self.state.lock().continue_loading_calls
    }

    /// Fires `on_prepared` on the callback registered in `prepare`.
    pub fn signal_prepared(&self) {
        let callback = self.state.lock().callback.clone();
        if let Some(callback) = callback {
            callback.on_prepared();
        }
    }

    pub fn signal_continue_loading(&self) {
        let callback = self.state.lock().callback.clone();
        if let Some(callback) = callback {
            callback.on_continue_loading_requested();
        }
    }
}

#[derive(Default)]
pub struct FakeMediaPeriod {
    state: Arc<Mutex<FakePeriodState>>,
}

impl FakeMediaPeriod {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track_groups(self, track_groups: TrackGroupArray) -> Self {
        self.state.lock().track_groups = track_groups;
        self
    }

    pub fn state(&self) -> Arc<Mutex<FakePeriodState>> {
        Arc::clone(&self.state)
    }

    pub fn handle(&self) -> FakePeriodHandle {
        FakePeriodHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MediaPeriod for FakeMediaPeriod {
    fn prepare(&mut self, callback: Arc<dyn MediaPeriodCallback>, position_us: i64) {
        let auto_prepare = {
            let mut state = self.state.lock();
            state.callback = Some(Arc::clone(&callback));
            state.prepare_position_us = Some(position_us);
            state.buffered_position = LoadPosition::At(position_us);
            state.next_load_position = LoadPosition::At(position_us);
            state.auto_prepare
        };
        if auto_prepare {
            callback.on_prepared();
        }
    }

    fn maybe_throw_prepare_error(&self) -> Result<()> {
        match &self.state.lock().prepare_error {
            Some(message) => Err(PlaybackError::SourceError(message.clone())),
            None => Ok(()),
        }
    }

    fn track_groups(&self) -> TrackGroupArray {
        self.state.lock().track_groups.clone()
    }

    fn select_tracks(
        &mut self,
        selections: &[Option<Arc<dyn TrackSelection>>],
        may_retain: &[bool],
        streams: &mut [Option<Box<dyn SampleStream>>],
        reset_flags: &mut [bool],
        position_us: i64,
    ) -> i64 {
        let mut state = self.state.lock();
        for (index, selection) in selections.iter().enumerate() {
            if streams[index].is_some() && (selection.is_none() || !may_retain[index]) {
                streams[index] = None;
            }
            if streams[index].is_none() && selection.is_some() {
                streams[index] = Some(Box::new(FakeSampleStream {
                    state: Arc::clone(&self.state),
                }));
                reset_flags[index] = true;
                state.streams_created += 1;
            }
        }
        state.select_calls += 1;
        state.last_select_position_us = Some(position_us);
        state.actual_start_override.unwrap_or(position_us)
    }

    fn buffered_position_us(&self) -> LoadPosition {
        self.state.lock().buffered_position
    }

    fn next_load_position_us(&self) -> LoadPosition {
        self.state.lock().next_load_position
    }

    fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool {
        let mut state = self.state.lock();
        state.continue_loading_calls += 1;
        state.last_loading_position_us = Some(loading_info.playback_position_us);
        !state.next_load_position.is_end_of_source()
    }

    fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    fn reevaluate_buffer(&mut self, position_us: i64) {
        self.state.lock().last_reevaluate_position_us = Some(position_us);
    }

    fn read_discontinuity(&mut self) -> Option<i64> {
        self.state.lock().discontinuity_us.take()
    }
}

/// Stream created by [`FakeMediaPeriod`]; reports the period's stream error.
pub struct FakeSampleStream {
    state: Arc<Mutex<FakePeriodState>>,
}

impl SampleStream for FakeSampleStream {
    fn is_ready(&self) -> bool {
        true
    }

    fn maybe_throw_error(&self) -> Result<()> {
        match &self.state.lock().stream_error {
            Some(message) => Err(PlaybackError::StreamError(message.clone())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Media Source
// ============================================================================

#[derive(Default)]
struct FakeSourceState {
    created: Vec<(MediaPeriodId, i64)>,
    handles: Vec<FakePeriodHandle>,
    released: usize,
    foreign_releases: usize,
    fail_next_create: Option<String>,
    fail_releases: Option<String>,
    listener: Option<Arc<dyn SourceInfoRefreshListener>>,
    prepared: bool,
    source_released: bool,
    enable_calls: usize,
    disable_calls: usize,
}

/// A source serving [`FakeMediaPeriod`]s for a settable timeline.
pub struct FakeMediaSource {
    timeline: Mutex<Option<Arc<dyn Timeline>>>,
    state: Mutex<FakeSourceState>,
    auto_prepare: AtomicBool,
    requires_placeholder_duration: bool,
}

impl FakeMediaSource {
    pub fn new(timeline: Option<Arc<dyn Timeline>>) -> Self {
        Self {
            timeline: Mutex::new(timeline),
            state: Mutex::new(FakeSourceState::default()),
            auto_prepare: AtomicBool::new(false),
            requires_placeholder_duration: false,
        }
    }

    /// A source with one window holding one period named `name`.
    pub fn single(name: &str, duration_us: Option<i64>) -> Self {
        Self::new(Some(Arc::new(SinglePeriodTimeline::new(
            PeriodUid::name(name),
            duration_us,
        ))))
    }

    /// Created periods report `on_prepared` as soon as they are prepared.
    pub fn with_auto_prepare(self, auto_prepare: bool) -> Self {
        self.auto_prepare.store(auto_prepare, Ordering::Relaxed);
        self
    }

    pub fn with_requires_placeholder_duration(mut self, required: bool) -> Self {
        self.requires_placeholder_duration = required;
        self
    }

    /// Replaces the timeline and notifies the listener given to `prepare_source`.
    pub fn set_timeline(&self, timeline: Option<Arc<dyn Timeline>>) {
        *self.timeline.lock() = timeline;
        let listener = self.state.lock().listener.clone();
        if let Some(listener) = listener {
            listener.on_source_info_refreshed();
        }
    }

    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.state.lock().fail_next_create = Some(message.into());
    }

    pub fn fail_releases(&self, message: impl Into<String>) {
        self.state.lock().fail_releases = Some(message.into());
    }

    pub fn created_ids(&self) -> Vec<MediaPeriodId> {
        self.state.lock().created.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Start positions passed to `create_period`, in call order.
    pub fn created_positions(&self) -> Vec<i64> {
        self.state.lock().created.iter().map(|(_, position)| *position).collect()
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn released_count(&self) -> usize {
        self.state.lock().released
    }

    /// Periods handed back that this source did not create.
    pub fn foreign_release_count(&self) -> usize {
        self.state.lock().foreign_releases
    }

    pub fn last_created(&self) -> Option<FakePeriodHandle> {
        self.state.lock().handles.last().cloned()
    }

    pub fn period_handles(&self) -> Vec<FakePeriodHandle> {
        self.state.lock().handles.clone()
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().source_released
    }

    pub fn enable_calls(&self) -> usize {
        self.state.lock().enable_calls
    }

    pub fn disable_calls(&self) -> usize {
        self.state.lock().disable_calls
    }
}

impl MediaSource for FakeMediaSource {
    fn timeline(&self) -> Option<Arc<dyn Timeline>> {
        self.timeline.lock().clone()
    }

    fn create_period(
        &self,
        id: &MediaPeriodId,
        _allocator: &DefaultAllocator,
        start_position_us: i64,
    ) -> Result<Box<dyn MediaPeriod>> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next_create.take() {
            return Err(PlaybackError::SourceError(message));
        }
        let period = FakeMediaPeriod::new();
        period.state().lock().auto_prepare = self.auto_prepare.load(Ordering::Relaxed);
        state.created.push((id.clone(), start_position_us));
        state.handles.push(period.handle());
        Ok(Box::new(period))
    }

    fn release_period(&self, period: Box<dyn MediaPeriod>) -> Result<()> {
        let mut state = self.state.lock();
        match period.into_any().downcast::<FakeMediaPeriod>() {
            Ok(_) => state.released += 1,
            Err(_) => state.foreign_releases += 1,
        }
        match &state.fail_releases {
            Some(message) => Err(PlaybackError::ReleaseFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn prepare_source(&self, listener: Arc<dyn SourceInfoRefreshListener>) -> Result<()> {
        let mut state = self.state.lock();
        state.listener = Some(listener);
        state.prepared = true;
        Ok(())
    }

    fn enable(&self) {
        self.state.lock().enable_calls += 1;
    }

    fn disable(&self) {
        self.state.lock().disable_calls += 1;
    }

    fn release_source(&self) {
        let mut state = self.state.lock();
        state.listener = None;
        state.source_released = true;
    }

    fn requires_placeholder_duration(&self) -> bool {
        self.requires_placeholder_duration
    }
}

// ============================================================================
// Track Selection
// ============================================================================

/// Selection that counts how often it was enabled and disabled.
#[derive(Debug)]
pub struct RecordingSelection {
    group: TrackGroup,
    tracks: Vec<usize>,
    enables: AtomicUsize,
    disables: AtomicUsize,
    playback_speed: Mutex<Option<f32>>,
    play_when_ready: Mutex<Option<bool>>,
}

impl RecordingSelection {
    pub fn new(group: TrackGroup, tracks: Vec<usize>) -> Self {
        Self {
            group,
            tracks,
            enables: AtomicUsize::new(0),
            disables: AtomicUsize::new(0),
            playback_speed: Mutex::new(None),
            play_when_ready: Mutex::new(None),
        }
    }

    pub fn enable_count(&self) -> usize {
        self.enables.load(Ordering::SeqCst)
    }

    pub fn disable_count(&self) -> usize {
        self.disables.load(Ordering::SeqCst)
    }

    /// Enabled more often than disabled.
    pub fn is_enabled(&self) -> bool {
        self.enable_count() > self.disable_count()
    }

    pub fn last_playback_speed(&self) -> Option<f32> {
        *self.playback_speed.lock()
    }

    pub fn last_play_when_ready(&self) -> Option<bool> {
        *self.play_when_ready.lock()
    }
}

impl TrackSelection for RecordingSelection {
    fn track_group(&self) -> &TrackGroup {
        &self.group
    }

    fn selected_tracks(&self) -> &[usize] {
        &self.tracks
    }

    fn enable(&self) {
        self.enables.fetch_add(1, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.disables.fetch_add(1, Ordering::SeqCst);
    }

    fn on_playback_speed(&self, playback_speed: f32) {
        *self.playback_speed.lock() = Some(playback_speed);
    }

    fn on_play_when_ready_changed(&self, play_when_ready: bool) {
        *self.play_when_ready.lock() = Some(play_when_ready);
    }
}

/// Selects the first group matching each renderer's track type.
///
/// Renderers of type [`TrackType::None`] are enabled without a selection.
#[derive(Default)]
pub struct FakeTrackSelector {
    selections: Mutex<Vec<Arc<RecordingSelection>>>,
    failure: Mutex<Option<String>>,
    next_failure: Mutex<Option<String>>,
    select_calls: AtomicUsize,
}

impl FakeTrackSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Fails only the next selection.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.next_failure.lock() = Some(message.into());
    }

    /// Every selection created so far, in creation order.
    pub fn selections(&self) -> Vec<Arc<RecordingSelection>> {
        self.selections.lock().clone()
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }
}

impl TrackSelector for FakeTrackSelector {
    fn select_tracks(
        &self,
        renderers: &[Arc<dyn RendererCapabilities>],
        track_groups: &TrackGroupArray,
        _period_id: &MediaPeriodId,
        _timeline: &dyn Timeline,
    ) -> Result<TrackSelectorResult> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.next_failure.lock().take() {
            return Err(PlaybackError::TrackSelectionFailed(message));
        }
        if let Some(message) = self.failure.lock().clone() {
            return Err(PlaybackError::TrackSelectionFailed(message));
        }

        let mut configurations = Vec::with_capacity(renderers.len());
        let mut selections: Vec<Option<Arc<dyn TrackSelection>>> =
            Vec::with_capacity(renderers.len());
        for renderer in renderers {
            let track_type = renderer.track_type();
            if track_type.is_none() {
                configurations.push(Some(RendererConfiguration::default()));
                selections.push(None);
                continue;
            }
            match track_groups.iter().find(|group| group.track_type == track_type) {
                Some(group) => {
                    let selection = Arc::new(RecordingSelection::new(group.clone(), vec![0]));
                    self.selections.lock().push(Arc::clone(&selection));
                    configurations.push(Some(RendererConfiguration::default()));
                    selections.push(Some(selection));
                }
                None => {
                    configurations.push(None);
                    selections.push(None);
                }
            }
        }
        Ok(TrackSelectorResult::new(configurations, selections))
    }
}

// ============================================================================
// Timelines
// ============================================================================

/// Builder for one window of a [`FakeTimeline`].
#[derive(Debug, Clone)]
pub struct FakeWindow {
    periods: Vec<(PeriodUid, Option<i64>)>,
    duration_us: Option<i64>,
    default_position_us: i64,
    position_in_first_period_us: i64,
    is_dynamic: bool,
    is_placeholder: bool,
}

impl FakeWindow {
    /// The window spans all periods; its duration is their sum if all are known.
    pub fn new(periods: Vec<(PeriodUid, Option<i64>)>) -> Self {
        let duration_us = periods
            .iter()
            .map(|(_, duration)| *duration)
            .sum::<Option<i64>>();
        Self {
            periods,
            duration_us,
            default_position_us: 0,
            position_in_first_period_us: 0,
            is_dynamic: false,
            is_placeholder: false,
        }
    }

    pub fn single(uid: PeriodUid, duration_us: Option<i64>) -> Self {
        Self::new(vec![(uid, duration_us)])
    }

    pub fn with_duration_us(mut self, duration_us: Option<i64>) -> Self {
        self.duration_us = duration_us;
        self
    }

    pub fn with_default_position_us(mut self, default_position_us: i64) -> Self {
        self.default_position_us = default_position_us;
        self
    }

    pub fn with_position_in_first_period_us(mut self, position_us: i64) -> Self {
        self.position_in_first_period_us = position_us;
        self
    }

    pub fn with_dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = is_dynamic;
        self
    }

    pub fn with_placeholder(mut self, is_placeholder: bool) -> Self {
        self.is_placeholder = is_placeholder;
        self
    }
}

/// A timeline assembled from [`FakeWindow`]s.
#[derive(Debug, Clone)]
pub struct FakeTimeline {
    windows: Vec<Window>,
    periods: Vec<Period>,
}

impl FakeTimeline {
    pub fn new(windows: Vec<FakeWindow>) -> Self {
        let mut built_windows = Vec::with_capacity(windows.len());
        let mut periods = Vec::new();
        for (window_index, window) in windows.into_iter().enumerate() {
            let first_period_index = periods.len();
            let mut position_in_window_us = -window.position_in_first_period_us;
            for (uid, duration_us) in window.periods {
                periods.push(Period {
                    uid,
                    window_index,
                    duration_us,
                    position_in_window_us,
                });
                position_in_window_us += duration_us.unwrap_or(0);
            }
            built_windows.push(Window {
                is_seekable: true,
                is_dynamic: window.is_dynamic,
                is_placeholder: window.is_placeholder,
                default_position_us: window.default_position_us,
                duration_us: window.duration_us,
                first_period_index,
                last_period_index: periods.len().saturating_sub(1).max(first_period_index),
                position_in_first_period_us: window.position_in_first_period_us,
            });
        }
        Self {
            windows: built_windows,
            periods,
        }
    }

    /// One window per `(name, duration)` pair, each with a single period.
    pub fn playlist(items: &[(&str, Option<i64>)]) -> Self {
        Self::new(
            items
                .iter()
                .map(|(name, duration_us)| FakeWindow::single(PeriodUid::name(*name), *duration_us))
                .collect(),
        )
    }
}

impl Timeline for FakeTimeline {
    fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn window(&self, index: usize) -> Window {
        self.windows[index].clone()
    }

    fn period_count(&self) -> usize {
        self.periods.len()
    }

    fn period(&self, index: usize) -> Period {
        self.periods[index].clone()
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        self.periods.iter().position(|period| &period.uid == uid)
    }
}
