//! Media period holder behavior against fake collaborators.

use core_playback::allocator::DefaultAllocator;
use core_playback::holder::{HolderId, MediaPeriodHolder};
use core_playback::period_id::{MediaPeriodId, MediaPeriodInfo, PeriodUid};
use core_playback::scheduler::{channel, PlaybackMessage};
use core_playback::testing::{FakeMediaSource, FakeRenderer, FakeTimeline, FakeTrackSelector};
use core_playback::time::{LoadPosition, INITIAL_RENDERER_POSITION_OFFSET_US};
use core_playback::traits::RendererCapabilities;
use core_playback::track_selection::TrackType;
use core_playback::PlaybackError;
use std::sync::Arc;

struct Fixture {
    source: Arc<FakeMediaSource>,
    selector: Arc<FakeTrackSelector>,
    timeline: FakeTimeline,
    renderers: Vec<Arc<dyn RendererCapabilities>>,
}

impl Fixture {
    fn new(track_types: &[TrackType]) -> Self {
        Self {
            source: Arc::new(FakeMediaSource::single("a", Some(10_000_000))),
            selector: Arc::new(FakeTrackSelector::new()),
            timeline: FakeTimeline::playlist(&[("a", Some(10_000_000))]),
            renderers: track_types
                .iter()
                .enumerate()
                .map(|(index, track_type)| {
                    Arc::new(FakeRenderer::new(format!("renderer-{}", index), *track_type))
                        as Arc<dyn RendererCapabilities>
                })
                .collect(),
        }
    }

    fn holder(&self, info: MediaPeriodInfo) -> MediaPeriodHolder {
        MediaPeriodHolder::new(
            HolderId(1),
            self.renderers.clone().into(),
            INITIAL_RENDERER_POSITION_OFFSET_US,
            self.selector.clone(),
            &DefaultAllocator::new(1024),
            self.source.clone(),
            info,
            2_000_000,
        )
    }

    fn prepared_holder(&self, info: MediaPeriodInfo) -> MediaPeriodHolder {
        let (sender, _receiver) = channel();
        let mut holder = self.holder(info.clone());
        holder.prepare(&sender, info.start_position_us);
        holder.handle_prepared(1.0, &self.timeline, true).unwrap();
        holder
    }
}

fn info(start_position_us: i64, duration_us: Option<i64>) -> MediaPeriodInfo {
    MediaPeriodInfo::new(
        MediaPeriodId::new(PeriodUid::name("a"), 0),
        start_position_us,
        duration_us,
    )
}

#[test]
fn test_renderer_time_round_trip() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.holder(info(0, Some(10_000_000)));

    for offset in [0, 4_000_000, -250_000, INITIAL_RENDERER_POSITION_OFFSET_US] {
        holder.set_renderer_offset(offset);
        for t in [0, 1, 5_000_000, -3, i64::from(i32::MAX)] {
            assert_eq!(holder.to_period_time(holder.to_renderer_time(t)), t);
        }
    }
}

#[test]
fn test_prepared_at_requested_start_keeps_offset() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let (sender, mut receiver) = channel();
    let mut holder = fixture.holder(info(5_000_000, None));

    assert_eq!(holder.buffered_position_us(), Some(5_000_000));
    holder.prepare(&sender, 5_000_000);
    fixture.source.last_created().unwrap().signal_prepared();
    assert_eq!(
        receiver.drain(),
        vec![PlaybackMessage::PeriodPrepared(HolderId(1))]
    );

    holder.handle_prepared(1.0, &fixture.timeline, true).unwrap();

    assert!(holder.is_prepared());
    assert!(holder.has_enabled_tracks());
    assert_eq!(holder.renderer_offset(), INITIAL_RENDERER_POSITION_OFFSET_US);
    assert_eq!(holder.info().start_position_us, 5_000_000);
    assert_eq!(holder.buffered_position_us(), Some(5_000_000));
    assert_eq!(
        holder.start_position_renderer_time(),
        INITIAL_RENDERER_POSITION_OFFSET_US + 5_000_000
    );
}

#[test]
fn test_actual_start_rebases_offset() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let (sender, _receiver) = channel();
    let mut holder = fixture.holder(info(5_000_000, Some(10_000_000)));
    holder.prepare(&sender, 5_000_000);
    let period = fixture.source.last_created().unwrap();
    period.state().lock().actual_start_override = Some(4_000_000);

    holder.handle_prepared(1.0, &fixture.timeline, true).unwrap();

    assert_eq!(holder.info().start_position_us, 4_000_000);
    assert_eq!(
        holder.renderer_offset(),
        INITIAL_RENDERER_POSITION_OFFSET_US + 1_000_000
    );
    // The renderer position of the start does not move.
    assert_eq!(
        holder.start_position_renderer_time(),
        INITIAL_RENDERER_POSITION_OFFSET_US + 5_000_000
    );
}

#[test]
fn test_start_at_duration_is_pulled_back() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let holder = fixture.prepared_holder(info(10_000_000, Some(10_000_000)));
    let period = fixture.source.last_created().unwrap();

    assert_eq!(period.state().lock().last_select_position_us, Some(9_999_999));
    assert_eq!(holder.info().start_position_us, 9_999_999);
}

#[test]
fn test_fully_buffered_implies_fully_preloaded() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let period = fixture.source.last_created().unwrap();

    assert!(!holder.is_fully_buffered());
    assert!(!holder.is_fully_preloaded());

    period.set_buffered_position(LoadPosition::At(2_000_000));
    assert!(!holder.is_fully_buffered());
    assert!(holder.is_fully_preloaded());

    period.set_buffered_position(LoadPosition::EndOfSource);
    assert!(holder.is_fully_buffered());
    assert!(holder.is_fully_preloaded());
    assert_eq!(holder.buffered_position_us(), Some(10_000_000));
}

#[test]
fn test_streams_follow_enabled_renderers() {
    let track_types = [
        TrackType::Audio,
        TrackType::Video,
        TrackType::Text,
        TrackType::None,
    ];
    let fixture = Fixture::new(&track_types);
    let holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let result = holder.track_selector_result();

    for (index, track_type) in track_types.iter().enumerate() {
        let has_stream = holder.stream(index).is_some();
        assert_eq!(has_stream, result.is_renderer_enabled(index), "renderer {}", index);
        if !track_type.is_none() {
            assert_eq!(has_stream, result.selection(index).is_some());
        }
    }
    assert!(!result.is_renderer_enabled(2));
    assert!(holder.has_enabled_tracks());
}

#[test]
fn test_no_sample_renderer_gets_empty_stream() {
    let fixture = Fixture::new(&[TrackType::None]);
    let holder = fixture.prepared_holder(info(0, Some(10_000_000)));

    let stream = holder.stream(0).expect("synthetic stream");
    assert!(stream.is_ready());
    assert!(stream.maybe_throw_error().is_ok());
    assert!(!holder.has_enabled_tracks());
    assert!(holder.is_fully_buffered());
    assert_eq!(
        fixture.source.last_created().unwrap().state().lock().streams_created,
        0
    );
}

#[test]
fn test_set_next_toggles_selections_only_on_change() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let selection = fixture.selector.selections()[0].clone();
    assert_eq!((selection.enable_count(), selection.disable_count()), (1, 0));

    holder.set_next(None);
    assert_eq!((selection.enable_count(), selection.disable_count()), (1, 0));
    assert!(holder.is_loading_period());

    holder.set_next(Some(HolderId(2)));
    holder.set_next(Some(HolderId(2)));
    assert_eq!((selection.enable_count(), selection.disable_count()), (1, 1));
    assert!(!holder.is_loading_period());
    assert_eq!(holder.next(), Some(HolderId(2)));

    holder.set_next(None);
    assert_eq!((selection.enable_count(), selection.disable_count()), (2, 1));
    assert!(selection.is_enabled());
}

#[test]
fn test_selections_receive_playback_parameters() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let (sender, _receiver) = channel();
    let mut holder = fixture.holder(info(0, Some(10_000_000)));
    holder.prepare(&sender, 0);
    holder.handle_prepared(1.5, &fixture.timeline, false).unwrap();

    let selection = fixture.selector.selections()[0].clone();
    assert_eq!(selection.last_playback_speed(), Some(1.5));
    assert_eq!(selection.last_play_when_ready(), Some(false));
}

#[test]
fn test_equivalent_selection_retains_streams() {
    let fixture = Fixture::new(&[TrackType::Audio, TrackType::Video]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let period = fixture.source.last_created().unwrap();
    assert_eq!(period.state().lock().streams_created, 2);

    let result = holder.select_tracks(1.0, &fixture.timeline, true).unwrap();
    let mut reset_flags = vec![false; 2];
    let position = holder.apply_track_selection(result, 3_000_000, false, &mut reset_flags);
    assert_eq!(position, 3_000_000);
    assert_eq!(reset_flags, vec![false, false]);
    assert_eq!(period.state().lock().streams_created, 2);

    let result = holder.select_tracks(1.0, &fixture.timeline, true).unwrap();
    let mut reset_flags = vec![false; 2];
    holder.apply_track_selection(result, 3_000_000, true, &mut reset_flags);
    assert_eq!(reset_flags, vec![true, true]);
    assert_eq!(period.state().lock().streams_created, 4);
}

#[test]
fn test_replaced_selection_is_disabled() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));

    let result = holder.select_tracks(1.0, &fixture.timeline, true).unwrap();
    holder.apply_track_selection(result, 0, false, &mut [false]);

    let selections = fixture.selector.selections();
    assert_eq!(selections.len(), 2);
    assert!(!selections[0].is_enabled());
    assert!(selections[1].is_enabled());
}

#[test]
fn test_prepare_and_stream_errors_are_reported() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let (sender, _receiver) = channel();
    let mut holder = fixture.holder(info(0, Some(10_000_000)));
    holder.prepare(&sender, 0);
    let period = fixture.source.last_created().unwrap();
    assert!(!holder.has_loading_error());

    period.set_prepare_error("manifest 404");
    assert!(matches!(
        holder.loading_error(),
        Some(PlaybackError::SourceError(message)) if message == "manifest 404"
    ));

    period.state().lock().prepare_error = None;
    holder.handle_prepared(1.0, &fixture.timeline, true).unwrap();
    assert!(!holder.has_loading_error());

    period.set_stream_error("corrupt frame");
    assert!(matches!(
        holder.loading_error(),
        Some(PlaybackError::StreamError(message)) if message == "corrupt frame"
    ));
}

#[test]
fn test_track_selection_failure_is_returned() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    fixture.selector.fail_with("no decoder");
    let mut holder = fixture.holder(info(0, Some(10_000_000)));

    let result = holder.handle_prepared(1.0, &fixture.timeline, true);
    assert!(matches!(result, Err(PlaybackError::TrackSelectionFailed(_))));
}

#[test]
#[should_panic(expected = "handle_prepared called twice")]
fn test_second_handle_prepared_panics() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    holder.handle_prepared(1.0, &fixture.timeline, true).ok();
}

#[test]
#[should_panic(expected = "reevaluate_buffer on non-loading")]
fn test_reevaluate_requires_loading_holder() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    holder.set_next(Some(HolderId(2)));
    holder.reevaluate_buffer(0);
}

#[test]
fn test_loading_calls_use_period_time() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let period = fixture.source.last_created().unwrap();

    let renderer_position = INITIAL_RENDERER_POSITION_OFFSET_US + 1_500_000;
    holder.continue_loading(&core_playback::LoadingInfo::new(renderer_position, 1.0));
    holder.reevaluate_buffer(renderer_position);

    let state = period.state();
    let state = state.lock();
    assert_eq!(state.last_loading_position_us, Some(1_500_000));
    assert_eq!(state.last_reevaluate_position_us, Some(1_500_000));
    assert_eq!(state.continue_loading_calls, 1);
}

#[test]
fn test_unprepared_holder_positions() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let holder = fixture.holder(info(2_000_000, None));

    assert!(!holder.is_fully_buffered());
    assert!(!holder.is_fully_preloaded());
    assert_eq!(holder.next_load_position_us(), LoadPosition::At(0));
    assert_eq!(holder.buffered_position_us(), Some(2_000_000));
}

#[test]
fn test_clipping_follows_info_end() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let mut holder = fixture.prepared_holder(info(0, None).with_end_position_us(2_000_000));
    let period = fixture.source.last_created().unwrap();
    assert!(holder.is_clipped());

    period.set_buffered_position(LoadPosition::At(2_000_000));
    assert!(holder.is_fully_buffered());
    assert_eq!(holder.buffered_position_us(), Some(2_000_000));

    let mut unclipped = holder.info().clone();
    unclipped.end_position_us = None;
    unclipped.duration_us = Some(10_000_000);
    holder.set_info(unclipped);
    holder.update_clipping();
    assert!(!holder.is_fully_buffered());
}

#[test]
fn test_can_be_used_for_matching_info() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let holder = fixture.holder(info(0, None));

    assert!(holder.can_be_used_for_media_period_info(&info(0, Some(10_000_000))));
    assert!(!holder.can_be_used_for_media_period_info(&info(1, None)));
    let mut other_occurrence = info(0, None);
    other_occurrence.id.window_sequence_number = 3;
    assert!(!holder.can_be_used_for_media_period_info(&other_occurrence));
}

#[test]
fn test_release_returns_period_once() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    let holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    let selection = fixture.selector.selections()[0].clone();

    holder.release();

    assert_eq!(fixture.source.released_count(), 1);
    assert!(!selection.is_enabled());
}

#[test]
fn test_release_failure_does_not_propagate() {
    let fixture = Fixture::new(&[TrackType::Audio]);
    fixture.source.fail_releases("source torn down");
    let holder = fixture.prepared_holder(info(0, Some(10_000_000)));
    holder.release();
    assert_eq!(fixture.source.released_count(), 1);
}
