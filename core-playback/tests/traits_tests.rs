//! Collaborator trait seams: default methods and selector callbacks.

use core_playback::allocator::DefaultAllocator;
use core_playback::config::QueueConfig;
use core_playback::error::{PlaybackError, Result};
use core_playback::events::EventBus;
use core_playback::holder::MediaPeriodHolderFactory;
use core_playback::period_id::{MediaPeriodId, PeriodUid};
use core_playback::queue::MediaPeriodQueue;
use core_playback::scheduler::channel;
use core_playback::testing::{FakeMediaPeriod, FakeMediaSource, FakeRenderer, FakeTimeline};
use core_playback::time::LoadPosition;
use core_playback::timeline::Timeline;
use core_playback::track_selection::{
    FixedTrackSelection, RendererConfiguration, TrackGroupArray, TrackSelection,
    TrackSelectorResult, TrackType,
};
use core_playback::traits::{
    LoadingInfo, MediaPeriod, MediaSource, RendererCapabilities, TrackSelector,
};
use mockall::mock;
use std::sync::Arc;

mock! {
    Selector {}

    impl TrackSelector for Selector {
        fn select_tracks(
            &self,
            renderers: &[Arc<dyn RendererCapabilities>],
            track_groups: &TrackGroupArray,
            period_id: &MediaPeriodId,
            timeline: &dyn Timeline,
        ) -> Result<TrackSelectorResult>;

        fn on_selection_activated(&self, result: &TrackSelectorResult);
    }
}

/// Selects the first track of the first group for every renderer.
fn first_group_everywhere(
    renderers: &[Arc<dyn RendererCapabilities>],
    track_groups: &TrackGroupArray,
) -> Result<TrackSelectorResult> {
    let group = track_groups
        .get(0)
        .cloned()
        .ok_or_else(|| PlaybackError::TrackSelectionFailed("no groups".to_string()))?;
    Ok(TrackSelectorResult::new(
        vec![Some(RendererConfiguration::default()); renderers.len()],
        renderers
            .iter()
            .map(|_| {
                Some(Arc::new(FixedTrackSelection::new(group.clone(), vec![0]))
                    as Arc<dyn TrackSelection>)
            })
            .collect(),
    ))
}

fn queue_with(selector: MockSelector, source: Arc<FakeMediaSource>) -> MediaPeriodQueue {
    let renderers: Vec<Arc<dyn RendererCapabilities>> =
        vec![Arc::new(FakeRenderer::new("audio", TrackType::Audio))];
    let factory = MediaPeriodHolderFactory::new(
        renderers,
        Arc::new(selector),
        source,
        DefaultAllocator::new(1024),
        0,
    );
    let (sender, _receiver) = channel();
    MediaPeriodQueue::new(factory, QueueConfig::default(), sender, EventBus::default())
}

#[test]
fn test_selection_activated_for_playing_holder_only() {
    let mut selector = MockSelector::new();
    selector
        .expect_select_tracks()
        .times(2)
        .returning(|renderers, track_groups, _, _| first_group_everywhere(renderers, track_groups));
    selector
        .expect_on_selection_activated()
        .times(2)
        .return_const(());

    let source = Arc::new(FakeMediaSource::new(None));
    let mut queue = queue_with(selector, source.clone());
    let timeline = FakeTimeline::playlist(&[("a", Some(1_000_000)), ("b", Some(1_000_000))]);

    let first = queue
        .first_media_period_info(&timeline, &PeriodUid::name("a"), 0)
        .unwrap();
    let a = queue.enqueue_next_media_period_holder(first).unwrap();
    assert!(queue.handle_prepared(a, 1.0, &timeline, true).unwrap());
    source
        .last_created()
        .unwrap()
        .set_buffered_position(LoadPosition::EndOfSource);

    // Preparing a holder behind the playing one does not activate it.
    let next = queue.next_media_period_info(&timeline).unwrap();
    let b = queue.enqueue_next_media_period_holder(next).unwrap();
    assert!(queue.handle_prepared(b, 1.0, &timeline, true).unwrap());

    queue.advance_reading_period();
    assert_eq!(queue.advance_playing_period(), Some(b));
}

#[test]
fn test_selector_failure_reaches_caller() {
    let mut selector = MockSelector::new();
    selector.expect_select_tracks().times(1).returning(|_, _, _, _| {
        Err(PlaybackError::TrackSelectionFailed(
            "renderer cannot play any group".to_string(),
        ))
    });
    selector.expect_on_selection_activated().never();

    let mut queue = queue_with(selector, Arc::new(FakeMediaSource::new(None)));
    let timeline = FakeTimeline::playlist(&[("a", Some(1_000_000))]);
    let info = queue
        .first_media_period_info(&timeline, &PeriodUid::name("a"), 0)
        .unwrap();
    let id = queue.enqueue_next_media_period_holder(info).unwrap();

    let err = queue.handle_prepared(id, 1.0, &timeline, true).unwrap_err();
    assert!(matches!(err, PlaybackError::TrackSelectionFailed(_)));
}

#[test]
fn test_source_defaults() {
    let source = FakeMediaSource::single("a", Some(1_000_000));
    let refreshed = source.handle_source_info_refresh().unwrap().unwrap();
    assert_eq!(refreshed.uid_of_period(0), PeriodUid::name("a"));
    assert!(!source.requires_placeholder_duration());
}

#[test]
fn test_period_downcast_through_any() {
    let period: Box<dyn MediaPeriod> = Box::new(FakeMediaPeriod::new());
    assert!((*period).as_any().downcast_ref::<FakeMediaPeriod>().is_some());
    assert!(period.into_any().downcast::<FakeMediaPeriod>().is_ok());
}

#[test]
fn test_loading_info_position_override() {
    let info = LoadingInfo::new(5_000_000, 1.5);
    let shifted = info.with_playback_position_us(1_000_000);
    assert_eq!(shifted.playback_position_us, 1_000_000);
    assert_eq!(shifted.playback_speed, 1.5);
    assert_eq!(info.playback_position_us, 5_000_000);
}
