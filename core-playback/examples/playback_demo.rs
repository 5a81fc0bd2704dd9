//! # Playback Pipeline Example
//!
//! Drives a [`PlaybackPipeline`] over a two-item concatenation built from the
//! fake collaborators in `core_playback::testing`, advancing a simulated
//! renderer clock and printing the queue after every cycle.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use core_playback::testing::{FakeMediaSource, FakeRenderer, FakeTrackSelector};
use core_playback::{
    ConcatenatingMediaSource, LoadPosition, PlaybackPipeline, QueueConfig, QueueEvent,
    RendererCapabilities, Result, TrackType, INITIAL_RENDERER_POSITION_OFFSET_US,
};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::sync::Arc;

const STEP_US: i64 = 1_000_000;

fn main() -> Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )
    .ok();

    let intro = Arc::new(FakeMediaSource::single("intro", Some(3_000_000)).with_auto_prepare(true));
    let episode =
        Arc::new(FakeMediaSource::single("episode", Some(5_000_000)).with_auto_prepare(true));
    let source = ConcatenatingMediaSource::builder()
        .add(intro.clone())
        .add(episode.clone())
        .build()?;

    let renderers: Vec<Arc<dyn RendererCapabilities>> = vec![
        Arc::new(FakeRenderer::new("audio", TrackType::Audio)),
        Arc::new(FakeRenderer::new("video", TrackType::Video)),
    ];
    let mut pipeline = PlaybackPipeline::new(
        renderers,
        Arc::new(FakeTrackSelector::new()),
        Arc::new(source),
        QueueConfig::default(),
    )?;
    let mut events = pipeline.subscribe();
    pipeline.prepare()?;
    pipeline.set_play_when_ready(true);

    let mut position_us = INITIAL_RENDERER_POSITION_OFFSET_US;
    for _ in 0..10 {
        pipeline.do_some_work(position_us)?;

        // Fake loaders finish instantly once a period is prepared.
        for child in [&intro, &episode] {
            if let Some(period) = child.last_created() {
                period.set_buffered_position(LoadPosition::EndOfSource);
            }
        }

        let queue: Vec<String> = pipeline
            .queue()
            .holders()
            .map(|holder| format!("{}@{}", holder.uid(), holder.renderer_offset()))
            .collect();
        println!("t={:>10}us queue=[{}]", position_us, queue.join(", "));

        while let Ok(event) = events.try_recv() {
            if let QueueEvent::PlayingAdvanced { period, .. } = &event {
                println!("  now playing {}", period);
            }
        }
        if pipeline.queue().playing().is_some_and(|playing| playing.next().is_none())
            && position_us >= INITIAL_RENDERER_POSITION_OFFSET_US + 8_000_000
        {
            break;
        }
        position_us += STEP_US;
    }

    pipeline.release();
    Ok(())
}
