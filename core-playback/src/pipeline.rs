//! # Playback Pipeline
//!
//! Single-writer driver around a [`MediaPeriodQueue`].
//!
//! ## Overview
//!
//! The pipeline owns the queue, the media source, the current timeline and
//! the receiving end of the playback message channel. Periods and sources
//! report progress from their own threads; [`PlaybackPipeline::do_some_work`]
//! drains those reports and applies them in order on the calling thread:
//!
//! 1. prepared periods select and apply their tracks
//! 2. a refreshed timeline re-resolves the queued holders
//! 3. the lookahead is extended while the loading holder is fully buffered
//! 4. the loading holder continues loading up to the configured buffer
//! 5. the reading and playing pointers advance
//! 6. a loading error of the loading holder is returned to the caller
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut pipeline = PlaybackPipeline::new(renderers, track_selector, source, QueueConfig::default())?;
//! pipeline.prepare()?;
//! loop {
//!     pipeline.do_some_work(renderer_clock.position_us())?;
//! }
//! ```

use crate::allocator::DefaultAllocator;
use crate::config::QueueConfig;
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, QueueEvent, Receiver};
use crate::holder::MediaPeriodHolderFactory;
use crate::queue::MediaPeriodQueue;
use crate::scheduler::{channel, PlaybackMessage, PlaybackReceiver, PlaybackSender};
use crate::time::LoadPosition;
use crate::timeline::{RepeatMode, Timeline};
use crate::traits::{LoadingInfo, MediaSource, RendererCapabilities, TrackSelector};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

pub struct PlaybackPipeline {
    queue: MediaPeriodQueue,
    source: Arc<dyn MediaSource>,
    sender: PlaybackSender,
    receiver: PlaybackReceiver,
    events: EventBus,
    config: QueueConfig,
    timeline: Option<Arc<dyn Timeline>>,
    playback_speed: f32,
    play_when_ready: bool,
    start_window_index: usize,
    start_position_us: Option<i64>,
    renderer_reset_required: bool,
}

impl PlaybackPipeline {
    pub fn new(
        renderers: Vec<Arc<dyn RendererCapabilities>>,
        track_selector: Arc<dyn TrackSelector>,
        source: Arc<dyn MediaSource>,
        config: QueueConfig,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let allocator = DefaultAllocator::new(config.individual_allocation_size);
        let factory = MediaPeriodHolderFactory::new(
            renderers,
            track_selector,
            Arc::clone(&source),
            allocator,
            config.target_preload_buffer_us(),
        );
        let (sender, receiver) = channel();
        let events = EventBus::new(config.event_buffer_size);
        let queue = MediaPeriodQueue::new(factory, config.clone(), sender.clone(), events.clone());

        Ok(Self {
            queue,
            source,
            sender,
            receiver,
            events,
            config,
            timeline: None,
            playback_speed: 1.0,
            play_when_ready: false,
            start_window_index: 0,
            start_position_us: None,
            renderer_reset_required: false,
        })
    }

    pub fn queue(&self) -> &MediaPeriodQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MediaPeriodQueue {
        &mut self.queue
    }

    pub fn timeline(&self) -> Option<&Arc<dyn Timeline>> {
        self.timeline.as_ref()
    }

    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// A sender that posts onto this pipeline's message channel.
    pub fn sender(&self) -> PlaybackSender {
        self.sender.clone()
    }

    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    pub fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    /// Returns and clears whether the reading holder was invalidated since
    /// the last call. Renderers must then be reset.
    pub fn take_renderer_reset_required(&mut self) -> bool {
        std::mem::take(&mut self.renderer_reset_required)
    }

    /// Starts the source. The timeline may arrive later as a refresh message.
    #[instrument(skip(self))]
    pub fn prepare(&mut self) -> Result<()> {
        self.source.prepare_source(Arc::new(self.sender.clone()))?;
        self.timeline = self.source.timeline();
        info!(
            has_timeline = self.timeline.is_some(),
            "Playback pipeline prepared"
        );
        Ok(())
    }

    /// Restarts the queue at `position_us` in window `window_index`, or at the
    /// window's default position.
    pub fn seek_to(&mut self, window_index: usize, position_us: Option<i64>) {
        info!(window_index, ?position_us, "Seeking");
        self.queue.clear();
        self.start_window_index = window_index;
        self.start_position_us = position_us;
        self.renderer_reset_required = true;
    }

    /// Runs one cycle of queue maintenance at `renderer_position_us`.
    #[instrument(skip(self), level = "debug")]
    pub fn do_some_work(&mut self, renderer_position_us: i64) -> Result<()> {
        self.handle_messages(renderer_position_us)?;

        let Some(timeline) = self.timeline.clone() else {
            return Ok(());
        };
        if timeline.is_empty() {
            return Ok(());
        }

        self.maybe_update_loading_period(timeline.as_ref())?;
        self.maybe_continue_loading(renderer_position_us);
        self.maybe_continue_preloading();
        self.maybe_advance_reading_period();
        self.maybe_advance_playing_period(renderer_position_us);
        self.maybe_throw_loading_error()
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Applies every queued message. The first failure is returned after the
    /// whole batch, including a pending timeline refresh, has been applied.
    fn handle_messages(&mut self, renderer_position_us: i64) -> Result<()> {
        let mut first_error = None;
        let mut source_info_refreshed = false;
        for message in self.receiver.drain() {
            match message {
                PlaybackMessage::PeriodPrepared(holder) => {
                    let Some(timeline) = self.timeline.clone() else {
                        warn!(%holder, "Period prepared without a timeline");
                        continue;
                    };
                    if let Err(err) = self.queue.handle_prepared(
                        holder,
                        self.playback_speed,
                        timeline.as_ref(),
                        self.play_when_ready,
                    ) {
                        warn!(%holder, error = %err, "Prepared period rejected");
                        first_error.get_or_insert(err);
                    }
                }
                PlaybackMessage::ContinueLoadingRequested(holder) => {
                    trace!(%holder, "Continue loading requested");
                }
                PlaybackMessage::SourceInfoRefreshed => source_info_refreshed = true,
            }
        }
        if source_info_refreshed {
            if let Err(err) = self.handle_source_info_refreshed(renderer_position_us) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn handle_source_info_refreshed(&mut self, renderer_position_us: i64) -> Result<()> {
        let Some(timeline) = self.source.handle_source_info_refresh()? else {
            debug!("Source refreshed without a timeline");
            return Ok(());
        };

        let max_read_position_us = self.max_renderer_read_position_us();
        if !self.queue.is_empty()
            && !self.queue.update_queued_periods(
                timeline.as_ref(),
                renderer_position_us,
                max_read_position_us,
            )
        {
            warn!("Reading period changed by timeline update");
            self.renderer_reset_required = true;
        }

        info!(
            windows = timeline.window_count(),
            periods = timeline.period_count(),
            "Timeline updated"
        );
        self.timeline = Some(timeline);
        Ok(())
    }

    /// How far renderers have read into the reading holder, in renderer time.
    ///
    /// Renderers consume the reading holder up to its buffered position.
    fn max_renderer_read_position_us(&self) -> LoadPosition {
        let Some(reading) = self.queue.reading() else {
            return LoadPosition::At(0);
        };
        if reading.is_fully_buffered() {
            return LoadPosition::EndOfSource;
        }
        match reading.buffered_position_us() {
            Some(position_us) => LoadPosition::At(reading.to_renderer_time(position_us)),
            None => LoadPosition::EndOfSource,
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    fn maybe_update_loading_period(&mut self, timeline: &dyn Timeline) -> Result<()> {
        if !self.queue.should_load_next_media_period() {
            return Ok(());
        }
        let info = if self.queue.is_empty() {
            let start = match self.start_position_us {
                Some(position_us) => timeline.period_position(self.start_window_index, position_us),
                None => timeline.default_period_position(self.start_window_index),
            };
            let Some((period_index, position_us)) = start else {
                warn!(window_index = self.start_window_index, "Start position not in timeline");
                return Ok(());
            };
            let period_uid = timeline.uid_of_period(period_index);
            Some(self.queue.first_media_period_info(timeline, &period_uid, position_us)?)
        } else {
            self.queue.next_media_period_info(timeline)
        };

        if let Some(info) = info {
            self.queue.enqueue_next_media_period_holder(info)?;
        }
        Ok(())
    }

    fn maybe_continue_loading(&mut self, renderer_position_us: i64) {
        let max_buffer_us = self.config.max_buffer_us();
        let playback_speed = self.playback_speed;
        let Some(loading) = self.queue.loading_mut() else {
            return;
        };
        if loading.next_load_position_us().is_end_of_source() {
            return;
        }
        let Some(buffered_position_us) = loading.buffered_position_us() else {
            return;
        };
        let buffered_ahead_us = loading.to_renderer_time(buffered_position_us) - renderer_position_us;
        if buffered_ahead_us < max_buffer_us {
            loading.continue_loading(&LoadingInfo::new(renderer_position_us, playback_speed));
        } else {
            loading.reevaluate_buffer(renderer_position_us);
        }
    }

    fn maybe_continue_preloading(&mut self) {
        let playback_speed = self.playback_speed;
        for holder in self.queue.preloaded_mut() {
            if !holder.is_prepared()
                || holder.is_fully_preloaded()
                || holder.next_load_position_us().is_end_of_source()
            {
                continue;
            }
            let position_us = holder.start_position_renderer_time();
            holder.continue_loading(&LoadingInfo::new(position_us, playback_speed));
        }
    }

    // ========================================================================
    // Advancing
    // ========================================================================

    /// Renderers move on once the reading holder is fully buffered and its
    /// successor is prepared.
    fn maybe_advance_reading_period(&mut self) {
        let Some(reading) = self.queue.reading() else {
            return;
        };
        let Some(next) = reading.next() else {
            return;
        };
        if !reading.is_fully_buffered() || !self.queue.get(next).is_some_and(|h| h.is_prepared()) {
            return;
        }
        let id = self.queue.advance_reading_period();
        if let Some(holder) = self.queue.get_mut(id) {
            holder.set_all_renderers_in_correct_state(true);
        }
    }

    fn maybe_advance_playing_period(&mut self, renderer_position_us: i64) {
        while self.play_when_ready {
            let Some(playing) = self.queue.playing() else {
                return;
            };
            let Some(next_id) = playing.next() else {
                return;
            };
            if self.queue.reading().map(|reading| reading.id()) == Some(playing.id()) {
                return;
            }
            let Some(next) = self.queue.get(next_id) else {
                return;
            };
            if !next.all_renderers_in_correct_state()
                || renderer_position_us < next.start_position_renderer_time()
            {
                return;
            }
            self.queue.advance_playing_period();
        }
    }

    fn maybe_throw_loading_error(&self) -> Result<()> {
        let Some(loading) = self.queue.loading() else {
            return Ok(());
        };
        let Some(err) = loading.loading_error() else {
            return Ok(());
        };
        let period = loading.info().id.to_string();
        error!(period = %period, error = %err, "Loading period failed");
        self.events
            .emit(QueueEvent::LoadingError {
                period: period.clone(),
                message: err.to_string(),
            })
            .ok();
        Err(PlaybackError::LoadingFailed {
            period,
            reason: err.to_string(),
        })
    }

    // ========================================================================
    // Playback Parameters
    // ========================================================================

    pub fn set_playback_speed(&mut self, playback_speed: f32) {
        self.playback_speed = playback_speed;
        for holder in self.queue.holders() {
            for selection in holder.track_selector_result().active_selections() {
                selection.on_playback_speed(playback_speed);
            }
        }
    }

    pub fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.play_when_ready = play_when_ready;
        for holder in self.queue.holders() {
            for selection in holder.track_selector_result().active_selections() {
                selection.on_play_when_ready_changed(play_when_ready);
            }
        }
    }

    pub fn set_repeat_mode(&mut self, repeat_mode: RepeatMode) {
        debug!(?repeat_mode, "Repeat mode changed");
        if !self.queue.set_repeat_mode(self.timeline.as_deref(), repeat_mode) {
            self.renderer_reset_required = true;
        }
    }

    /// Releases every holder and the source.
    #[instrument(skip(self))]
    pub fn release(&mut self) {
        self.queue.clear();
        self.queue.invalidate_preload_pool();
        self.source.release_source();
        self.timeline = None;
        info!("Playback pipeline released");
    }
}
