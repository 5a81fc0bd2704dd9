//! # Media Period Queue
//!
//! The ordered lookahead of [`MediaPeriodHolder`]s, from the playing holder at
//! the front to the loading holder at the back.
//!
//! ## Overview
//!
//! ```text
//!   front                                       back
//!  [playing] -> [reading] -> ... -> [loading]
//!      ^            ^                    ^
//!  rendered     renderers read      being buffered
//! ```
//!
//! - Holders live in a `VecDeque`; each holder's `next` link mirrors its
//!   successor's id and the back holder is the only one with no successor.
//! - A new holder's renderer offset is the previous tail's offset plus its
//!   duration (or the configured placeholder duration), minus the new start.
//! - Timeline refreshes and repeat-mode changes keep every holder whose id and
//!   start position still match and release the rest.
//! - A preload pool holds holders prepared ahead of time; enqueueing a
//!   matching info moves a pooled holder into the queue instead of creating a
//!   new one.
//!
//! The queue is owned by the playback thread and is not `Sync`.

use crate::config::QueueConfig;
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, QueueEvent};
use crate::holder::{are_durations_compatible, HolderId, MediaPeriodHolder, MediaPeriodHolderFactory};
use crate::period_id::{MediaPeriodId, MediaPeriodInfo, PeriodUid};
use crate::scheduler::PlaybackSender;
use crate::time::LoadPosition;
use crate::timeline::{RepeatMode, Timeline};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

pub struct MediaPeriodQueue {
    factory: MediaPeriodHolderFactory,
    config: QueueConfig,
    sender: PlaybackSender,
    events: EventBus,
    holders: VecDeque<MediaPeriodHolder>,
    /// Index into `holders`; meaningful while the queue is non-empty.
    reading_index: usize,
    preload_pool: Vec<MediaPeriodHolder>,
    repeat_mode: RepeatMode,
    next_window_sequence_number: u64,
    old_front_period_uid: Option<PeriodUid>,
    old_front_window_sequence_number: u64,
}

impl MediaPeriodQueue {
    pub fn new(
        factory: MediaPeriodHolderFactory,
        config: QueueConfig,
        sender: PlaybackSender,
        events: EventBus,
    ) -> Self {
        Self {
            factory,
            config,
            sender,
            events,
            holders: VecDeque::new(),
            reading_index: 0,
            preload_pool: Vec::new(),
            repeat_mode: RepeatMode::Off,
            next_window_sequence_number: 0,
            old_front_period_uid: None,
            old_front_window_sequence_number: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Holders from playing to loading.
    pub fn holders(&self) -> impl Iterator<Item = &MediaPeriodHolder> {
        self.holders.iter()
    }

    pub fn playing(&self) -> Option<&MediaPeriodHolder> {
        self.holders.front()
    }

    pub fn playing_mut(&mut self) -> Option<&mut MediaPeriodHolder> {
        self.holders.front_mut()
    }

    pub fn reading(&self) -> Option<&MediaPeriodHolder> {
        self.holders.get(self.reading_index)
    }

    pub fn reading_mut(&mut self) -> Option<&mut MediaPeriodHolder> {
        self.holders.get_mut(self.reading_index)
    }

    pub fn loading(&self) -> Option<&MediaPeriodHolder> {
        self.holders.back()
    }

    pub fn loading_mut(&mut self) -> Option<&mut MediaPeriodHolder> {
        self.holders.back_mut()
    }

    /// Whether `id` is the loading holder.
    pub fn is_loading(&self, id: HolderId) -> bool {
        self.holders.back().is_some_and(|holder| holder.id() == id)
    }

    /// Looks `id` up in the queue, then in the preload pool.
    pub fn get(&self, id: HolderId) -> Option<&MediaPeriodHolder> {
        self.holders
            .iter()
            .chain(self.preload_pool.iter())
            .find(|holder| holder.id() == id)
    }

    pub fn get_mut(&mut self, id: HolderId) -> Option<&mut MediaPeriodHolder> {
        if let Some(index) = self.index_of(id) {
            return self.holders.get_mut(index);
        }
        self.preload_pool.iter_mut().find(|holder| holder.id() == id)
    }

    pub fn preloaded(&self) -> impl Iterator<Item = &MediaPeriodHolder> {
        self.preload_pool.iter()
    }

    pub fn preloaded_mut(&mut self) -> impl Iterator<Item = &mut MediaPeriodHolder> {
        self.preload_pool.iter_mut()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn index_of(&self, id: HolderId) -> Option<usize> {
        self.holders.iter().position(|holder| holder.id() == id)
    }

    fn emit(&self, event: QueueEvent) {
        self.events.emit(event).ok();
    }

    // ========================================================================
    // Extending the Queue
    // ========================================================================

    /// Whether the loading holder is done and another one may follow it.
    pub fn should_load_next_media_period(&self) -> bool {
        let Some(loading) = self.holders.back() else {
            return true;
        };
        !loading.info().is_final
            && loading.is_fully_buffered()
            && (loading.info().duration_us.is_some()
                || self.config.placeholder_period_duration.is_some())
            && self.holders.len() < self.config.max_buffer_ahead_periods
    }

    /// Appends a holder for `info` as the new loading holder and starts
    /// preparing it.
    ///
    /// A pooled holder that already matches `info` is reused.
    pub fn enqueue_next_media_period_holder(&mut self, info: MediaPeriodInfo) -> Result<HolderId> {
        if self.holders.len() >= self.config.max_buffer_ahead_periods {
            return Err(PlaybackError::QueueFull(self.holders.len()));
        }
        let renderer_offset_us = match self.holders.back() {
            None => self.config.initial_renderer_position_offset_us,
            Some(loading) => {
                let duration_us = loading
                    .info()
                    .duration_us
                    .or_else(|| self.config.placeholder_period_duration_us())
                    .ok_or_else(|| PlaybackError::UnknownPeriodDuration(loading.info().id.to_string()))?;
                loading.renderer_offset() + duration_us - info.start_position_us
            }
        };

        let period = info.id.to_string();
        let start_position_us = info.start_position_us;
        let mut holder = match self.take_preloaded(&info) {
            Some(mut holder) => {
                holder.set_info(info);
                holder.set_renderer_offset(renderer_offset_us);
                self.emit(QueueEvent::PreloadReused {
                    holder: holder.id(),
                    period: period.clone(),
                });
                holder
            }
            None => self.factory.create(info, renderer_offset_us),
        };
        let id = holder.id();

        if let Some(loading) = self.holders.back_mut() {
            loading.set_next(Some(id));
        }
        if !holder.is_prepare_called() {
            holder.prepare(&self.sender, start_position_us);
        }
        self.holders.push_back(holder);
        self.old_front_period_uid = None;

        debug!(
            holder = %id,
            period = %period,
            renderer_offset_us,
            start_position_us,
            queue_len = self.holders.len(),
            "Enqueued media period"
        );
        self.emit(QueueEvent::PeriodEnqueued {
            holder: id,
            period,
            renderer_offset_us,
            start_position_us,
        });
        Ok(id)
    }

    /// Completes preparation of a queued or preloaded holder.
    ///
    /// Returns `false` if no such holder exists any more.
    pub fn handle_prepared(
        &mut self,
        id: HolderId,
        playback_speed: f32,
        timeline: &dyn Timeline,
        play_when_ready: bool,
    ) -> Result<bool> {
        let Some(holder) = self.get_mut(id) else {
            debug!(holder = %id, "Ignoring prepared notification of released holder");
            return Ok(false);
        };
        holder.handle_prepared(playback_speed, timeline, play_when_ready)?;
        let event = QueueEvent::PeriodPrepared {
            holder: id,
            period: holder.info().id.to_string(),
            start_position_us: holder.info().start_position_us,
        };
        self.emit(event);

        if self.holders.front().is_some_and(|playing| playing.id() == id) {
            self.activate_playing_selection();
        }
        Ok(true)
    }

    fn activate_playing_selection(&self) {
        if let Some(playing) = self.holders.front().filter(|holder| holder.is_prepared()) {
            self.factory
                .track_selector()
                .on_selection_activated(playing.track_selector_result());
        }
    }

    // ========================================================================
    // Advancing
    // ========================================================================

    /// Moves the reading pointer to the next holder.
    ///
    /// # Panics
    ///
    /// Panics if the reading holder has no successor.
    pub fn advance_reading_period(&mut self) -> HolderId {
        let next_index = self.reading_index + 1;
        assert!(
            next_index < self.holders.len(),
            "advance_reading_period without a holder after the reading holder"
        );
        self.reading_index = next_index;
        let reading = &self.holders[next_index];
        let id = reading.id();
        debug!(holder = %id, period = %reading.info().id, "Reading period advanced");
        self.emit(QueueEvent::ReadingAdvanced {
            holder: id,
            period: reading.info().id.to_string(),
        });
        id
    }

    /// Releases the playing holder and returns the new playing holder, if any.
    pub fn advance_playing_period(&mut self) -> Option<HolderId> {
        let playing = self.holders.pop_front()?;
        self.reading_index = self.reading_index.saturating_sub(1);
        if self.holders.is_empty() {
            self.old_front_period_uid = Some(playing.uid().clone());
            self.old_front_window_sequence_number = playing.info().id.window_sequence_number;
        }
        playing.release();

        let next = self.holders.front()?;
        let id = next.id();
        info!(holder = %id, period = %next.info().id, "Playing period advanced");
        self.emit(QueueEvent::PlayingAdvanced {
            holder: id,
            period: next.info().id.to_string(),
        });
        self.activate_playing_selection();
        Some(id)
    }

    // ========================================================================
    // Trimming
    // ========================================================================

    /// Releases every holder after `id`, making `id` the loading holder.
    ///
    /// Returns `true` if the reading holder was among the removed ones; the
    /// reading pointer then falls back to the playing holder.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the queue.
    pub fn remove_after(&mut self, id: HolderId) -> bool {
        let Some(index) = self.index_of(id) else {
            panic!("remove_after: {} is not in the queue", id);
        };
        if index + 1 == self.holders.len() {
            return false;
        }

        let removed_reading = self.reading_index > index;
        let removed: Vec<MediaPeriodHolder> = self.holders.drain(index + 1..).collect();
        let count = removed.len();
        for holder in removed {
            holder.release();
        }
        if removed_reading {
            self.reading_index = 0;
        }
        self.holders[index].set_next(None);

        debug!(after = %id, count, removed_reading, "Removed queued periods");
        self.emit(QueueEvent::PeriodsRemoved { count });
        removed_reading
    }

    /// Releases every holder.
    pub fn clear(&mut self) {
        let Some(front) = self.holders.front() else {
            return;
        };
        self.old_front_period_uid = Some(front.uid().clone());
        self.old_front_window_sequence_number = front.info().id.window_sequence_number;
        let count = self.holders.len();
        for holder in self.holders.drain(..) {
            holder.release();
        }
        self.reading_index = 0;
        info!(count, "Media period queue cleared");
        self.emit(QueueEvent::QueueCleared);
    }

    /// Lets the loading holder discard media it no longer needs.
    pub fn reevaluate_buffer(&mut self, renderer_position_us: i64) {
        if let Some(loading) = self.holders.back_mut() {
            loading.reevaluate_buffer(renderer_position_us);
        }
    }

    // ========================================================================
    // Timeline Resolution
    // ========================================================================

    /// Info for the first period to play, starting at `start_position_us`.
    pub fn first_media_period_info(
        &mut self,
        timeline: &dyn Timeline,
        period_uid: &PeriodUid,
        start_position_us: i64,
    ) -> Result<MediaPeriodInfo> {
        let period_index = timeline
            .index_of_period(period_uid)
            .ok_or_else(|| PlaybackError::PeriodNotInTimeline(period_uid.to_string()))?;
        let id = self.resolve_media_period_id(timeline, period_uid);
        Ok(self.content_info(timeline, period_index, id, start_position_us, None))
    }

    /// Info for the period following the loading holder, or `None` if the
    /// queue is empty or the timeline ends there.
    pub fn next_media_period_info(&mut self, timeline: &dyn Timeline) -> Option<MediaPeriodInfo> {
        let last = self.holders.len().checked_sub(1)?;
        self.following_media_period_info(timeline, last)
    }

    /// Identifies an occurrence of `period_uid`, reusing the window sequence
    /// number of a queued holder from the same window.
    pub fn resolve_media_period_id(
        &mut self,
        timeline: &dyn Timeline,
        period_uid: &PeriodUid,
    ) -> MediaPeriodId {
        let window_sequence_number = self.resolve_window_sequence_number(timeline, period_uid);
        MediaPeriodId::new(period_uid.clone(), window_sequence_number)
    }

    fn resolve_window_sequence_number(&mut self, timeline: &dyn Timeline, period_uid: &PeriodUid) -> u64 {
        let window_index = timeline.period_by_uid(period_uid).map(|period| period.window_index);
        let window_of = |uid: &PeriodUid| timeline.period_by_uid(uid).map(|period| period.window_index);

        if let Some(old_front) = &self.old_front_period_uid {
            if window_index.is_some() && window_of(old_front) == window_index {
                return self.old_front_window_sequence_number;
            }
        }
        if let Some(holder) = self.holders.iter().find(|holder| holder.uid() == period_uid) {
            return holder.info().id.window_sequence_number;
        }
        if window_index.is_some() {
            if let Some(holder) = self
                .holders
                .iter()
                .chain(self.preload_pool.iter())
                .find(|holder| window_of(holder.uid()) == window_index)
            {
                return holder.info().id.window_sequence_number;
            }
        }
        let window_sequence_number = self.take_window_sequence_number();
        if self.holders.is_empty() {
            // Stays the front candidate until a holder is enqueued.
            self.old_front_period_uid = Some(period_uid.clone());
            self.old_front_window_sequence_number = window_sequence_number;
        }
        window_sequence_number
    }

    fn take_window_sequence_number(&mut self) -> u64 {
        let window_sequence_number = self.next_window_sequence_number;
        self.next_window_sequence_number += 1;
        window_sequence_number
    }

    /// Info for the period after the holder at `index`.
    fn following_media_period_info(
        &mut self,
        timeline: &dyn Timeline,
        index: usize,
    ) -> Option<MediaPeriodInfo> {
        let current = self.holders[index].info().id.clone();
        let current_index = timeline.index_of_period(&current.period_uid)?;
        let next_index = timeline.next_period_index(current_index, self.repeat_mode)?;
        let next_window_index = timeline.period(next_index).window_index;

        if timeline.window(next_window_index).first_period_index != next_index {
            // Same window: the occurrence continues.
            let id = MediaPeriodId::new(
                timeline.uid_of_period(next_index),
                current.window_sequence_number,
            );
            return Some(self.content_info(timeline, next_index, id, 0, Some(0)));
        }

        // A new window starts at its default position.
        let (period_index, start_position_us) = timeline.default_period_position(next_window_index)?;
        let period_uid = timeline.uid_of_period(period_index);
        let queued = self
            .holders
            .get(index + 1)
            .filter(|holder| holder.uid() == &period_uid)
            .map(|holder| holder.info().id.window_sequence_number);
        let pooled = || {
            self.preload_pool
                .iter()
                .find(|holder| holder.uid() == &period_uid)
                .map(|holder| holder.info().id.window_sequence_number)
        };
        let window_sequence_number = match queued.or_else(pooled) {
            Some(window_sequence_number) => window_sequence_number,
            None => self.take_window_sequence_number(),
        };
        let id = MediaPeriodId::new(period_uid, window_sequence_number);
        Some(self.content_info(timeline, period_index, id, start_position_us, None))
    }

    fn content_info(
        &self,
        timeline: &dyn Timeline,
        period_index: usize,
        id: MediaPeriodId,
        start_position_us: i64,
        requested_content_position_us: Option<i64>,
    ) -> MediaPeriodInfo {
        let duration_us = timeline.period(period_index).duration_us;
        let mut start_position_us = start_position_us;
        if let Some(duration_us) = duration_us {
            if start_position_us >= duration_us {
                start_position_us = (duration_us - 1).max(0);
            }
        }
        let mut info = MediaPeriodInfo::new(id, start_position_us, duration_us);
        info.requested_content_position_us = requested_content_position_us;
        info.is_last_in_timeline_window = is_last_in_window(timeline, period_index);
        info.is_final = self.is_last_in_timeline(timeline, period_index);
        info
    }

    /// Recomputes the timeline-derived fields of `info`, keeping its id and start.
    fn updated_media_period_info(
        &self,
        timeline: &dyn Timeline,
        info: &MediaPeriodInfo,
    ) -> Option<MediaPeriodInfo> {
        let period_index = timeline.index_of_period(&info.id.period_uid)?;
        let period = timeline.period(period_index);
        Some(MediaPeriodInfo {
            duration_us: info.end_position_us.or(period.duration_us),
            is_last_in_timeline_window: is_last_in_window(timeline, period_index),
            is_final: self.is_last_in_timeline(timeline, period_index),
            ..info.clone()
        })
    }

    fn is_last_in_timeline(&self, timeline: &dyn Timeline, period_index: usize) -> bool {
        let window = timeline.window(timeline.period(period_index).window_index);
        !window.is_dynamic && timeline.next_period_index(period_index, self.repeat_mode).is_none()
    }

    // ========================================================================
    // Timeline & Playback Mode Changes
    // ========================================================================

    /// Re-resolves every queued holder against a new timeline.
    ///
    /// Holders are kept while their id and start position still match; the
    /// first mismatch and everything after it are released. Returns `false`
    /// if the reading holder was released, or was already read past a
    /// shortened duration. Renderers must then be reset.
    pub fn update_queued_periods(
        &mut self,
        timeline: &dyn Timeline,
        renderer_position_us: i64,
        max_renderer_read_position_us: LoadPosition,
    ) -> bool {
        let mut index = 0;
        while index < self.holders.len() {
            let old_info = self.holders[index].info().clone();
            let new_info = if index == 0 {
                match self.updated_media_period_info(timeline, &old_info) {
                    Some(info) => info,
                    None => {
                        warn!(
                            period = %old_info.id,
                            renderer_position_us,
                            "Playing period left the timeline"
                        );
                        self.clear();
                        return false;
                    }
                }
            } else {
                match self.following_media_period_info(timeline, index - 1) {
                    Some(info) if can_keep_media_period_holder(&old_info, &info) => info,
                    _ => {
                        let previous = self.holders[index - 1].id();
                        return !self.remove_after(previous);
                    }
                }
            };

            let holder = &mut self.holders[index];
            holder.set_info(
                new_info.copy_with_requested_content_position_us(old_info.requested_content_position_us),
            );
            if !are_durations_compatible(old_info.duration_us, new_info.duration_us) {
                holder.update_clipping();
                let new_duration_in_renderer_time =
                    new_info.duration_us.map(|duration_us| holder.to_renderer_time(duration_us));
                let id = holder.id();
                let read_beyond_new_duration = index == self.reading_index
                    && match (max_renderer_read_position_us, new_duration_in_renderer_time) {
                        (LoadPosition::EndOfSource, _) => true,
                        (LoadPosition::At(_), None) => false,
                        (LoadPosition::At(read_us), Some(duration_us)) => read_us >= duration_us,
                    };
                debug!(
                    holder = %id,
                    old_duration_us = ?old_info.duration_us,
                    new_duration_us = ?new_info.duration_us,
                    "Queued period duration changed"
                );
                let removed_reading = self.remove_after(id);
                return !removed_reading && !read_beyond_new_duration;
            }
            index += 1;
        }
        true
    }

    /// Switches the repeat mode and trims holders that no longer follow the
    /// new period order.
    ///
    /// Returns `false` if the reading holder was released. Without a timeline
    /// the queue is empty and only the mode is stored.
    pub fn set_repeat_mode(&mut self, timeline: Option<&dyn Timeline>, repeat_mode: RepeatMode) -> bool {
        self.repeat_mode = repeat_mode;
        match timeline {
            Some(timeline) => self.update_for_playback_mode_change(timeline),
            None => true,
        }
    }

    fn update_for_playback_mode_change(&mut self, timeline: &dyn Timeline) -> bool {
        let Some(playing) = self.holders.front() else {
            return true;
        };
        let Some(mut current_period_index) = timeline.index_of_period(playing.uid()) else {
            return true;
        };

        let mut last_valid = 0;
        loop {
            let next_period_index = timeline.next_period_index(current_period_index, self.repeat_mode);
            while last_valid + 1 < self.holders.len()
                && !self.holders[last_valid].info().is_last_in_timeline_period
            {
                last_valid += 1;
            }
            let (Some(next_period_index), Some(next_holder)) =
                (next_period_index, self.holders.get(last_valid + 1))
            else {
                break;
            };
            if timeline.index_of_period(next_holder.uid()) != Some(next_period_index) {
                break;
            }
            last_valid += 1;
            current_period_index = next_period_index;
        }

        let last_valid_id = self.holders[last_valid].id();
        let removed_reading = self.remove_after(last_valid_id);
        let updated = self.updated_media_period_info(timeline, self.holders[last_valid].info());
        if let Some(info) = updated {
            self.holders[last_valid].set_info(info);
        }
        !removed_reading
    }

    // ========================================================================
    // Preload Pool
    // ========================================================================

    /// Creates and prepares a holder for `info` outside the queue.
    ///
    /// Returns the id of an already pooled holder if one matches.
    pub fn preload(&mut self, info: MediaPeriodInfo) -> HolderId {
        if let Some(holder) = self
            .preload_pool
            .iter()
            .find(|holder| holder.can_be_used_for_media_period_info(&info))
        {
            return holder.id();
        }
        let start_position_us = info.start_position_us;
        let mut holder = self.factory.create(info, 0);
        holder.prepare(&self.sender, start_position_us);
        let id = holder.id();
        debug!(holder = %id, period = %holder.info().id, "Preloading media period");
        self.preload_pool.push(holder);
        id
    }

    /// Releases every pooled holder.
    pub fn invalidate_preload_pool(&mut self) {
        if self.preload_pool.is_empty() {
            return;
        }
        let count = self.preload_pool.len();
        for holder in self.preload_pool.drain(..) {
            holder.release();
        }
        debug!(count, "Preload pool invalidated");
    }

    fn take_preloaded(&mut self, info: &MediaPeriodInfo) -> Option<MediaPeriodHolder> {
        let index = self
            .preload_pool
            .iter()
            .position(|holder| holder.can_be_used_for_media_period_info(info))?;
        Some(self.preload_pool.remove(index))
    }
}

fn is_last_in_window(timeline: &dyn Timeline, period_index: usize) -> bool {
    let window_index = timeline.period(period_index).window_index;
    timeline.window(window_index).last_period_index == period_index
}

fn can_keep_media_period_holder(old_info: &MediaPeriodInfo, new_info: &MediaPeriodInfo) -> bool {
    old_info.start_position_us == new_info.start_position_us && old_info.id == new_info.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::DefaultAllocator;
    use crate::scheduler::{channel, PlaybackReceiver};
    use crate::testing::{FakeMediaSource, FakeRenderer, FakeTimeline, FakeTrackSelector};
    use crate::time::INITIAL_RENDERER_POSITION_OFFSET_US;
    use crate::traits::RendererCapabilities;
    use crate::track_selection::TrackType;
    use std::sync::Arc;
    use std::time::Duration;

    fn queue(config: QueueConfig) -> (MediaPeriodQueue, Arc<FakeMediaSource>, PlaybackReceiver) {
        let source = Arc::new(FakeMediaSource::new(None));
        let renderers: Vec<Arc<dyn RendererCapabilities>> =
            vec![Arc::new(FakeRenderer::new("audio", TrackType::Audio))];
        let factory = MediaPeriodHolderFactory::new(
            renderers,
            Arc::new(FakeTrackSelector::new()),
            source.clone(),
            DefaultAllocator::new(1024),
            config.target_preload_buffer_us(),
        );
        let (sender, receiver) = channel();
        (
            MediaPeriodQueue::new(factory, config, sender, EventBus::default()),
            source,
            receiver,
        )
    }

    fn prepare_fully_buffered(queue: &mut MediaPeriodQueue, source: &FakeMediaSource, id: HolderId, timeline: &dyn Timeline) {
        assert!(queue.handle_prepared(id, 1.0, timeline, true).unwrap());
        source
            .last_created()
            .unwrap()
            .set_buffered_position(LoadPosition::EndOfSource);
    }

    #[test]
    fn test_first_holder_uses_initial_offset() {
        let (mut queue, source, _receiver) = queue(QueueConfig::default());
        let timeline = FakeTimeline::playlist(&[("a", Some(4_000_000)), ("b", Some(6_000_000))]);

        let info = queue
            .first_media_period_info(&timeline, &PeriodUid::name("a"), 0)
            .unwrap();
        let id = queue.enqueue_next_media_period_holder(info).unwrap();

        let holder = queue.get(id).unwrap();
        assert_eq!(holder.renderer_offset(), INITIAL_RENDERER_POSITION_OFFSET_US);
        assert!(holder.is_prepare_called());
        assert_eq!(source.created_positions(), vec![0]);
        assert!(queue.is_loading(id));
    }

    #[test]
    fn test_next_offset_follows_previous_duration() {
        let (mut queue, source, _receiver) = queue(QueueConfig::default());
        let timeline = FakeTimeline::playlist(&[("a", Some(4_000_000)), ("b", Some(6_000_000))]);

        let first = queue
            .first_media_period_info(&timeline, &PeriodUid::name("a"), 0)
            .unwrap();
        let first_id = queue.enqueue_next_media_period_holder(first).unwrap();
        assert!(!queue.should_load_next_media_period());
        prepare_fully_buffered(&mut queue, &source, first_id, &timeline);
        assert!(queue.should_load_next_media_period());

        let next = queue.next_media_period_info(&timeline).unwrap();
        assert_eq!(next.id.period_uid, PeriodUid::name("b"));
        assert_eq!(next.id.window_sequence_number, 1);
        assert!(next.is_final);
        let next_id = queue.enqueue_next_media_period_holder(next).unwrap();

        assert_eq!(
            queue.get(next_id).unwrap().renderer_offset(),
            INITIAL_RENDERER_POSITION_OFFSET_US + 4_000_000
        );
        assert_eq!(queue.get(first_id).unwrap().next(), Some(next_id));
        assert!(!queue.get(first_id).unwrap().is_loading_period());
    }

    #[test]
    fn test_unknown_duration_needs_placeholder() {
        let (mut queue, source, _receiver) = queue(QueueConfig::default());
        let timeline = FakeTimeline::playlist(&[("live", None), ("b", Some(1_000))]);
        let first = queue
            .first_media_period_info(&timeline, &PeriodUid::name("live"), 0)
            .unwrap();
        let id = queue.enqueue_next_media_period_holder(first).unwrap();
        prepare_fully_buffered(&mut queue, &source, id, &timeline);

        assert!(!queue.should_load_next_media_period());
        let next = queue.next_media_period_info(&timeline).unwrap();
        assert!(matches!(
            queue.enqueue_next_media_period_holder(next),
            Err(PlaybackError::UnknownPeriodDuration(_))
        ));
    }

    #[test]
    fn test_placeholder_duration_extends_lookahead() {
        let config = QueueConfig {
            placeholder_period_duration: Some(Duration::from_secs(30)),
            ..QueueConfig::default()
        };
        let (mut queue, source, _receiver) = queue(config);
        let timeline = FakeTimeline::playlist(&[("progressive", None), ("b", Some(1_000))]);
        let first = queue
            .first_media_period_info(&timeline, &PeriodUid::name("progressive"), 0)
            .unwrap();
        let id = queue.enqueue_next_media_period_holder(first).unwrap();
        prepare_fully_buffered(&mut queue, &source, id, &timeline);

        assert!(queue.should_load_next_media_period());
        let next = queue.next_media_period_info(&timeline).unwrap();
        let next_id = queue.enqueue_next_media_period_holder(next).unwrap();
        assert_eq!(
            queue.get(next_id).unwrap().renderer_offset(),
            INITIAL_RENDERER_POSITION_OFFSET_US + 30_000_000
        );
    }

    #[test]
    fn test_queue_cap() {
        let config = QueueConfig {
            max_buffer_ahead_periods: 1,
            ..QueueConfig::default()
        };
        let (mut queue, _source, _receiver) = queue(config);
        let timeline = FakeTimeline::playlist(&[("a", Some(1_000)), ("b", Some(1_000))]);
        let first = queue
            .first_media_period_info(&timeline, &PeriodUid::name("a"), 0)
            .unwrap();
        queue.enqueue_next_media_period_holder(first.clone()).unwrap();
        assert!(matches!(
            queue.enqueue_next_media_period_holder(first),
            Err(PlaybackError::QueueFull(1))
        ));
    }

    #[test]
    #[should_panic(expected = "not in the queue")]
    fn test_remove_after_unknown_holder_panics() {
        let (mut queue, _source, _receiver) = queue(QueueConfig::default());
        queue.remove_after(HolderId(99));
    }

    #[test]
    fn test_start_position_is_clamped_into_period() {
        let (mut queue, _source, _receiver) = queue(QueueConfig::default());
        let timeline = FakeTimeline::playlist(&[("a", Some(1_000))]);
        let info = queue
            .first_media_period_info(&timeline, &PeriodUid::name("a"), 5_000)
            .unwrap();
        assert_eq!(info.start_position_us, 999);
        assert!(info.is_final);
        assert!(info.is_last_in_timeline_window);
        assert!(queue
            .first_media_period_info(&timeline, &PeriodUid::name("zzz"), 0)
            .is_err());
    }
}
