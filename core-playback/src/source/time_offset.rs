//! Media period adapter that shifts every position by a fixed offset.

use crate::error::Result;
use crate::time::LoadPosition;
use crate::traits::{LoadingInfo, MediaPeriod, MediaPeriodCallback, SampleStream};
use crate::track_selection::{TrackGroupArray, TrackSelection};
use std::sync::Arc;

/// Wraps a child period so that child time `t` is reported as `t + offset_us`.
pub struct TimeOffsetMediaPeriod {
    inner: Box<dyn MediaPeriod>,
    offset_us: i64,
}

impl TimeOffsetMediaPeriod {
    pub fn new(inner: Box<dyn MediaPeriod>, offset_us: i64) -> Self {
        Self { inner, offset_us }
    }

    pub fn offset_us(&self) -> i64 {
        self.offset_us
    }

    pub fn into_inner(self) -> Box<dyn MediaPeriod> {
        self.inner
    }
}

impl MediaPeriod for TimeOffsetMediaPeriod {
    fn prepare(&mut self, callback: Arc<dyn MediaPeriodCallback>, position_us: i64) {
        self.inner.prepare(callback, position_us - self.offset_us);
    }

    fn maybe_throw_prepare_error(&self) -> Result<()> {
        self.inner.maybe_throw_prepare_error()
    }

    fn track_groups(&self) -> TrackGroupArray {
        self.inner.track_groups()
    }

    fn select_tracks(
        &mut self,
        selections: &[Option<Arc<dyn TrackSelection>>],
        may_retain: &[bool],
        streams: &mut [Option<Box<dyn SampleStream>>],
        reset_flags: &mut [bool],
        position_us: i64,
    ) -> i64 {
        self.inner.select_tracks(
            selections,
            may_retain,
            streams,
            reset_flags,
            position_us - self.offset_us,
        ) + self.offset_us
    }

    fn read_discontinuity(&mut self) -> Option<i64> {
        self.inner
            .read_discontinuity()
            .map(|position_us| position_us + self.offset_us)
    }

    fn buffered_position_us(&self) -> LoadPosition {
        self.inner.buffered_position_us().offset_by(self.offset_us)
    }

    fn next_load_position_us(&self) -> LoadPosition {
        self.inner.next_load_position_us().offset_by(self.offset_us)
    }

    fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool {
        let child_info = loading_info
            .with_playback_position_us(loading_info.playback_position_us - self.offset_us);
        self.inner.continue_loading(&child_info)
    }

    fn is_loading(&self) -> bool {
        self.inner.is_loading()
    }

    fn reevaluate_buffer(&mut self, position_us: i64) {
        self.inner.reevaluate_buffer(position_us - self.offset_us);
    }
}
