//! Media period adapter that plays only `[start, end]` of the wrapped period.

use crate::error::Result;
use crate::time::LoadPosition;
use crate::traits::{LoadingInfo, MediaPeriod, MediaPeriodCallback, SampleStream};
use crate::track_selection::{TrackGroupArray, TrackSelection};
use std::sync::Arc;

/// Wraps a media period and bounds it to `[start_us, end_us]`.
///
/// Buffered and next-load positions at or past the end are reported as
/// [`LoadPosition::EndOfSource`]. An `end_us` of `None` plays to the natural end.
pub struct ClippingMediaPeriod {
    inner: Box<dyn MediaPeriod>,
    start_us: i64,
    end_us: Option<i64>,
    pending_initial_discontinuity_us: Option<i64>,
}

impl ClippingMediaPeriod {
    /// `enable_initial_discontinuity` makes the first `read_discontinuity`
    /// after track selection report the clip start, so renderers reset.
    pub fn new(
        inner: Box<dyn MediaPeriod>,
        enable_initial_discontinuity: bool,
        start_us: i64,
        end_us: Option<i64>,
    ) -> Self {
        Self {
            inner,
            start_us,
            end_us,
            pending_initial_discontinuity_us: enable_initial_discontinuity.then_some(start_us),
        }
    }

    pub fn start_us(&self) -> i64 {
        self.start_us
    }

    pub fn end_us(&self) -> Option<i64> {
        self.end_us
    }

    /// Moves the clip bounds, e.g. after the timeline reported a new duration.
    pub fn update_clipping(&mut self, start_us: i64, end_us: Option<i64>) {
        self.start_us = start_us;
        self.end_us = end_us;
    }

    /// Unwraps the adapter, returning the period created by the source.
    pub fn into_inner(self) -> Box<dyn MediaPeriod> {
        self.inner
    }

    fn clip(&self, position: LoadPosition) -> LoadPosition {
        match (position, self.end_us) {
            (LoadPosition::At(us), Some(end)) if us >= end => LoadPosition::EndOfSource,
            _ => position,
        }
    }

    fn clamp(&self, position_us: i64) -> i64 {
        let position_us = position_us.max(self.start_us);
        match self.end_us {
            Some(end) => position_us.min(end),
            None => position_us,
        }
    }
}

impl MediaPeriod for ClippingMediaPeriod {
    fn prepare(&mut self, callback: Arc<dyn MediaPeriodCallback>, position_us: i64) {
        self.inner.prepare(callback, position_us);
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
        if self.pending_initial_discontinuity_us.is_some()
            && (position_us != self.start_us || self.start_us == 0)
        {
            self.pending_initial_discontinuity_us = None;
        }
        let enable_position_us =
            self.inner
                .select_tracks(selections, may_retain, streams, reset_flags, position_us);
        self.clamp(enable_position_us)
    }

    fn read_discontinuity(&mut self) -> Option<i64> {
        let inner = self
            .inner
            .read_discontinuity()
            .map(|position_us| self.clamp(position_us));
        match self.pending_initial_discontinuity_us.take() {
            Some(position_us) => inner.or(Some(position_us)),
            None => inner,
        }
    }

    fn buffered_position_us(&self) -> LoadPosition {
        self.clip(self.inner.buffered_position_us())
    }

    fn next_load_position_us(&self) -> LoadPosition {
        self.clip(self.inner.next_load_position_us())
    }

    fn continue_loading(&mut self, loading_info: &LoadingInfo) -> bool {
        self.inner.continue_loading(loading_info)
    }

    fn is_loading(&self) -> bool {
        self.inner.is_loading()
    }

    fn reevaluate_buffer(&mut self, position_us: i64) {
        self.inner.reevaluate_buffer(position_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMediaPeriod;

    #[test]
    fn test_positions_past_end_become_end_of_source() {
        let period = FakeMediaPeriod::new();
        let state = period.state();
        let mut clipped = ClippingMediaPeriod::new(Box::new(period), false, 0, Some(2_000_000));

        state.lock().buffered_position = LoadPosition::At(1_500_000);
        assert_eq!(clipped.buffered_position_us(), LoadPosition::At(1_500_000));

        state.lock().buffered_position = LoadPosition::At(2_000_000);
        assert_eq!(clipped.buffered_position_us(), LoadPosition::EndOfSource);
        assert_eq!(clipped.next_load_position_us(), LoadPosition::EndOfSource);

        clipped.update_clipping(0, None);
        assert_eq!(clipped.buffered_position_us(), LoadPosition::At(2_000_000));
    }

    #[test]
    fn test_initial_discontinuity_only_for_non_zero_start() {
        let mut from_zero =
            ClippingMediaPeriod::new(Box::new(FakeMediaPeriod::new()), true, 0, None);
        from_zero.select_tracks(&[], &[], &mut [], &mut [], 0);
        assert_eq!(from_zero.read_discontinuity(), None);

        let mut from_start =
            ClippingMediaPeriod::new(Box::new(FakeMediaPeriod::new()), true, 1_000, None);
        from_start.select_tracks(&[], &[], &mut [], &mut [], 1_000);
        assert_eq!(from_start.read_discontinuity(), Some(1_000));
        assert_eq!(from_start.read_discontinuity(), None);

        let mut suppressed =
            ClippingMediaPeriod::new(Box::new(FakeMediaPeriod::new()), false, 1_000, None);
        suppressed.select_tracks(&[], &[], &mut [], &mut [], 1_000);
        assert_eq!(suppressed.read_discontinuity(), None);
    }

    #[test]
    fn test_child_discontinuity_wins_over_initial() {
        let period = FakeMediaPeriod::new();
        let state = period.state();
        let mut clipped = ClippingMediaPeriod::new(Box::new(period), true, 1_000, Some(5_000));
        clipped.select_tracks(&[], &[], &mut [], &mut [], 1_000);

        state.lock().discontinuity_us = Some(9_000);
        assert_eq!(clipped.read_discontinuity(), Some(5_000));
        assert_eq!(clipped.read_discontinuity(), None);
    }

    #[test]
    fn test_into_inner_returns_wrapped_period() {
        let clipped = ClippingMediaPeriod::new(Box::new(FakeMediaPeriod::new()), false, 0, Some(10));
        let inner = clipped.into_inner();
        assert!(inner.into_any().downcast::<FakeMediaPeriod>().is_ok());
    }
}
