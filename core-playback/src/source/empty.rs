//! Placeholder streams and periods.

use crate::error::{PlaybackError, Result};
use crate::time::LoadPosition;
use crate::traits::{LoadingInfo, MediaPeriod, MediaPeriodCallback, SampleStream};
use crate::track_selection::{TrackGroupArray, TrackSelection};
use std::sync::Arc;

/// A stream with no samples, handed to enabled renderers that consume no media.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySampleStream;

impl SampleStream for EmptySampleStream {
    fn is_ready(&self) -> bool {
        true
    }

    fn maybe_throw_error(&self) -> Result<()> {
        Ok(())
    }
}

/// Stands in for a period the source failed to create.
///
/// It never prepares; the creation error is reported through
/// `maybe_throw_prepare_error` so it takes the regular loading-error path.
#[derive(Debug)]
pub struct UnavailableMediaPeriod {
    reason: String,
}

impl UnavailableMediaPeriod {
    pub fn new(error: &PlaybackError) -> Self {
        Self {
            reason: error.to_string(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl MediaPeriod for UnavailableMediaPeriod {
    fn prepare(&mut self, _callback: Arc<dyn MediaPeriodCallback>, _position_us: i64) {}

    fn maybe_throw_prepare_error(&self) -> Result<()> {
        Err(PlaybackError::SourceError(self.reason.clone()))
    }

    fn track_groups(&self) -> TrackGroupArray {
        TrackGroupArray::empty()
    }

    fn select_tracks(
        &mut self,
        _selections: &[Option<Arc<dyn TrackSelection>>],
        _may_retain: &[bool],
        streams: &mut [Option<Box<dyn SampleStream>>],
        _reset_flags: &mut [bool],
        position_us: i64,
    ) -> i64 {
        streams.iter_mut().for_each(|stream| *stream = None);
        position_us
    }

    fn buffered_position_us(&self) -> LoadPosition {
        LoadPosition::EndOfSource
    }

    fn next_load_position_us(&self) -> LoadPosition {
        LoadPosition::EndOfSource
    }

    fn continue_loading(&mut self, _loading_info: &LoadingInfo) -> bool {
        false
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn reevaluate_buffer(&mut self, _position_us: i64) {}
}
