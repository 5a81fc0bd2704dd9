//! Time representation shared by the queue, holders and period adapters.
//!
//! All positions are microseconds in an `i64`. "Unset" values (unknown
//! duration, no clipping end) are `Option<i64>`; the end-of-source marker for
//! buffered and load positions is [`LoadPosition::EndOfSource`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Renderer time at which the first holder of a fresh queue starts.
///
/// Large enough that seeking backwards never produces negative renderer time.
pub const INITIAL_RENDERER_POSITION_OFFSET_US: i64 = 1_000_000_000_000;

/// A buffered or next-load position reported by a media period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadPosition {
    /// Position in microseconds, relative to the reporting period.
    At(i64),
    /// Everything up to the end of the source has been loaded.
    EndOfSource,
}

impl LoadPosition {
    pub fn is_end_of_source(self) -> bool {
        matches!(self, LoadPosition::EndOfSource)
    }

    /// Returns the position, or `None` at end of source.
    pub fn position_us(self) -> Option<i64> {
        match self {
            LoadPosition::At(us) => Some(us),
            LoadPosition::EndOfSource => None,
        }
    }

    /// Shifts a concrete position by `offset_us`; end of source is preserved.
    pub fn offset_by(self, offset_us: i64) -> Self {
        match self {
            LoadPosition::At(us) => LoadPosition::At(us + offset_us),
            LoadPosition::EndOfSource => LoadPosition::EndOfSource,
        }
    }
}

pub fn ms_to_us(ms: i64) -> i64 {
    ms.saturating_mul(1000)
}

pub fn us_to_ms(us: i64) -> i64 {
    us / 1000
}

/// Converts a [`Duration`] to microseconds, saturating at `i64::MAX`.
pub fn duration_to_us(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}
