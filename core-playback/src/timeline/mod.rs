//! # Timeline Model
//!
//! A timeline is an ordered list of windows, each made of one or more
//! periods. The queue walks it to decide which period to buffer next.
//!
//! ## Overview
//!
//! - [`Window`]: a user-facing span of playable content
//! - [`Period`]: a contiguous, independently loadable segment inside a window
//! - [`RepeatMode`]: how traversal continues past the last period of a window
//! - [`SinglePeriodTimeline`]: one window containing one period
//! - [`ConcatenatedTimeline`]: several child timelines presented as one window

mod concatenated;

pub use concatenated::{ConcatenatedTimeline, ConcatenationChild};

use crate::period_id::PeriodUid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How playback continues when it reaches the end of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last window.
    #[default]
    Off,
    /// Repeat the current window forever.
    One,
    /// Wrap around to the first window after the last.
    All,
}

/// A user-facing span of playable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub is_seekable: bool,
    pub is_dynamic: bool,
    /// The window stands in for content whose real structure is not known yet.
    pub is_placeholder: bool,
    /// Default start position, relative to the window.
    pub default_position_us: i64,
    pub duration_us: Option<i64>,
    pub first_period_index: usize,
    pub last_period_index: usize,
    /// Position of the window start inside its first period.
    pub position_in_first_period_us: i64,
}

/// A contiguous, independently loadable segment of a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub uid: PeriodUid,
    pub window_index: usize,
    pub duration_us: Option<i64>,
    /// Position of the period start inside its window. Negative when the
    /// window starts part way into the period.
    pub position_in_window_us: i64,
}

/// An immutable snapshot of the structure of the media being played.
pub trait Timeline: Send + Sync + fmt::Debug {
    fn window_count(&self) -> usize;

    /// Panics if `index >= window_count()`.
    fn window(&self, index: usize) -> Window;

    fn period_count(&self) -> usize;

    /// Panics if `index >= period_count()`.
    fn period(&self, index: usize) -> Period;

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize>;

    fn uid_of_period(&self, index: usize) -> PeriodUid {
        self.period(index).uid
    }

    fn period_by_uid(&self, uid: &PeriodUid) -> Option<Period> {
        self.index_of_period(uid).map(|index| self.period(index))
    }

    fn is_empty(&self) -> bool {
        self.window_count() == 0
    }

    /// Index of the window played after `window_index`, if any.
    fn next_window_index(&self, window_index: usize, repeat_mode: RepeatMode) -> Option<usize> {
        match repeat_mode {
            RepeatMode::One => Some(window_index),
            RepeatMode::Off => {
                let next = window_index + 1;
                (next < self.window_count()).then_some(next)
            }
            RepeatMode::All => {
                let next = window_index + 1;
                Some(if next < self.window_count() { next } else { 0 })
            }
        }
    }

    /// Index of the period played after `period_index`, if any.
    fn next_period_index(&self, period_index: usize, repeat_mode: RepeatMode) -> Option<usize> {
        let window_index = self.period(period_index).window_index;
        let window = self.window(window_index);
        if period_index < window.last_period_index {
            return Some(period_index + 1);
        }
        let next_window = self.next_window_index(window_index, repeat_mode)?;
        Some(self.window(next_window).first_period_index)
    }

    /// Resolves a window position to `(period index, position in period)`.
    ///
    /// Returns `None` if the window has an unknown duration and the position
    /// lies beyond it, or if `window_index` is out of range.
    fn period_position(&self, window_index: usize, window_position_us: i64) -> Option<(usize, i64)> {
        if window_index >= self.window_count() {
            return None;
        }
        let window = self.window(window_index);
        if let Some(duration) = window.duration_us {
            if window_position_us > duration {
                return None;
            }
        }
        let mut period_index = window.first_period_index;
        let mut period_position_us = window_position_us + window.position_in_first_period_us;
        while period_index < window.last_period_index {
            match self.period(period_index).duration_us {
                Some(duration) if period_position_us >= duration => {
                    period_position_us -= duration;
                    period_index += 1;
                }
                _ => break,
            }
        }
        Some((period_index, period_position_us))
    }

    /// Resolves the default position of `window_index`.
    fn default_period_position(&self, window_index: usize) -> Option<(usize, i64)> {
        if window_index >= self.window_count() {
            return None;
        }
        let window = self.window(window_index);
        self.period_position(window_index, window.default_position_us)
    }
}

/// A timeline with a single window containing a single period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePeriodTimeline {
    uid: PeriodUid,
    duration_us: Option<i64>,
    default_position_us: i64,
    is_seekable: bool,
    is_dynamic: bool,
    is_placeholder: bool,
}

impl SinglePeriodTimeline {
    pub fn new(uid: PeriodUid, duration_us: Option<i64>) -> Self {
        Self {
            uid,
            duration_us,
            default_position_us: 0,
            is_seekable: true,
            is_dynamic: false,
            is_placeholder: false,
        }
    }

    /// A timeline standing in for a source that has not reported its
    /// structure yet.
    pub fn placeholder(uid: PeriodUid) -> Self {
        Self {
            is_seekable: false,
            is_dynamic: true,
            is_placeholder: true,
            ..Self::new(uid, None)
        }
    }

    pub fn with_default_position_us(mut self, default_position_us: i64) -> Self {
        self.default_position_us = default_position_us;
        self
    }

    pub fn with_dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = is_dynamic;
        self
    }
}

impl Timeline for SinglePeriodTimeline {
    fn window_count(&self) -> usize {
        1
    }

    fn window(&self, index: usize) -> Window {
        assert_eq!(index, 0, "window index out of range");
        Window {
            is_seekable: self.is_seekable,
            is_dynamic: self.is_dynamic,
            is_placeholder: self.is_placeholder,
            default_position_us: self.default_position_us,
            duration_us: self.duration_us,
            first_period_index: 0,
            last_period_index: 0,
            position_in_first_period_us: 0,
        }
    }

    fn period_count(&self) -> usize {
        1
    }

    fn period(&self, index: usize) -> Period {
        assert_eq!(index, 0, "period index out of range");
        Period {
            uid: self.uid.clone(),
            window_index: 0,
            duration_us: self.duration_us,
            position_in_window_us: 0,
        }
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        (uid == &self.uid).then_some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_period_lookup() {
        let timeline = SinglePeriodTimeline::new(PeriodUid::name("a"), Some(10_000_000));
        assert_eq!(timeline.index_of_period(&PeriodUid::name("a")), Some(0));
        assert_eq!(timeline.index_of_period(&PeriodUid::name("b")), None);
        assert_eq!(
            timeline.period_by_uid(&PeriodUid::name("a")).and_then(|p| p.duration_us),
            Some(10_000_000)
        );
        assert!(!timeline.is_empty());
    }

    #[test]
    fn test_next_period_respects_repeat_mode() {
        let timeline = SinglePeriodTimeline::new(PeriodUid::Id(1), Some(1_000));
        assert_eq!(timeline.next_period_index(0, RepeatMode::Off), None);
        assert_eq!(timeline.next_period_index(0, RepeatMode::One), Some(0));
        assert_eq!(timeline.next_period_index(0, RepeatMode::All), Some(0));
    }

    #[test]
    fn test_default_position() {
        let timeline = SinglePeriodTimeline::new(PeriodUid::Id(1), Some(10_000_000))
            .with_default_position_us(2_000_000);
        assert_eq!(timeline.default_period_position(0), Some((0, 2_000_000)));
        assert_eq!(timeline.period_position(0, 11_000_000), None);
        assert_eq!(timeline.default_period_position(1), None);
    }

    #[test]
    fn test_placeholder_window() {
        let timeline = SinglePeriodTimeline::placeholder(PeriodUid::Id(1));
        let window = timeline.window(0);
        assert!(window.is_placeholder);
        assert_eq!(window.duration_us, None);
        assert_eq!(timeline.period_position(0, 50_000_000), Some((0, 50_000_000)));
    }
}
