//! Presents several child timelines as one window.
//!
//! Every period of every child window becomes a period of the single
//! synthesized window. Global period uids are [`PeriodUid::Child`] composites
//! of the child index and the child-local uid.

use super::{Period, Timeline, Window};
use crate::error::{PlaybackError, Result};
use crate::period_id::PeriodUid;
use std::collections::HashMap;
use std::sync::Arc;

/// One child of a concatenation.
#[derive(Debug, Clone)]
pub struct ConcatenationChild {
    pub timeline: Arc<dyn Timeline>,
    /// Window duration to assume while the child's real duration is unknown.
    pub placeholder_duration_us: Option<i64>,
}

impl ConcatenationChild {
    pub fn new(timeline: Arc<dyn Timeline>, placeholder_duration_us: Option<i64>) -> Self {
        Self {
            timeline,
            placeholder_duration_us,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcatenatedTimeline {
    timelines: Vec<Arc<dyn Timeline>>,
    first_period_indices: Vec<usize>,
    period_offsets_in_window_us: Vec<i64>,
    period_time_offsets: Vec<HashMap<PeriodUid, i64>>,
    is_seekable: bool,
    is_dynamic: bool,
    duration_us: i64,
    default_position_us: i64,
}

impl ConcatenatedTimeline {
    /// Builds the concatenation of `children`.
    ///
    /// Returns `Ok(None)` while a child window has an unknown duration and no
    /// placeholder. Fails for an empty child timeline, or when a window with
    /// several periods contains a period of unknown duration.
    pub fn try_build(children: &[ConcatenationChild]) -> Result<Option<Self>> {
        if children.is_empty() {
            return Err(PlaybackError::InvalidTimeline(
                "can't concatenate zero timelines".to_string(),
            ));
        }

        let mut timelines = Vec::with_capacity(children.len());
        let mut first_period_indices = Vec::with_capacity(children.len());
        let mut period_offsets_in_window_us = Vec::new();
        let mut period_time_offsets = Vec::with_capacity(children.len());
        let mut period_count = 0;
        let mut is_seekable = true;
        let mut is_dynamic = false;
        let mut duration_us: i64 = 0;
        let mut default_position_us = 0;
        let mut next_period_offset_in_window_us: i64 = 0;

        for (child_index, child) in children.iter().enumerate() {
            let timeline = &child.timeline;
            if timeline.is_empty() {
                return Err(PlaybackError::InvalidTimeline(format!(
                    "can't concatenate empty child timeline {}",
                    child_index
                )));
            }
            timelines.push(Arc::clone(timeline));
            first_period_indices.push(period_count);
            period_count += timeline.period_count();

            let mut time_offsets = HashMap::new();
            for window_index in 0..timeline.window_count() {
                let window = timeline.window(window_index);
                let Some(window_duration_us) =
                    window.duration_us.or(child.placeholder_duration_us)
                else {
                    return Ok(None);
                };
                duration_us += window_duration_us;

                let is_first_window = child_index == 0 && window_index == 0;
                if is_first_window {
                    default_position_us = window.default_position_us;
                    next_period_offset_in_window_us = -window.position_in_first_period_us;
                }
                // Placeholder windows must not block seeking in the others.
                is_seekable &= window.is_seekable || window.is_placeholder;
                is_dynamic |= window.is_dynamic;

                for period_index in window.first_period_index..=window.last_period_index {
                    period_offsets_in_window_us.push(next_period_offset_in_window_us);
                    let period = timeline.period(period_index);
                    let mut period_duration_us = match period.duration_us {
                        Some(duration) => duration,
                        None => {
                            if window.first_period_index != window.last_period_index {
                                return Err(PlaybackError::InvalidTimeline(
                                    "can't apply placeholder duration to multiple periods \
                                     with unknown duration in a single window"
                                        .to_string(),
                                ));
                            }
                            window_duration_us + window.position_in_first_period_us
                        }
                    };

                    let mut time_offset_us = 0;
                    if period_index == window.first_period_index && !is_first_window {
                        time_offset_us = -window.position_in_first_period_us;
                        period_duration_us += time_offset_us;
                    }
                    time_offsets.insert(period.uid, time_offset_us);
                    next_period_offset_in_window_us += period_duration_us;
                }
            }
            period_time_offsets.push(time_offsets);
        }

        Ok(Some(Self {
            timelines,
            first_period_indices,
            period_offsets_in_window_us,
            period_time_offsets,
            is_seekable,
            is_dynamic,
            duration_us,
            default_position_us,
        }))
    }

    pub fn child_count(&self) -> usize {
        self.timelines.len()
    }

    /// Start of every global period inside the synthesized window.
    pub fn period_offsets_in_window_us(&self) -> &[i64] {
        &self.period_offsets_in_window_us
    }

    /// Time offsets of the periods of child `child_index`, keyed by child-local uid.
    ///
    /// A child period time `t` is `t + offset` in the concatenated period.
    pub fn period_time_offsets(&self, child_index: usize) -> &HashMap<PeriodUid, i64> {
        &self.period_time_offsets[child_index]
    }

    /// Child owning the global `period_index`.
    pub fn child_index_by_period_index(&self, period_index: usize) -> usize {
        self.first_period_indices
            .partition_point(|&first| first <= period_index)
            .saturating_sub(1)
    }

    fn synthesized_duration_us(&self, child_period: &Period, period_index: usize) -> Option<i64> {
        // Unknown durations stay unknown; known ones are forced to meet the next period.
        if child_period.duration_us.is_none() {
            return None;
        }
        let start_us = self.period_offsets_in_window_us[period_index];
        let end_us = self
            .period_offsets_in_window_us
            .get(period_index + 1)
            .copied()
            .unwrap_or(self.duration_us);
        Some(end_us - start_us)
    }
}

impl Timeline for ConcatenatedTimeline {
    fn window_count(&self) -> usize {
        1
    }

    fn window(&self, index: usize) -> Window {
        assert_eq!(index, 0, "window index out of range");
        Window {
            is_seekable: self.is_seekable,
            is_dynamic: self.is_dynamic,
            is_placeholder: false,
            default_position_us: self.default_position_us,
            duration_us: Some(self.duration_us),
            first_period_index: 0,
            last_period_index: self.period_count() - 1,
            position_in_first_period_us: -self.period_offsets_in_window_us[0],
        }
    }

    fn period_count(&self) -> usize {
        self.period_offsets_in_window_us.len()
    }

    fn period(&self, index: usize) -> Period {
        let child_index = self.child_index_by_period_index(index);
        let child_period =
            self.timelines[child_index].period(index - self.first_period_indices[child_index]);
        Period {
            duration_us: self.synthesized_duration_us(&child_period, index),
            uid: PeriodUid::child(child_index, child_period.uid),
            window_index: 0,
            position_in_window_us: self.period_offsets_in_window_us[index],
        }
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        let child = uid.as_child()?;
        let timeline = self.timelines.get(child.child_index)?;
        let index_in_child = timeline.index_of_period(&child.uid)?;
        Some(self.first_period_indices[child.child_index] + index_in_child)
    }

    fn uid_of_period(&self, index: usize) -> PeriodUid {
        let child_index = self.child_index_by_period_index(index);
        let uid = self.timelines[child_index]
            .uid_of_period(index - self.first_period_indices[child_index]);
        PeriodUid::child(child_index, uid)
    }
}
