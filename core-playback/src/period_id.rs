//! # Period Identity
//!
//! Value types naming one occurrence of a timeline period and describing how
//! it should be played.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a timeline period.
///
/// Equality and hashing are structural, including for the composite
/// identities produced by concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUid {
    /// Numeric identity assigned by a source.
    Id(u64),
    /// Named identity assigned by a source.
    Name(String),
    /// Identity of a child period inside a concatenated timeline.
    Child(Box<ChildPeriodUid>),
}

/// Composite identity: the child's position in a concatenation plus the
/// child-local period uid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildPeriodUid {
    pub child_index: usize,
    pub uid: PeriodUid,
}

impl PeriodUid {
    pub fn name(name: impl Into<String>) -> Self {
        PeriodUid::Name(name.into())
    }

    /// Builds the concatenated identity of `uid` in child `child_index`.
    pub fn child(child_index: usize, uid: PeriodUid) -> Self {
        PeriodUid::Child(Box::new(ChildPeriodUid { child_index, uid }))
    }

    /// Returns the composite parts if this is a concatenated identity.
    pub fn as_child(&self) -> Option<&ChildPeriodUid> {
        match self {
            PeriodUid::Child(child) => Some(child),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodUid::Id(id) => write!(f, "#{}", id),
            PeriodUid::Name(name) => f.write_str(name),
            PeriodUid::Child(child) => write!(f, "{}/{}", child.child_index, child.uid),
        }
    }
}

/// Position of an ad within the ad groups of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdPosition {
    pub group_index: usize,
    pub index_in_group: usize,
}

/// Identifies one occurrence of a period.
///
/// The window sequence number disambiguates repeated occurrences of the same
/// period, e.g. when a window loops or the same content is inserted twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaPeriodId {
    pub period_uid: PeriodUid,
    pub ad: Option<AdPosition>,
    pub window_sequence_number: u64,
}

impl MediaPeriodId {
    /// Identifies a content period.
    pub fn new(period_uid: PeriodUid, window_sequence_number: u64) -> Self {
        Self {
            period_uid,
            ad: None,
            window_sequence_number,
        }
    }

    /// Identifies an ad inside a period.
    pub fn new_ad(
        period_uid: PeriodUid,
        group_index: usize,
        index_in_group: usize,
        window_sequence_number: u64,
    ) -> Self {
        Self {
            period_uid,
            ad: Some(AdPosition {
                group_index,
                index_in_group,
            }),
            window_sequence_number,
        }
    }

    pub fn is_ad(&self) -> bool {
        self.ad.is_some()
    }

    pub fn copy_with_period_uid(&self, period_uid: PeriodUid) -> Self {
        Self {
            period_uid,
            ..self.clone()
        }
    }

    pub fn copy_with_window_sequence_number(&self, window_sequence_number: u64) -> Self {
        Self {
            window_sequence_number,
            ..self.clone()
        }
    }
}

impl fmt::Display for MediaPeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.period_uid, self.window_sequence_number)?;
        if let Some(ad) = self.ad {
            write!(f, "[ad {}:{}]", ad.group_index, ad.index_in_group)?;
        }
        Ok(())
    }
}

/// How a period occurrence should be played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPeriodInfo {
    pub id: MediaPeriodId,
    /// Start position relative to the period, in microseconds.
    pub start_position_us: i64,
    /// Content position requested by the user, if different from the start.
    pub requested_content_position_us: Option<i64>,
    /// End position relative to the period; `None` plays to the natural end.
    pub end_position_us: Option<i64>,
    /// Duration of the period occurrence; `None` if unknown.
    pub duration_us: Option<i64>,
    /// Suppresses the leading discontinuity of a clipped period.
    pub is_preceded_by_transition_from_same_stream: bool,
    pub is_last_in_timeline_period: bool,
    pub is_last_in_timeline_window: bool,
    /// Nothing follows this period in the timeline.
    pub is_final: bool,
}

impl MediaPeriodInfo {
    /// Content info spanning `[start_position_us, duration_us)`.
    pub fn new(id: MediaPeriodId, start_position_us: i64, duration_us: Option<i64>) -> Self {
        Self {
            id,
            start_position_us,
            requested_content_position_us: None,
            end_position_us: None,
            duration_us,
            is_preceded_by_transition_from_same_stream: false,
            is_last_in_timeline_period: true,
            is_last_in_timeline_window: false,
            is_final: false,
        }
    }

    /// Clips playback to `end_position_us`; the duration follows the clip end.
    pub fn with_end_position_us(mut self, end_position_us: i64) -> Self {
        self.end_position_us = Some(end_position_us);
        self.duration_us = Some(end_position_us);
        self
    }

    pub fn copy_with_start_position_us(&self, start_position_us: i64) -> Self {
        if start_position_us == self.start_position_us {
            return self.clone();
        }
        Self {
            start_position_us,
            ..self.clone()
        }
    }

    pub fn copy_with_requested_content_position_us(
        &self,
        requested_content_position_us: Option<i64>,
    ) -> Self {
        Self {
            requested_content_position_us,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn composite_uids_compare_structurally() {
        let a = PeriodUid::child(1, PeriodUid::name("intro"));
        let b = PeriodUid::child(1, PeriodUid::name("intro"));
        let c = PeriodUid::child(2, PeriodUid::name("intro"));

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.as_child().map(|child| child.child_index), Some(1));
    }

    #[test]
    fn ids_differ_by_window_sequence_number() {
        let first = MediaPeriodId::new(PeriodUid::Id(4), 0);
        let looped = first.copy_with_window_sequence_number(1);

        assert_ne!(first, looped);
        assert_eq!(first.period_uid, looped.period_uid);
        assert!(!first.is_ad());
        assert!(MediaPeriodId::new_ad(PeriodUid::Id(4), 0, 1, 0).is_ad());
    }

    #[test]
    fn display_is_compact() {
        let id = MediaPeriodId::new(PeriodUid::child(0, PeriodUid::Id(9)), 3);
        assert_eq!(id.to_string(), "0/#9@3");
    }

    #[test]
    fn end_position_clips_duration() {
        let info = MediaPeriodInfo::new(MediaPeriodId::new(PeriodUid::Id(1), 0), 0, None)
            .with_end_position_us(2_000_000);
        assert_eq!(info.end_position_us, Some(2_000_000));
        assert_eq!(info.duration_us, Some(2_000_000));
        assert_eq!(
            info.copy_with_start_position_us(500).start_position_us,
            500
        );
    }
}
