//! # Track Selection
//!
//! Track metadata exposed by prepared media periods and the per-renderer
//! selection snapshot ([`TrackSelectorResult`]) a holder applies to its period.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Track Metadata
// ============================================================================

/// Classification of a renderer or track.
///
/// Renderers of type [`TrackType::None`] consume no media; when enabled they
/// are fed a synthetic empty stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    None,
    Unknown,
    Audio,
    Video,
    Text,
    Image,
    Metadata,
    CameraMotion,
}

impl TrackType {
    pub fn is_none(self) -> bool {
        matches!(self, TrackType::None)
    }
}

/// Description of one track inside a [`TrackGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    pub id: String,
    pub mime_type: Option<String>,
    /// Average bitrate in bits per second.
    pub bitrate: Option<u32>,
}

impl Format {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: None,
            bitrate: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Tracks that carry the same content in different formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackGroup {
    pub id: String,
    pub track_type: TrackType,
    pub formats: Vec<Format>,
}

impl TrackGroup {
    pub fn new(id: impl Into<String>, track_type: TrackType, formats: Vec<Format>) -> Self {
        Self {
            id: id.into(),
            track_type,
            formats,
        }
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// All track groups exposed by a prepared media period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackGroupArray {
    groups: Vec<TrackGroup>,
}

impl TrackGroupArray {
    pub fn new(groups: Vec<TrackGroup>) -> Self {
        Self { groups }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackGroup> {
        self.groups.get(index)
    }

    pub fn index_of(&self, group: &TrackGroup) -> Option<usize> {
        self.groups.iter().position(|g| g == group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackGroup> {
        self.groups.iter()
    }
}

/// Per-renderer configuration chosen alongside an enabled selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RendererConfiguration {
    /// Tunneling id handed to the renderer, if tunneled playback was chosen.
    pub tunneling_audio_session_id: Option<u32>,
    pub offload_mode_preferred: bool,
}

// ============================================================================
// Track Selection
// ============================================================================

/// The tracks chosen from one group for one renderer.
///
/// `enable`/`disable` mark whether the selection is actively loading at the
/// source level; only the loading holder keeps its selections enabled.
pub trait TrackSelection: Send + Sync + fmt::Debug {
    fn track_group(&self) -> &TrackGroup;

    /// Indices into the group's formats.
    fn selected_tracks(&self) -> &[usize];

    fn enable(&self);

    fn disable(&self);

    fn on_playback_speed(&self, _playback_speed: f32) {}

    fn on_play_when_ready_changed(&self, _play_when_ready: bool) {}
}

/// Two selections are equivalent when they pick the same tracks of the same group.
pub fn selections_equivalent(a: &dyn TrackSelection, b: &dyn TrackSelection) -> bool {
    a.track_group() == b.track_group() && a.selected_tracks() == b.selected_tracks()
}

/// A selection of a fixed set of tracks.
#[derive(Debug)]
pub struct FixedTrackSelection {
    group: TrackGroup,
    tracks: Vec<usize>,
    enabled: AtomicBool,
}

impl FixedTrackSelection {
    pub fn new(group: TrackGroup, tracks: Vec<usize>) -> Self {
        Self {
            group,
            tracks,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl TrackSelection for FixedTrackSelection {
    fn track_group(&self) -> &TrackGroup {
        &self.group
    }

    fn selected_tracks(&self) -> &[usize] {
        &self.tracks
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }
}

// ============================================================================
// Track Selector Result
// ============================================================================

/// Immutable per-renderer selection snapshot for one period.
///
/// `renderer_configurations[i]` is `Some` iff renderer `i` is enabled.
/// `selections[i]` is `Some` only for enabled renderers (renderers of type
/// [`TrackType::None`] may be enabled with no selection).
#[derive(Debug, Clone)]
pub struct TrackSelectorResult {
    pub renderer_configurations: Vec<Option<RendererConfiguration>>,
    pub selections: Vec<Option<Arc<dyn TrackSelection>>>,
}

impl TrackSelectorResult {
    pub fn new(
        renderer_configurations: Vec<Option<RendererConfiguration>>,
        selections: Vec<Option<Arc<dyn TrackSelection>>>,
    ) -> Self {
        assert_eq!(
            renderer_configurations.len(),
            selections.len(),
            "one configuration and one selection slot per renderer"
        );
        Self {
            renderer_configurations,
            selections,
        }
    }

    /// A result with every renderer disabled.
    pub fn empty(renderer_count: usize) -> Self {
        Self {
            renderer_configurations: vec![None; renderer_count],
            selections: vec![None; renderer_count],
        }
    }

    pub fn len(&self) -> usize {
        self.renderer_configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderer_configurations.is_empty()
    }

    pub fn is_renderer_enabled(&self, index: usize) -> bool {
        self.renderer_configurations
            .get(index)
            .is_some_and(|config| config.is_some())
    }

    pub fn selection(&self, index: usize) -> Option<&Arc<dyn TrackSelection>> {
        self.selections.get(index).and_then(|s| s.as_ref())
    }

    /// Whether renderer `index` is configured the same way in both results.
    pub fn is_equivalent(&self, other: Option<&TrackSelectorResult>, index: usize) -> bool {
        let Some(other) = other else {
            return false;
        };
        if self.renderer_configurations.get(index) != other.renderer_configurations.get(index) {
            return false;
        }
        match (self.selection(index), other.selection(index)) {
            (None, None) => true,
            (Some(a), Some(b)) => selections_equivalent(a.as_ref(), b.as_ref()),
            _ => false,
        }
    }

    /// Iterates over the live selections.
    pub fn active_selections(&self) -> impl Iterator<Item = &Arc<dyn TrackSelection>> {
        self.selections.iter().flatten()
    }
}
