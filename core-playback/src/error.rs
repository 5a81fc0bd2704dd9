//! # Playback Error Types
//!
//! Error types for the media period queue and its collaborators.
//!
//! Contract violations between the queue and its collaborators (mismatched
//! enabled/selection state, tail-only operations on a non-tail holder) are
//! not represented here: they are assertions and panic.

use thiserror::Error;

/// Errors that can occur while building, loading or advancing the period queue.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// A media period failed to prepare or load.
    #[error("Source error: {0}")]
    SourceError(String),

    /// An enabled sample stream reported an error after preparation.
    #[error("Sample stream error: {0}")]
    StreamError(String),

    /// The loading period reported a loading error to the playback driver.
    #[error("Loading failed for period {period}: {reason}")]
    LoadingFailed { period: String, reason: String },

    /// The source collaborator failed to release a period.
    #[error("Period release failed: {0}")]
    ReleaseFailed(String),

    /// A period handed back to a source was not created by it.
    #[error("Unknown media period: {0}")]
    UnknownPeriod(String),

    // ========================================================================
    // Timeline Errors
    // ========================================================================
    /// A timeline violates a structural requirement.
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// A period uid could not be resolved in the current timeline.
    #[error("Period not found in timeline: {0}")]
    PeriodNotInTimeline(String),

    /// The renderer offset of the next holder cannot be computed.
    #[error("Unknown duration for period {0} and no placeholder configured")]
    UnknownPeriodDuration(String),

    /// The queue already holds the configured maximum number of periods.
    #[error("Queue is full ({0} periods)")]
    QueueFull(usize),

    // ========================================================================
    // Track Selection Errors
    // ========================================================================
    /// The track selector rejected the renderer/track combination.
    #[error("Track selection failed: {0}")]
    TrackSelectionFailed(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Returns `true` if the playback driver may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceError(_)
                | PlaybackError::StreamError(_)
                | PlaybackError::LoadingFailed { .. }
        )
    }

    /// Returns `true` if this error originates from a source or sample stream.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceError(_)
                | PlaybackError::StreamError(_)
                | PlaybackError::LoadingFailed { .. }
                | PlaybackError::ReleaseFailed(_)
        )
    }

    /// Returns `true` if playback cannot continue without outside intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::TrackSelectionFailed(_)
                | PlaybackError::InvalidTimeline(_)
                | PlaybackError::InvalidConfig(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let load = PlaybackError::LoadingFailed {
            period: "#1@0".into(),
            reason: "connection reset".into(),
        };
        assert!(load.is_transient());
        assert!(load.is_source_error());
        assert!(!load.is_fatal());

        let selection = PlaybackError::TrackSelectionFailed("no decoder".into());
        assert!(selection.is_fatal());
        assert!(!selection.is_transient());

        assert!(PlaybackError::ReleaseFailed("gone".into()).is_source_error());
    }

    #[test]
    fn display_includes_period() {
        let err = PlaybackError::LoadingFailed {
            period: "intro@2".into(),
            reason: "404".into(),
        };
        assert_eq!(err.to_string(), "Loading failed for period intro@2: 404");
    }
}
