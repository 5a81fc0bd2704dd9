//! # Queue Configuration
//!
//! Buffering and lookahead policy for the media period queue and the
//! playback driver.

use crate::time::{duration_to_us, INITIAL_RENDERER_POSITION_OFFSET_US};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue and lookahead configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of holders buffered ahead in the queue.
    ///
    /// Default: 100.
    #[serde(default = "default_max_buffer_ahead_periods")]
    pub max_buffer_ahead_periods: usize,

    /// Buffered duration ahead of the renderer position at which the driver
    /// stops asking the loading period to continue loading.
    ///
    /// Default: 50 seconds.
    #[serde(default = "default_max_buffer")]
    pub max_buffer: Duration,

    /// Amount of media a holder must buffer to count as fully preloaded.
    ///
    /// `None` means any prepared holder is preloaded.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_target_preload_buffer")]
    pub target_preload_buffer: Option<Duration>,

    /// Duration assumed for a period whose real duration is not known yet
    /// when computing the renderer offset of the period after it.
    ///
    /// Progressive sources that only learn their duration after preparation
    /// need this to extend lookahead.
    ///
    /// Default: none.
    #[serde(default)]
    pub placeholder_period_duration: Option<Duration>,

    /// Renderer time of the start of the first queued period, in microseconds.
    ///
    /// Default: 1_000_000_000_000.
    #[serde(default = "default_initial_renderer_position_offset_us")]
    pub initial_renderer_position_offset_us: i64,

    /// Size in bytes of each allocator chunk handed to media periods.
    ///
    /// Default: 64 KB.
    #[serde(default = "default_individual_allocation_size")]
    pub individual_allocation_size: usize,

    /// Capacity of the queue event bus.
    ///
    /// Default: 100 events.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_buffer_ahead_periods: default_max_buffer_ahead_periods(),
            max_buffer: default_max_buffer(),
            target_preload_buffer: default_target_preload_buffer(),
            placeholder_period_duration: None,
            initial_renderer_position_offset_us: default_initial_renderer_position_offset_us(),
            individual_allocation_size: default_individual_allocation_size(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with shallow buffers.
    ///
    /// - Short buffer (10s)
    /// - Small preload target (1s)
    /// - Few periods ahead
    pub fn low_latency() -> Self {
        Self {
            max_buffer_ahead_periods: 4,
            max_buffer: Duration::from_secs(10),
            target_preload_buffer: Some(Duration::from_secs(1)),
            individual_allocation_size: 16 * 1024,
            ..Default::default()
        }
    }

    /// Create a configuration tuned for gapless transitions between items.
    ///
    /// - Larger preload target (15s) so the next item is ready early
    /// - Placeholder duration for items that report it late
    pub fn gapless() -> Self {
        Self {
            target_preload_buffer: Some(Duration::from_secs(15)),
            placeholder_period_duration: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_buffer_ahead_periods == 0 {
            return Err("max_buffer_ahead_periods must be > 0".to_string());
        }

        if self.max_buffer.is_zero() {
            return Err("max_buffer must be > 0".to_string());
        }

        if let Some(target) = self.target_preload_buffer {
            if target > self.max_buffer {
                return Err("target_preload_buffer cannot exceed max_buffer".to_string());
            }
        }

        if self.initial_renderer_position_offset_us < 0 {
            return Err("initial_renderer_position_offset_us must be >= 0".to_string());
        }

        if self.individual_allocation_size == 0 {
            return Err("individual_allocation_size must be > 0".to_string());
        }

        if self.event_buffer_size == 0 {
            return Err("event_buffer_size must be > 0".to_string());
        }

        Ok(())
    }

    pub fn max_buffer_us(&self) -> i64 {
        duration_to_us(self.max_buffer)
    }

    pub fn target_preload_buffer_us(&self) -> i64 {
        self.target_preload_buffer.map(duration_to_us).unwrap_or(0)
    }

    pub fn placeholder_period_duration_us(&self) -> Option<i64> {
        self.placeholder_period_duration.map(duration_to_us)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_buffer_ahead_periods() -> usize {
    100
}

fn default_max_buffer() -> Duration {
    Duration::from_secs(50)
}

fn default_target_preload_buffer() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

fn default_initial_renderer_position_offset_us() -> i64 {
    INITIAL_RENDERER_POSITION_OFFSET_US
}

fn default_individual_allocation_size() -> usize {
    64 * 1024
}

fn default_event_buffer_size() -> usize {
    100
}
