//! Workspace facade crate.
//!
//! Re-exports the media period queue engine (`core-playback`) and the
//! logging runtime (`core-runtime`) behind feature flags, so a host can
//! depend on `mpq-workspace` alone and enable what it needs.

#[cfg(feature = "playback")]
pub use core_playback as playback;

#[cfg(feature = "logging")]
pub use core_runtime as runtime;
