//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure shared by the playback core:
//! - Logging and tracing setup
//! - Host log sink bridging
//!
//! ## Overview
//!
//! The playback engine only ever emits `tracing` events. This crate decides
//! where those events go: a formatted subscriber on stdout, an optional host
//! [`logging::LoggerSink`], or both.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
