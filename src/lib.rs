//! Hearken Library
//!
//! Continuous grammar-constrained voice command recognition: audio capture,
//! streaming recognition, command matching and spoken responses.

pub mod asr;
pub mod audio;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod recognition;
pub mod tts;

pub use error::{Error, Result};
