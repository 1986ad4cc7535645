//! Core text processing
//!
//! Transcript normalization shared by the command matcher and the loop.

pub mod text_normalizer;

pub use text_normalizer::{normalize, normalize_into, NormalizedText};
