//! # Cadence Common Library
//!
//! Shared code for the cadence audio services including:
//! - Error types
//! - Song and tag models handed between the controller and the decoder
//! - URI helpers (scheme and suffix extraction)
//! - Configuration loading

pub mod config;
pub mod error;
pub mod song;
pub mod uri;

pub use config::CadenceConfig;
pub use error::{Error, Result};
pub use song::{Song, SongRef, Tag, TagKind};
