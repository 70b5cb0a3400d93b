//! Replays a timestamped chat transcript alongside a video playback clock.
//!
//! [`loader`] reads the transcript and its icon metadata, [`sync`] decides which
//! messages are visible at each clock reading, and [`session`] wires a clock,
//! the engine and a [`render::Renderer`] together for one video.

pub mod clock;
pub mod config;
pub mod error;
pub mod formats;
pub mod input;
pub mod loader;
pub mod model;
pub mod render;
pub mod session;
pub mod sync;
