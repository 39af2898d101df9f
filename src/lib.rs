//! # Open Jukebox
//!
//! Discord music bot with a strict FIFO queue per guild. Each guild runs its
//! own playback sequencer; see [`audio`] for the core and [`bot`] for the
//! Discord front-end.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
