//! Discord presentation helpers (embeds).

pub mod embeds;
