//! # Audio Module
//!
//! Per-guild queue and playback sequencing for Open Jukebox.
//!
//! ## Architecture
//!
//! ### [`jukebox`] - Command Surface
//! - Entry point for the Discord layer (`/play`, `/skip`, `/stop`...)
//! - Routes each call to the guild's sequencer
//!
//! ### [`store`] - Guild Queue Store
//! - One sequencer per guild, created on first enqueue
//! - Removed when the bot leaves the guild
//!
//! ### [`sequencer`] - Playback Sequencer
//! - Actor task owning the guild's [`queue::QueueState`] and voice session
//! - Strict FIFO, resolves each request only when it reaches the head
//! - Stale resolution results and completion notifications are dropped by generation
//!
//! ### [`session`] / [`voice`] - Voice Sessions
//! - [`session::VoiceSession`] is the contract the sequencer drives
//! - [`voice::SongbirdSession`] implements it on top of songbird
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_jukebox::audio::{jukebox::Jukebox, queue::TrackRequest, voice::SongbirdVoice};
//! use open_jukebox::{config::Config, sources::YtDlpResolver};
//! use serenity::all::{ChannelId, GuildId, UserId};
//! use std::sync::Arc;
//!
//! # async fn example(manager: Arc<songbird::Songbird>) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let jukebox = Jukebox::new(
//!     Arc::new(SongbirdVoice::new(manager, reqwest::Client::new())),
//!     Arc::new(YtDlpResolver::new(&config.ytdlp_path, config.max_concurrent_resolves)),
//!     config.sequencer_settings(),
//!     None,
//! );
//!
//! let guild_id = GuildId::new(123456789);
//! let request = TrackRequest::new("never gonna give you up", UserId::new(1));
//! jukebox.enqueue(guild_id, ChannelId::new(987654321), request).await?;
//! jukebox.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod jukebox;
pub mod notice;
pub mod queue;
pub mod sequencer;
pub mod session;
pub mod store;
pub mod voice;

#[cfg(test)]
mod testing;
