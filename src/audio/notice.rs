use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::mpsc;

use crate::sources::ResolvedTrack;

/// Aviso para los usuarios producido por un secuenciador
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying {
        guild_id: GuildId,
        channel: Option<ChannelId>,
        track: ResolvedTrack,
        requested_by: UserId,
    },
    /// Dirigido a quien pidió la canción
    ResolutionFailed {
        guild_id: GuildId,
        channel: Option<ChannelId>,
        requested_by: UserId,
        query: String,
        reason: String,
    },
    /// El stream falló y la cola quedó vacía
    PlaybackFailed {
        guild_id: GuildId,
        channel: Option<ChannelId>,
        title: String,
        reason: String,
    },
}

impl Notice {
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Notice::NowPlaying { channel, .. }
            | Notice::ResolutionFailed { channel, .. }
            | Notice::PlaybackFailed { channel, .. } => *channel,
        }
    }
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}
