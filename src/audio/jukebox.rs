//! Command surface used by the Discord layer.
//!
//! Every operation is routed to the guild's sequencer; nothing here touches
//! queue state or voice sessions directly. Read-only queries on a guild that
//! never enqueued anything answer from defaults without spawning a sequencer.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    notice::NoticeSender,
    queue::TrackRequest,
    sequencer::{EnqueueAck, NowPlaying, QueuePeek, QueueSnapshot, SequencerSettings, SkipOutcome},
    session::SessionFactory,
    store::GuildQueues,
};
use crate::{
    error::{CommandError, InvalidCommand},
    sources::Resolver,
};

pub struct Jukebox {
    queues: GuildQueues,
}

impl Jukebox {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        resolver: Arc<dyn Resolver>,
        settings: SequencerSettings,
        notices: Option<NoticeSender>,
    ) -> Self {
        Self {
            queues: GuildQueues::new(sessions, resolver, settings, notices),
        }
    }

    /// Encola un pedido; responde sin esperar la resolución
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        request: TrackRequest,
    ) -> Result<EnqueueAck, CommandError> {
        self.queues
            .get_or_create(guild_id)
            .enqueue(voice_channel, request)
            .await
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<SkipOutcome, CommandError> {
        match self.queues.get(guild_id) {
            Some(handle) => handle.skip().await,
            None => Err(InvalidCommand::NothingPlaying.into()),
        }
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<(), CommandError> {
        match self.queues.get(guild_id) {
            Some(handle) => handle.stop().await,
            None => Err(InvalidCommand::NotConnected.into()),
        }
    }

    pub async fn set_volume(&self, guild_id: GuildId, volume: f32) -> Result<(), CommandError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(InvalidCommand::VolumeOutOfRange(volume).into());
        }

        match self.queues.get(guild_id) {
            Some(handle) => handle.set_volume(volume).await,
            None => Err(InvalidCommand::NothingPlaying.into()),
        }
    }

    pub async fn peek(&self, guild_id: GuildId, limit: usize) -> QueuePeek {
        let Some(handle) = self.queues.get(guild_id) else {
            return QueuePeek::default();
        };

        handle.peek(limit).await.unwrap_or_else(|e| {
            warn!("No se pudo consultar la cola de {}: {}", guild_id, e);
            QueuePeek::default()
        })
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<NowPlaying> {
        let handle = self.queues.get(guild_id)?;
        handle.now_playing().await.ok().flatten()
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        let handle = self.queues.get(guild_id)?;
        handle.snapshot().await.ok()
    }

    /// El bot salió de la guild (o la guild se borró)
    pub async fn guild_left(&self, guild_id: GuildId) {
        if self.queues.remove(guild_id).await {
            info!("👋 Estado de guild {} eliminado", guild_id);
        }
    }

    pub fn active_guilds(&self) -> usize {
        self.queues.len()
    }

    pub async fn shutdown(&self) {
        self.queues.shutdown_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        queue::Phase,
        testing::{FakeSessions, ScriptedResolver, SessionCall},
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::time::Duration;
    use tokio::time::Instant;

    const GUILD: GuildId = GuildId::new(42);
    const VOICE: ChannelId = ChannelId::new(7);

    fn jukebox() -> (Jukebox, Arc<FakeSessions>) {
        let sessions = Arc::new(FakeSessions::default());
        let jukebox = Jukebox::new(
            sessions.clone(),
            Arc::new(ScriptedResolver::echo()),
            SequencerSettings::default(),
            None,
        );
        (jukebox, sessions)
    }

    async fn wait_until_playing(jukebox: &Jukebox, title: &str) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = jukebox.snapshot(GUILD).await;
            if snapshot.as_ref().and_then(|s| s.current.as_deref()) == Some(title) {
                return;
            }
            assert!(Instant::now() < deadline, "nunca empezó {}: {:?}", title, snapshot);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn queries_on_unknown_guild_do_not_create_state() {
        let (jukebox, sessions) = jukebox();

        assert_eq!(jukebox.peek(GUILD, 10).await, QueuePeek::default());
        assert_eq!(jukebox.now_playing(GUILD).await, None);
        assert_eq!(jukebox.snapshot(GUILD).await, None);
        assert_eq!(
            jukebox.skip(GUILD).await,
            Err(CommandError::Invalid(InvalidCommand::NothingPlaying))
        );
        assert_eq!(
            jukebox.stop(GUILD).await,
            Err(CommandError::Invalid(InvalidCommand::NotConnected))
        );

        assert_eq!(jukebox.active_guilds(), 0);
        assert_eq!(sessions.opened(), 0);
    }

    #[tokio::test]
    async fn enqueue_then_skip_through_the_surface() {
        let (jukebox, _sessions) = jukebox();
        let user = UserId::new(3);

        let ack = jukebox
            .enqueue(GUILD, VOICE, TrackRequest::new("first", user))
            .await
            .unwrap();
        assert_eq!(ack, EnqueueAck::Starting);
        wait_until_playing(&jukebox, "first").await;

        let ack = jukebox
            .enqueue(GUILD, VOICE, TrackRequest::new("second", user))
            .await
            .unwrap();
        assert_eq!(ack, EnqueueAck::Queued { position: 1 });

        let peek = jukebox.peek(GUILD, 10).await;
        assert_eq!(peek.entries.len(), 1);
        assert_eq!(peek.entries[0].query, "second");
        assert_eq!(peek.remaining, 0);

        let skipped = jukebox.skip(GUILD).await.unwrap();
        assert_eq!(skipped.skipped, "first");
        wait_until_playing(&jukebox, "second").await;

        let now = jukebox.now_playing(GUILD).await.unwrap();
        assert_eq!(now.requested_by, user);
    }

    #[tokio::test]
    async fn volume_is_validated_before_routing() {
        let (jukebox, _sessions) = jukebox();

        assert_eq!(
            jukebox.set_volume(GUILD, -0.1).await,
            Err(CommandError::Invalid(InvalidCommand::VolumeOutOfRange(-0.1)))
        );
        assert_eq!(
            jukebox.set_volume(GUILD, 0.3).await,
            Err(CommandError::Invalid(InvalidCommand::NothingPlaying))
        );

        jukebox
            .enqueue(GUILD, VOICE, TrackRequest::new("song", UserId::new(1)))
            .await
            .unwrap();
        jukebox.set_volume(GUILD, 0.3).await.unwrap();
        assert_eq!(jukebox.snapshot(GUILD).await.unwrap().volume, 0.3);
    }

    #[tokio::test]
    async fn guild_left_removes_state_and_halts() {
        let (jukebox, sessions) = jukebox();
        jukebox
            .enqueue(GUILD, VOICE, TrackRequest::new("song", UserId::new(1)))
            .await
            .unwrap();
        wait_until_playing(&jukebox, "song").await;

        jukebox.guild_left(GUILD).await;

        assert_eq!(jukebox.active_guilds(), 0);
        assert_eq!(jukebox.snapshot(GUILD).await, None);
        let probe = sessions.probe(GUILD).unwrap();
        assert_eq!(probe.count(&SessionCall::Disconnect), 1);
    }

    #[tokio::test]
    async fn stop_disconnects_but_keeps_the_guild() {
        let (jukebox, sessions) = jukebox();
        jukebox
            .enqueue(GUILD, VOICE, TrackRequest::new("song", UserId::new(1)))
            .await
            .unwrap();
        wait_until_playing(&jukebox, "song").await;

        jukebox.stop(GUILD).await.unwrap();

        let snapshot = jukebox.snapshot(GUILD).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(!snapshot.connected);
        assert_eq!(
            sessions.probe(GUILD).unwrap().count(&SessionCall::Disconnect),
            1
        );
        assert_eq!(
            jukebox.stop(GUILD).await,
            Err(CommandError::Invalid(InvalidCommand::NotConnected))
        );
    }
}
