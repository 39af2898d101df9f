use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::info;

use super::{
    notice::NoticeSender,
    sequencer::{GuildHandle, SequencerSettings},
    session::SessionFactory,
};
use crate::sources::Resolver;

/// Secuenciadores activos, uno por guild. Se crean con el primer enqueue.
pub struct GuildQueues {
    guilds: DashMap<GuildId, GuildHandle>,
    sessions: Arc<dyn SessionFactory>,
    resolver: Arc<dyn Resolver>,
    settings: SequencerSettings,
    notices: Option<NoticeSender>,
}

impl GuildQueues {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        resolver: Arc<dyn Resolver>,
        settings: SequencerSettings,
        notices: Option<NoticeSender>,
    ) -> Self {
        Self {
            guilds: DashMap::new(),
            sessions,
            resolver,
            settings,
            notices,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.guilds.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> GuildHandle {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Creando secuenciador para guild {}", guild_id);
                GuildHandle::spawn(
                    guild_id,
                    self.sessions.open(guild_id, self.settings.default_volume),
                    self.resolver.clone(),
                    self.settings.clone(),
                    self.notices.clone(),
                )
            })
            .value()
            .clone()
    }

    /// Saca la guild del store y espera a que su secuenciador se detenga
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        let Some((_, handle)) = self.guilds.remove(&guild_id) else {
            return false;
        };

        handle.shutdown().await;
        true
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.guilds.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Detiene todas las guilds en paralelo
    pub async fn shutdown_all(&self) {
        let handles: Vec<GuildHandle> = self
            .guilds
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.guilds.clear();

        info!("🛑 Deteniendo {} secuenciadores", handles.len());
        futures::future::join_all(handles.iter().map(|handle| handle.shutdown())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        queue::{Phase, TrackRequest},
        testing::{self, FakeSessions, ScriptedResolver, SessionCall},
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, UserId};

    fn store(sessions: Arc<FakeSessions>) -> GuildQueues {
        GuildQueues::new(
            sessions,
            Arc::new(ScriptedResolver::echo()),
            SequencerSettings::default(),
            None,
        )
    }

    #[tokio::test]
    async fn creates_one_sequencer_per_guild_lazily() {
        let sessions = Arc::new(FakeSessions::default());
        let queues = store(sessions.clone());
        assert!(queues.is_empty());
        assert!(queues.get(GuildId::new(1)).is_none());

        let first = queues.get_or_create(GuildId::new(1));
        let again = queues.get_or_create(GuildId::new(1));
        queues.get_or_create(GuildId::new(2));

        assert_eq!(first.guild_id(), again.guild_id());
        assert_eq!(queues.len(), 2);
        assert_eq!(sessions.opened(), 2);
    }

    #[tokio::test]
    async fn guilds_do_not_share_queues() {
        let sessions = Arc::new(FakeSessions::default());
        let queues = store(sessions);
        let user = UserId::new(5);

        let a = queues.get_or_create(GuildId::new(1));
        let b = queues.get_or_create(GuildId::new(2));
        a.enqueue(ChannelId::new(10), TrackRequest::new("from-a", user))
            .await
            .unwrap();
        b.enqueue(ChannelId::new(20), TrackRequest::new("from-b", user))
            .await
            .unwrap();

        let snap_a = testing::wait_for(&a, |s| s.phase == Phase::Playing).await;
        let snap_b = testing::wait_for(&b, |s| s.phase == Phase::Playing).await;
        assert_eq!(snap_a.current.as_deref(), Some("from-a"));
        assert_eq!(snap_b.current.as_deref(), Some("from-b"));
    }

    #[tokio::test]
    async fn remove_halts_the_session() {
        let sessions = Arc::new(FakeSessions::default());
        let queues = store(sessions.clone());
        let guild = GuildId::new(1);

        let handle = queues.get_or_create(guild);
        handle
            .enqueue(ChannelId::new(10), TrackRequest::new("song", UserId::new(5)))
            .await
            .unwrap();
        testing::wait_for(&handle, |s| s.phase == Phase::Playing).await;

        assert!(queues.remove(guild).await);
        assert!(!queues.contains(guild));
        assert!(!queues.remove(guild).await);

        let probe = sessions.probe(guild).unwrap();
        assert_eq!(probe.count(&SessionCall::Disconnect), 1);
        assert!(!probe.is_connected());
    }

    #[tokio::test]
    async fn shutdown_all_empties_the_store() {
        let sessions = Arc::new(FakeSessions::default());
        let queues = store(sessions.clone());
        for id in 1..=3 {
            queues.get_or_create(GuildId::new(id));
        }

        queues.shutdown_all().await;

        assert!(queues.is_empty());
        for id in 1..=3 {
            let probe = sessions.probe(GuildId::new(id)).unwrap();
            assert_eq!(probe.count(&SessionCall::Disconnect), 1);
        }
    }
}
