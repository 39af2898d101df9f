//! Fakes compartidos por los tests del secuenciador, el store y el jukebox.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Notify, time::Instant};

use super::{
    sequencer::{GuildHandle, QueueSnapshot},
    session::{CompletionSink, PlaybackOutcome, SessionFactory, VoiceSession},
};
use crate::{
    error::{ConnectError, PlaybackError, ResolutionError},
    sources::{ResolvedTrack, Resolver},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Connect(ChannelId),
    Play(String),
    Stop,
    SetVolume(f32),
    Disconnect,
}

#[derive(Default)]
struct SessionLog {
    calls: Vec<SessionCall>,
    sinks: Vec<CompletionSink>,
    channel: Option<ChannelId>,
    playing: bool,
    volume: f32,
    fail_connect: bool,
}

/// Sesión de voz en memoria que registra cada llamada
pub struct FakeSession(Arc<Mutex<SessionLog>>);

/// Vista del test sobre una `FakeSession`
#[derive(Clone)]
pub struct SessionProbe(Arc<Mutex<SessionLog>>);

pub fn fake_session(volume: f32) -> (Box<dyn VoiceSession>, SessionProbe) {
    let log = Arc::new(Mutex::new(SessionLog {
        volume,
        ..SessionLog::default()
    }));
    (Box::new(FakeSession(log.clone())), SessionProbe(log))
}

impl SessionProbe {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.0.lock().calls.clone()
    }

    pub fn count(&self, call: &SessionCall) -> usize {
        self.0.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn played(&self) -> Vec<String> {
        self.0
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SessionCall::Play(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_sink(&self) -> Option<CompletionSink> {
        self.0.lock().sinks.last().cloned()
    }

    /// Simula que el driver terminó el stream actual
    pub fn finish_current(&self, outcome: PlaybackOutcome) {
        let sink = {
            let mut log = self.0.lock();
            log.playing = false;
            log.sinks.last().cloned()
        };
        if let Some(sink) = sink {
            sink.finished(outcome);
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.0.lock().fail_connect = fail;
    }

    pub fn volume(&self) -> f32 {
        self.0.lock().volume
    }

    pub fn is_connected(&self) -> bool {
        self.0.lock().channel.is_some()
    }
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn ensure_connected(&mut self, channel: ChannelId) -> Result<(), ConnectError> {
        let mut log = self.0.lock();
        if log.fail_connect {
            return Err(ConnectError::Join {
                channel,
                reason: "sin permisos".into(),
            });
        }
        if log.channel != Some(channel) {
            log.calls.push(SessionCall::Connect(channel));
            log.channel = Some(channel);
        }
        Ok(())
    }

    async fn play(
        &mut self,
        track: &ResolvedTrack,
        on_finished: CompletionSink,
    ) -> Result<(), PlaybackError> {
        let mut log = self.0.lock();
        if log.channel.is_none() {
            return Err(PlaybackError::new("sin conexión de voz"));
        }
        log.calls.push(SessionCall::Play(track.title.clone()));
        log.sinks.push(on_finished);
        log.playing = true;
        Ok(())
    }

    async fn stop(&mut self) {
        let mut log = self.0.lock();
        log.calls.push(SessionCall::Stop);
        log.playing = false;
    }

    async fn set_volume(&mut self, volume: f32) {
        let mut log = self.0.lock();
        log.calls.push(SessionCall::SetVolume(volume));
        log.volume = volume;
    }

    async fn disconnect(&mut self) {
        let mut log = self.0.lock();
        log.calls.push(SessionCall::Disconnect);
        log.playing = false;
        log.channel = None;
    }

    fn is_playing(&self) -> bool {
        self.0.lock().playing
    }

    fn is_connected(&self) -> bool {
        self.0.lock().channel.is_some()
    }
}

/// Fábrica que guarda un probe por guild
#[derive(Default)]
pub struct FakeSessions {
    probes: Mutex<HashMap<GuildId, SessionProbe>>,
}

impl FakeSessions {
    pub fn probe(&self, guild_id: GuildId) -> Option<SessionProbe> {
        self.probes.lock().get(&guild_id).cloned()
    }

    pub fn opened(&self) -> usize {
        self.probes.lock().len()
    }
}

impl SessionFactory for FakeSessions {
    fn open(&self, guild_id: GuildId, volume: f32) -> Box<dyn VoiceSession> {
        let (session, probe) = fake_session(volume);
        self.probes.lock().insert(guild_id, probe);
        session
    }
}

#[derive(Clone)]
enum Script {
    Fail,
    Hang,
    Gated(Arc<Notify>),
}

/// Resuelve cada query a un track con el mismo título salvo que se indique otra cosa
#[derive(Default)]
pub struct ScriptedResolver {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedResolver {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn fail(&self, query: &str) {
        self.scripts.lock().insert(query.to_string(), Script::Fail);
    }

    pub fn hang(&self, query: &str) {
        self.scripts.lock().insert(query.to_string(), Script::Hang);
    }

    /// La resolución de `query` espera hasta que se notifique el gate
    pub fn gate(&self, query: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.scripts
            .lock()
            .insert(query.to_string(), Script::Gated(gate.clone()));
        gate
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolutionError> {
        let script = self.scripts.lock().get(query).cloned();
        let track = ResolvedTrack::new(query, format!("stream://{}", query));

        match script {
            Some(Script::Fail) => Err(ResolutionError::NotFound(query.to_string())),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Gated(gate)) => {
                gate.notified().await;
                Ok(track)
            }
            None => Ok(track),
        }
    }
}

/// Consulta el estado hasta que cumpla `ready` (máximo 2s)
pub async fn wait_for(handle: &GuildHandle, ready: impl Fn(&QueueSnapshot) -> bool) -> QueueSnapshot {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = handle.snapshot().await.expect("secuenciador vivo");
        if ready(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "timeout esperando estado; último: {:?}",
            snapshot
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
