use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::session::{CompletionSink, PlaybackOutcome, SessionFactory, VoiceSession};
use crate::{
    error::{ConnectError, PlaybackError},
    sources::ResolvedTrack,
};

/// Fábrica de sesiones respaldadas por songbird
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

impl SessionFactory for SongbirdVoice {
    fn open(&self, guild_id: GuildId, volume: f32) -> Box<dyn VoiceSession> {
        Box::new(SongbirdSession {
            manager: self.manager.clone(),
            http: self.http.clone(),
            guild_id,
            call: None,
            track: None,
            volume,
        })
    }
}

/// Track en curso con su propia bandera de "sonando"
struct ActiveTrack {
    handle: TrackHandle,
    playing: Arc<AtomicBool>,
}

pub struct SongbirdSession {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    guild_id: GuildId,
    call: Option<Arc<Mutex<Call>>>,
    track: Option<ActiveTrack>,
    volume: f32,
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn ensure_connected(&mut self, channel: ChannelId) -> Result<(), ConnectError> {
        if let Some(call) = &self.call {
            let current = call.lock().await.current_channel();
            if current == Some(songbird::id::ChannelId::from(channel)) {
                return Ok(());
            }
        }

        // join también sirve para moverse de canal
        let call = self
            .manager
            .join(self.guild_id, channel)
            .await
            .map_err(|e| ConnectError::Join {
                channel,
                reason: e.to_string(),
            })?;

        self.call = Some(call);
        info!("🔊 Conectado al canal de voz {} en guild {}", channel, self.guild_id);
        Ok(())
    }

    async fn play(
        &mut self,
        track: &ResolvedTrack,
        on_finished: CompletionSink,
    ) -> Result<(), PlaybackError> {
        let call = self
            .call
            .clone()
            .ok_or_else(|| PlaybackError::new("sin conexión de voz"))?;

        if self.is_playing() {
            warn!("⚠️ play() con un track sonando en guild {}", self.guild_id);
        }

        let input = Input::from(HttpRequest::new(self.http.clone(), track.stream_url.clone()));
        let handle = call.lock().await.play_input(input);

        // Configurar volumen guardado
        let _ = handle.set_volume(self.volume);

        let playing = Arc::new(AtomicBool::new(true));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackFinishedHandler {
                        sink: on_finished.clone(),
                        playing: playing.clone(),
                    },
                )
                .map_err(|e| PlaybackError::new(format!("no se pudo registrar el evento: {}", e)))?;
        }

        self.track = Some(ActiveTrack { handle, playing });
        debug!("▶️ Stream iniciado: {}", track.title);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(active) = self.track.take() {
            active.playing.store(false, Ordering::Release);
            let _ = active.handle.stop();
            info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        }
    }

    async fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(active) = &self.track {
            let _ = active.handle.set_volume(volume);
            info!("🔊 Volumen ajustado a {}%", (volume * 100.0) as u8);
        }
    }

    async fn disconnect(&mut self) {
        self.stop().await;

        if self.call.take().is_some() {
            if let Err(e) = self.manager.remove(self.guild_id).await {
                warn!("Error al salir del canal de voz: {:?}", e);
            }
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }

    fn is_playing(&self) -> bool {
        self.track
            .as_ref()
            .is_some_and(|active| active.playing.load(Ordering::Acquire))
    }

    fn is_connected(&self) -> bool {
        self.call.is_some()
    }
}

/// Handler para cuando termina (o falla) un track
struct TrackFinishedHandler {
    sink: CompletionSink,
    playing: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinishedHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(PlaybackOutcome::Failed(format!("{:?}", e))),
                    _ => None,
                })
                .unwrap_or(PlaybackOutcome::Finished),
            _ => PlaybackOutcome::Finished,
        };

        debug!("Track terminado: {:?}", outcome);
        self.playing.store(false, Ordering::Release);
        self.sink.finished(outcome);

        None
    }
}
