//! Voice session contract.
//!
//! The sequencer drives exactly one [`VoiceSession`] per guild and never
//! shares it. Completion of a stream is reported through a
//! [`CompletionSink`], which the sequencer builds so that the notification
//! lands back on the guild's own mailbox instead of running sequencer logic
//! on the voice driver's task.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};

use crate::{
    error::{ConnectError, PlaybackError},
    sources::ResolvedTrack,
};

/// Cómo terminó un stream
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
}

/// Notificador de fin de stream entregado en cada `play`
#[derive(Clone)]
pub struct CompletionSink {
    notify: Arc<dyn Fn(PlaybackOutcome) + Send + Sync>,
}

impl CompletionSink {
    pub fn new(notify: impl Fn(PlaybackOutcome) + Send + Sync + 'static) -> Self {
        Self {
            notify: Arc::new(notify),
        }
    }

    pub fn finished(&self, outcome: PlaybackOutcome) {
        (self.notify)(outcome)
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSink").finish_non_exhaustive()
    }
}

/// Conexión de voz de una guild
#[async_trait]
pub trait VoiceSession: Send {
    /// Entra al canal si no está conectado; si está en otro canal, se mueve
    async fn ensure_connected(&mut self, channel: ChannelId) -> Result<(), ConnectError>;

    /// Empieza a transmitir `track`. Llamarlo con algo sonando es un error del llamador.
    async fn play(
        &mut self,
        track: &ResolvedTrack,
        on_finished: CompletionSink,
    ) -> Result<(), PlaybackError>;

    /// Corta el stream actual de inmediato
    async fn stop(&mut self);

    /// Aplica al stream actual y queda como volumen del siguiente
    async fn set_volume(&mut self, volume: f32);

    /// Sale del canal de voz; idempotente
    async fn disconnect(&mut self);

    fn is_playing(&self) -> bool;

    fn is_connected(&self) -> bool;
}

/// Crea la sesión de voz de cada guild nueva
pub trait SessionFactory: Send + Sync {
    fn open(&self, guild_id: GuildId, volume: f32) -> Box<dyn VoiceSession>;
}
