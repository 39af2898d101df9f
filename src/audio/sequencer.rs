//! Per-guild playback sequencer.
//!
//! Every guild gets one actor task that owns its [`QueueState`] and its
//! [`VoiceSession`]. User commands, resolution results and "stream
//! finished" notifications all arrive as messages on the same mailbox and
//! are applied one at a time, in arrival order.
//!
//! Resolution runs in a separate task and reports back with the generation
//! it was started under; anything that advances or stops playback bumps the
//! generation first, so late results and duplicate completion notifications
//! are simply discarded.

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{ops::ControlFlow, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};

use super::{
    notice::{Notice, NoticeSender},
    queue::{Phase, QueueState, Retired, TrackRequest},
    session::{CompletionSink, PlaybackOutcome, VoiceSession},
};
use crate::{
    error::{CommandError, InvalidCommand, ResolutionError},
    sources::{ResolvedTrack, Resolver},
};

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub resolve_timeout: Duration,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            max_queue_size: 1000,
            resolve_timeout: Duration::from_secs(30),
        }
    }
}

/// Respuesta inmediata a un enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueAck {
    /// Era lo único en la cola: ya se está resolviendo
    Starting,
    /// Posición en la cola de pendientes (1 = siguiente)
    Queued { position: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkipOutcome {
    pub skipped: String,
    pub queue_empty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    /// Texto original; los pendientes nunca están resueltos
    pub query: String,
    pub requested_by: UserId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePeek {
    pub entries: Vec<PendingEntry>,
    /// Pendientes que no entraron en `entries`
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: ResolvedTrack,
    pub requested_by: UserId,
    pub started_at: DateTime<Utc>,
    pub volume: f32,
}

/// Foto del estado de una guild
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub phase: Phase,
    pub current: Option<String>,
    pub resolving: Option<String>,
    pub pending: Vec<String>,
    pub volume: f32,
    pub generation: u64,
    pub connected: bool,
    /// Resultado de `QueueState::is_consistent` al momento de la foto
    pub consistent: bool,
}

enum GuildMessage {
    Enqueue {
        channel: ChannelId,
        request: TrackRequest,
        reply: oneshot::Sender<Result<EnqueueAck, CommandError>>,
    },
    Skip {
        reply: oneshot::Sender<Result<SkipOutcome, CommandError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    SetVolume {
        volume: f32,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    Peek {
        limit: usize,
        reply: oneshot::Sender<QueuePeek>,
    },
    NowPlaying {
        reply: oneshot::Sender<Option<NowPlaying>>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Resolved {
        generation: u64,
        result: Result<ResolvedTrack, ResolutionError>,
    },
    Finished {
        generation: u64,
        outcome: PlaybackOutcome,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Buzón de la guild; clonarlo es barato
#[derive(Clone)]
pub struct GuildHandle {
    guild_id: GuildId,
    mailbox: mpsc::UnboundedSender<GuildMessage>,
}

impl GuildHandle {
    /// Lanza el actor de la guild y devuelve su buzón
    pub fn spawn(
        guild_id: GuildId,
        session: Box<dyn VoiceSession>,
        resolver: Arc<dyn Resolver>,
        settings: SequencerSettings,
        notices: Option<NoticeSender>,
    ) -> Self {
        let (mailbox, inbox) = mpsc::unbounded_channel();

        let sequencer = Sequencer {
            guild_id,
            state: QueueState::new(settings.default_volume),
            session,
            resolver,
            settings,
            notices,
            mailbox: mailbox.downgrade(),
        };

        tokio::spawn(
            sequencer
                .run(inbox)
                .instrument(info_span!("guild", id = %guild_id)),
        );

        Self { guild_id, mailbox }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub async fn enqueue(
        &self,
        channel: ChannelId,
        request: TrackRequest,
    ) -> Result<EnqueueAck, CommandError> {
        self.request(move |reply| GuildMessage::Enqueue {
            channel,
            request,
            reply,
        })
        .await?
    }

    pub async fn skip(&self) -> Result<SkipOutcome, CommandError> {
        self.request(|reply| GuildMessage::Skip { reply }).await?
    }

    pub async fn stop(&self) -> Result<(), CommandError> {
        self.request(|reply| GuildMessage::Stop { reply }).await?
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), CommandError> {
        self.request(move |reply| GuildMessage::SetVolume { volume, reply })
            .await?
    }

    pub async fn peek(&self, limit: usize) -> Result<QueuePeek, CommandError> {
        self.request(move |reply| GuildMessage::Peek { limit, reply })
            .await
    }

    pub async fn now_playing(&self) -> Result<Option<NowPlaying>, CommandError> {
        self.request(|reply| GuildMessage::NowPlaying { reply }).await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, CommandError> {
        self.request(|reply| GuildMessage::Snapshot { reply }).await
    }

    /// Detiene todo y termina el actor. Esperar a que responda.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| GuildMessage::Shutdown { reply })
            .await
            .is_err()
        {
            debug!("El secuenciador de {} ya había terminado", self.guild_id);
        }
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> GuildMessage,
    ) -> Result<T, CommandError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(message(reply))
            .map_err(|_| CommandError::Unavailable)?;
        response.await.map_err(|_| CommandError::Unavailable)
    }
}

struct Sequencer {
    guild_id: GuildId,
    state: QueueState,
    session: Box<dyn VoiceSession>,
    resolver: Arc<dyn Resolver>,
    settings: SequencerSettings,
    notices: Option<NoticeSender>,
    // Débil: el actor termina cuando nadie más puede escribirle
    mailbox: mpsc::WeakUnboundedSender<GuildMessage>,
}

impl Sequencer {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<GuildMessage>) {
        info!("🎛️ Secuenciador iniciado para guild {}", self.guild_id);

        while let Some(message) = inbox.recv().await {
            if self.handle(message).await.is_break() {
                break;
            }
            debug_assert!(self.state.is_consistent());
        }

        info!("🛑 Secuenciador detenido para guild {}", self.guild_id);
    }

    async fn handle(&mut self, message: GuildMessage) -> ControlFlow<()> {
        match message {
            GuildMessage::Enqueue {
                channel,
                request,
                reply,
            } => {
                let _ = reply.send(self.enqueue(channel, request).await);
            }
            GuildMessage::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            GuildMessage::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            GuildMessage::SetVolume { volume, reply } => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            GuildMessage::Peek { limit, reply } => {
                let _ = reply.send(self.peek(limit));
            }
            GuildMessage::NowPlaying { reply } => {
                let _ = reply.send(self.now_playing());
            }
            GuildMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            GuildMessage::Resolved { generation, result } => {
                self.on_resolved(generation, result).await;
            }
            GuildMessage::Finished {
                generation,
                outcome,
            } => {
                self.on_finished(generation, outcome).await;
            }
            GuildMessage::Shutdown { reply } => {
                self.halt().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn enqueue(
        &mut self,
        channel: ChannelId,
        request: TrackRequest,
    ) -> Result<EnqueueAck, CommandError> {
        if self.state.pending_len() >= self.settings.max_queue_size {
            return Err(InvalidCommand::QueueFull(self.settings.max_queue_size).into());
        }

        let position = self.state.push(request);

        // Si falla la conexión el pedido queda en la cola para reintentar
        if let Err(e) = self.session.ensure_connected(channel).await {
            warn!("❌ {}", e);
            return Err(e.into());
        }

        if self.state.phase() != Phase::Idle {
            return Ok(EnqueueAck::Queued { position });
        }

        self.start_next();
        Ok(match position {
            1 => EnqueueAck::Starting,
            _ => EnqueueAck::Queued {
                position: position - 1,
            },
        })
    }

    async fn skip(&mut self) -> Result<SkipOutcome, CommandError> {
        let phase = self.state.phase();
        if phase == Phase::Idle {
            return Err(InvalidCommand::NothingPlaying.into());
        }

        // Primero invalidar: la notificación que genere stop() llegará obsoleta
        let retired = self.state.retire_current();
        if phase == Phase::Playing {
            self.session.stop().await;
        }

        let skipped = retired
            .as_ref()
            .map(|r| r.label().to_string())
            .unwrap_or_default();
        info!("⏭️ Saltado: {}", skipped);

        self.start_next();

        Ok(SkipOutcome {
            skipped,
            queue_empty: self.state.phase() == Phase::Idle,
        })
    }

    async fn stop(&mut self) -> Result<(), CommandError> {
        if !self.session.is_connected() && self.state.is_empty() {
            return Err(InvalidCommand::NotConnected.into());
        }

        self.halt().await;
        Ok(())
    }

    /// Limpia la cola, corta el stream y sale del canal
    async fn halt(&mut self) {
        self.state.clear();
        self.session.stop().await;
        self.session.disconnect().await;
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), CommandError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(InvalidCommand::VolumeOutOfRange(volume).into());
        }

        self.state.set_volume(volume);
        self.session.set_volume(volume).await;
        Ok(())
    }

    fn peek(&self, limit: usize) -> QueuePeek {
        let entries: Vec<_> = self
            .state
            .peek(limit)
            .into_iter()
            .map(|request| PendingEntry {
                query: request.query.clone(),
                requested_by: request.requested_by,
            })
            .collect();

        QueuePeek {
            remaining: self.state.pending_len() - entries.len(),
            entries,
        }
    }

    fn now_playing(&self) -> Option<NowPlaying> {
        self.state.current().map(|current| NowPlaying {
            track: current.track.clone(),
            requested_by: current.request.requested_by,
            started_at: current.started_at,
            volume: self.state.volume(),
        })
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            phase: self.state.phase(),
            current: self.state.current().map(|c| c.track.title.clone()),
            resolving: self.state.resolving().map(|r| r.query.clone()),
            pending: self.state.pending().map(|r| r.query.clone()).collect(),
            volume: self.state.volume(),
            generation: self.state.generation(),
            connected: self.session.is_connected(),
            consistent: self.state.is_consistent(),
        }
    }

    /// Saca la cabeza y lanza su resolución; sin pendientes queda en `Idle`.
    ///
    /// Cada fallo consume exactamente un pedido, así que los reintentos
    /// están acotados por el largo de la cola.
    fn start_next(&mut self) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            warn!("Buzón cerrado, no se puede avanzar en guild {}", self.guild_id);
            return;
        };

        let Some(request) = self.state.begin_resolving() else {
            return;
        };

        let generation = self.state.generation();
        let resolver = self.resolver.clone();
        let timeout = self.settings.resolve_timeout;

        tokio::spawn(
            async move {
                let query = request.query;
                let result = match tokio::time::timeout(timeout, resolver.resolve(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(ResolutionError::Timeout {
                        query: query.clone(),
                        after: timeout,
                    }),
                };

                let _ = mailbox.send(GuildMessage::Resolved { generation, result });
            }
            .in_current_span(),
        );
    }

    async fn on_resolved(&mut self, generation: u64, result: Result<ResolvedTrack, ResolutionError>) {
        if self.state.phase() != Phase::Resolving || !self.state.is_current_attempt(generation) {
            debug!("Descartando resolución obsoleta (generación {})", generation);
            return;
        }

        let Some(request) = self.state.take_resolving() else {
            return;
        };

        let track = match result {
            Ok(track) => track,
            Err(e) => {
                warn!("❌ No se pudo resolver `{}`: {}", request.query, e);
                self.notify(Notice::ResolutionFailed {
                    guild_id: self.guild_id,
                    channel: request.reply_channel,
                    requested_by: request.requested_by,
                    query: request.query,
                    reason: e.to_string(),
                });
                self.start_next();
                return;
            }
        };

        let sink = self.completion_sink(generation);
        match self.session.play(&track, sink).await {
            Ok(()) => {
                self.notify(Notice::NowPlaying {
                    guild_id: self.guild_id,
                    channel: request.reply_channel,
                    track: track.clone(),
                    requested_by: request.requested_by,
                });
                self.state.start_playing(track, request);
            }
            Err(e) => {
                warn!("❌ No se pudo iniciar `{}`: {}", track.title, e);
                self.notify(Notice::ResolutionFailed {
                    guild_id: self.guild_id,
                    channel: request.reply_channel,
                    requested_by: request.requested_by,
                    query: request.query,
                    reason: e.to_string(),
                });
                self.start_next();
            }
        }
    }

    async fn on_finished(&mut self, generation: u64, outcome: PlaybackOutcome) {
        if self.state.phase() != Phase::Playing || !self.state.is_current_attempt(generation) {
            debug!("Ignorando fin de stream obsoleto (generación {})", generation);
            return;
        }

        let Some(Retired::Played(finished)) = self.state.retire_current() else {
            return;
        };

        match &outcome {
            PlaybackOutcome::Finished => info!("✅ Terminó: {}", finished.track.title),
            PlaybackOutcome::Failed(reason) => {
                warn!("❌ Error en track {}: {}", finished.track.title, reason)
            }
        }

        self.start_next();

        // Los errores de stream solo se muestran si la cola se quedó vacía
        if let PlaybackOutcome::Failed(reason) = outcome {
            if self.state.phase() == Phase::Idle {
                self.notify(Notice::PlaybackFailed {
                    guild_id: self.guild_id,
                    channel: finished.request.reply_channel,
                    title: finished.track.title,
                    reason,
                });
            }
        }
    }

    /// La notificación vuelve a este mismo buzón con la generación del intento
    fn completion_sink(&self, generation: u64) -> CompletionSink {
        let mailbox = self.mailbox.clone();
        CompletionSink::new(move |outcome| {
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(GuildMessage::Finished {
                    generation,
                    outcome,
                });
            }
        })
    }

    fn notify(&self, notice: Notice) {
        if let Some(notices) = &self.notices {
            if notices.send(notice).is_err() {
                debug!("Canal de avisos cerrado");
            }
        }
    }
}
