use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::sources::ResolvedTrack;

/// Pedido de canción tal como lo escribió el usuario. Se resuelve al llegar a la cabeza.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRequest {
    pub query: String,
    pub requested_by: UserId,
    /// Canal de texto donde avisar sobre este pedido
    pub reply_channel: Option<ChannelId>,
    pub added_at: DateTime<Utc>,
}

impl TrackRequest {
    pub fn new(query: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            query: query.into(),
            requested_by,
            reply_channel: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_reply_channel(mut self, channel: ChannelId) -> Self {
        self.reply_channel = Some(channel);
        self
    }
}

/// Track sonando ahora, junto al pedido que lo originó
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTrack {
    pub track: ResolvedTrack,
    pub request: TrackRequest,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Playing,
}

/// Estado de reproducción de una guild. Solo lo toca el secuenciador de esa guild.
#[derive(Debug)]
pub struct QueueState {
    pending: VecDeque<TrackRequest>,
    resolving: Option<TrackRequest>,
    current: Option<CurrentTrack>,
    phase: Phase,
    volume: f32,
    generation: u64,
}

impl QueueState {
    pub fn new(volume: f32) -> Self {
        Self {
            pending: VecDeque::new(),
            resolving: None,
            current: None,
            phase: Phase::Idle,
            volume: volume.clamp(0.0, 1.0),
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub fn current(&self) -> Option<&CurrentTrack> {
        self.current.as_ref()
    }

    pub fn resolving(&self) -> Option<&TrackRequest> {
        self.resolving.as_ref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackRequest> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Verifica si no hay nada sonando, resolviendo ni esperando
    pub fn is_empty(&self) -> bool {
        self.phase == Phase::Idle && self.pending.is_empty()
    }

    /// Agrega un pedido al final y devuelve su posición (1 = siguiente)
    pub fn push(&mut self, request: TrackRequest) -> usize {
        info!("➕ Agregado a la cola: {}", request.query);
        self.pending.push_back(request);
        self.pending.len()
    }

    /// Saca la cabeza de la cola y pasa a `Resolving` con una generación nueva.
    ///
    /// Devuelve `None` (y deja la fase en `Idle`) si la cola está vacía.
    pub fn begin_resolving(&mut self) -> Option<TrackRequest> {
        debug_assert!(self.current.is_none(), "begin_resolving con un track sonando");

        let Some(next) = self.pending.pop_front() else {
            info!("📭 Cola vacía, no hay siguiente track");
            self.resolving = None;
            self.phase = Phase::Idle;
            return None;
        };

        // ESTRICTO FIFO - primero en entrar, primero en salir
        info!("➡️ Siguiente en cola (FIFO): {}", next.query);
        self.generation += 1;
        self.resolving = Some(next.clone());
        self.phase = Phase::Resolving;
        Some(next)
    }

    /// Indica si `generation` pertenece al intento vigente
    pub fn is_current_attempt(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Saca el pedido en resolución (la resolución terminó, bien o mal)
    pub fn take_resolving(&mut self) -> Option<TrackRequest> {
        let request = self.resolving.take();
        if self.phase == Phase::Resolving {
            self.phase = Phase::Idle;
        }
        request
    }

    /// `Resolving -> Playing`: el track ya está sonando en la sesión
    pub fn start_playing(&mut self, track: ResolvedTrack, request: TrackRequest) {
        info!("🎵 Reproduciendo: {}", track.title);
        self.resolving = None;
        self.current = Some(CurrentTrack {
            track,
            request,
            started_at: Utc::now(),
        });
        self.phase = Phase::Playing;
    }

    /// Retira lo que esté sonando o resolviéndose e invalida sus notificaciones pendientes
    pub fn retire_current(&mut self) -> Option<Retired> {
        self.generation += 1;
        self.phase = Phase::Idle;

        if let Some(current) = self.current.take() {
            return Some(Retired::Played(current));
        }
        self.resolving.take().map(Retired::Resolving)
    }

    /// Limpia todo: pendientes, actual y resolución en curso
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.retire_current();
        info!("🗑️ Cola limpiada ({} pendientes descartados)", dropped);
        dropped
    }

    /// Hasta `limit` pedidos pendientes, en orden de reproducción
    pub fn peek(&self, limit: usize) -> Vec<&TrackRequest> {
        self.pending.iter().take(limit).collect()
    }

    /// Duración conocida de lo que suena ahora (los pendientes aún no están resueltos)
    pub fn current_duration(&self) -> Option<Duration> {
        self.current.as_ref().and_then(|c| c.track.duration)
    }

    /// Comprueba las invariantes de fase; usado por tests y debug_assert
    pub fn is_consistent(&self) -> bool {
        let phase_ok = match self.phase {
            Phase::Idle => self.current.is_none() && self.resolving.is_none(),
            Phase::Resolving => self.current.is_none() && self.resolving.is_some(),
            Phase::Playing => self.current.is_some() && self.resolving.is_none(),
        };

        let not_duplicated = self
            .current
            .as_ref()
            .map(|c| &c.request)
            .or(self.resolving.as_ref())
            .map_or(true, |active| !self.pending.iter().any(|p| p == active));

        if !(phase_ok && not_duplicated) {
            debug!("estado inconsistente: {:?}", self);
        }
        phase_ok && not_duplicated
    }
}

/// Lo que se retiró al avanzar o detener
#[derive(Debug, Clone)]
pub enum Retired {
    Played(CurrentTrack),
    Resolving(TrackRequest),
}

impl Retired {
    pub fn label(&self) -> &str {
        match self {
            Retired::Played(current) => &current.track.title,
            Retired::Resolving(request) => &request.query,
        }
    }
}
