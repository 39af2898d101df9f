//! Error types for the playback core.
//!
//! Domain failures are typed with `thiserror` so the sequencer can decide
//! how to recover from each one; the Discord layer and `main` wrap them in
//! `anyhow` like the rest of the application.

use serenity::model::id::ChannelId;
use std::time::Duration;
use thiserror::Error;

/// No se pudo convertir una búsqueda/URL en un track reproducible
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("sin resultados para `{0}`")]
    NotFound(String),

    #[error("tiempo agotado ({after:?}) resolviendo `{query}`")]
    Timeout { query: String, after: Duration },

    #[error("el backend falló resolviendo `{query}`: {reason}")]
    Backend { query: String, reason: String },
}

impl ResolutionError {
    /// Query original que produjo el error
    pub fn query(&self) -> &str {
        match self {
            Self::NotFound(query) => query,
            Self::Timeout { query, .. } | Self::Backend { query, .. } => query,
        }
    }
}

/// No se pudo entrar (o moverse) a un canal de voz
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectError {
    #[error("no se pudo conectar al canal de voz {channel}: {reason}")]
    Join { channel: ChannelId, reason: String },
}

/// El stream murió (o no pudo arrancar)
#[derive(Debug, Clone, Error, PartialEq)]
#[error("error de reproducción: {0}")]
pub struct PlaybackError(pub String);

impl PlaybackError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Comando inválido para el estado actual; no cambia nada
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidCommand {
    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("el bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("el volumen debe estar entre 0.0 y 1.0, recibido: {0}")]
    VolumeOutOfRange(f32),

    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),
}

/// Error devuelto por la superficie de comandos
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Invalid(#[from] InvalidCommand),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// El actor de la guild ya terminó (p. ej. la guild fue abandonada)
    #[error("la cola de esta guild ya no está disponible")]
    Unavailable,
}
