//! # Sources
//!
//! Turns what a user typed (`/play <query>`) into something the voice
//! driver can stream. The sequencer only sees the [`Resolver`] trait; the
//! production backend is [`YtDlpResolver`].

pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ResolutionError;

pub use ytdlp::YtDlpResolver;

/// Convierte una búsqueda o URL en un track reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resuelve `query`. No toca estado compartido; solo I/O de red/proceso.
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolutionError>;
}

/// Track ya resuelto, listo para reproducirse
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub title: String,
    pub duration: Option<Duration>,
    /// URL directa del stream de audio
    pub stream_url: String,
    /// Página original (YouTube, SoundCloud...) para mostrar en embeds
    pub page_url: Option<String>,
}

impl ResolvedTrack {
    pub fn new(title: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            duration: None,
            stream_url: stream_url.into(),
            page_url: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_page_url(mut self, page_url: String) -> Self {
        self.page_url = Some(page_url);
        self
    }
}

/// Devuelve la URL normalizada si `query` es una URL http(s) bien formada.
///
/// `www.` sin esquema también cuenta como URL y se promueve a `https://`.
pub fn as_url(query: &str) -> Option<url::Url> {
    let query = query.trim();
    let candidate = if query.starts_with("www.") {
        format!("https://{}", query)
    } else {
        query.to_string()
    };

    url::Url::parse(&candidate)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}
