use async_process::{Command, Stdio};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{as_url, ResolvedTrack, Resolver};
use crate::error::ResolutionError;

/// Resolver respaldado por el ejecutable `yt-dlp`
pub struct YtDlpResolver {
    program: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    webpage_url: Option<String>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            program: program.into(),
            rate_limiter: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Argumento que recibe yt-dlp: la URL tal cual o una búsqueda `ytsearch1:`
    fn target_for(query: &str) -> String {
        match as_url(query) {
            Some(url) => url.to_string(),
            None => format!("ytsearch1:{}", query.trim()),
        }
    }

    /// Verifica que yt-dlp pueda ejecutarse (usado por `--health-check`)
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("{} no puede ejecutarse correctamente", self.program);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| backend_error(query, e))?;

        let target = Self::target_for(query);
        info!("🔍 Resolviendo con yt-dlp: {}", target);

        // kill_on_drop: si el secuenciador agota el timeout, el proceso muere con el future
        let output = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                "--quiet",
                target.as_str(),
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| backend_error(query, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp terminó con {}: {}", output.status, stderr.trim());
            return Err(backend_error(query, stderr.trim()));
        }

        let track = parse_info(query, &output.stdout)?;
        debug!("✅ Resuelto `{}` -> {}", query, track.title);
        Ok(track)
    }
}

/// Interpreta la salida JSON de yt-dlp; para búsquedas toma el primer resultado
fn parse_info(query: &str, stdout: &[u8]) -> Result<ResolvedTrack, ResolutionError> {
    let mut info: YtDlpInfo =
        serde_json::from_slice(stdout).map_err(|e| backend_error(query, e))?;

    if let Some(entries) = info.entries.take() {
        info = entries
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;
    }

    let stream_url = info
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| backend_error(query, "el resultado no tiene stream reproducible"))?;

    let mut track = ResolvedTrack::new(info.title.unwrap_or_else(|| "Unknown".to_string()), stream_url);

    if let Some(seconds) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(seconds));
    }

    if let Some(page_url) = info.webpage_url {
        track = track.with_page_url(page_url);
    }

    Ok(track)
}

fn backend_error(query: &str, reason: impl ToString) -> ResolutionError {
    ResolutionError::Backend {
        query: query.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_terms_use_ytsearch() {
        assert_eq!(YtDlpResolver::target_for("  daft punk  "), "ytsearch1:daft punk");
        assert_eq!(
            YtDlpResolver::target_for("https://youtu.be/abc"),
            "https://youtu.be/abc"
        );
        assert_eq!(
            YtDlpResolver::target_for("www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn parses_a_single_video() {
        let json = br#"{
            "title": "Song One",
            "duration": 212.0,
            "url": "https://cdn.example/audio.webm",
            "webpage_url": "https://www.youtube.com/watch?v=1"
        }"#;

        let track = parse_info("song one", json).unwrap();
        assert_eq!(track.title, "Song One");
        assert_eq!(track.duration, Some(Duration::from_secs(212)));
        assert_eq!(track.stream_url, "https://cdn.example/audio.webm");
        assert_eq!(track.page_url.as_deref(), Some("https://www.youtube.com/watch?v=1"));
    }

    #[test]
    fn takes_the_first_search_entry() {
        let json = br#"{
            "title": "ytsearch1:song",
            "entries": [
                {"title": "First", "url": "https://cdn.example/1"},
                {"title": "Second", "url": "https://cdn.example/2"}
            ]
        }"#;

        let track = parse_info("song", json).unwrap();
        assert_eq!(track.title, "First");
        assert_eq!(track.duration, None);
    }

    #[test]
    fn empty_search_is_not_found() {
        let json = br#"{"title": "ytsearch1:nothing", "entries": []}"#;
        assert_eq!(
            parse_info("nothing", json),
            Err(ResolutionError::NotFound("nothing".to_string()))
        );
    }

    #[test]
    fn missing_stream_or_garbage_is_a_backend_error() {
        let no_stream = br#"{"title": "Live", "webpage_url": "https://x"}"#;
        assert!(matches!(
            parse_info("live", no_stream),
            Err(ResolutionError::Backend { .. })
        ));

        assert!(matches!(
            parse_info("junk", b"not json"),
            Err(ResolutionError::Backend { .. })
        ));
    }
}
