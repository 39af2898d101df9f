use serenity::{
    all::{Timestamp, UserId},
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::sequencer::{EnqueueAck, NowPlaying, QueuePeek},
    sources::ResolvedTrack,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Jukebox";

/// Largo máximo de un título/query dentro de una lista
const MAX_LINE_TITLE: usize = 80;

/// Crea un embed para anunciar la canción que empezó a sonar
pub fn create_now_playing_embed(track: &ResolvedTrack, requested_by: UserId) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::MUSIC_PURPLE);

    if let Some(duration) = track.duration {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    embed = embed.field("👤 Solicitado por", format!("<@{}>", requested_by), true);

    if let Some(page_url) = &track.page_url {
        embed = embed.url(page_url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Igual que el anuncio, con tiempo transcurrido y volumen (para `/nowplaying`)
pub fn create_now_playing_status_embed(now: &NowPlaying) -> CreateEmbed {
    let elapsed = (chrono::Utc::now() - now.started_at)
        .to_std()
        .unwrap_or_default();
    // Redondear a segundos para que humantime no imprima milisegundos
    let elapsed = Duration::from_secs(elapsed.as_secs());

    create_now_playing_embed(&now.track, now.requested_by)
        .field("⏳ Transcurrido", humantime::format_duration(elapsed).to_string(), true)
        .field("🔊 Volumen", format!("{}%", volume_percent(now.volume)), true)
}

/// Respuesta inmediata de `/play`; la canción todavía no está resuelta
pub fn create_track_added_embed(query: &str, ack: EnqueueAck) -> CreateEmbed {
    let (title, footer) = match ack {
        EnqueueAck::Starting => (
            "▶️ Preparando Reproducción".to_string(),
            "🎵 Sonará en cuanto termine la búsqueda".to_string(),
        ),
        EnqueueAck::Queued { position } => (
            format!("✅ Agregada a la Cola (#{})", position),
            "🎵 Se reproducirá automáticamente cuando llegue su turno".to_string(),
        ),
    };

    CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", truncate(query, MAX_LINE_TITLE)))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(footer))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(
    current: Option<&NowPlaying>,
    peek: &QueuePeek,
    page: usize,
    page_size: usize,
) -> CreateEmbed {
    let total = peek.entries.len() + peek.remaining;

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if current.is_none() && total == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(now) = current {
        embed = embed.field(
            "▶️ Reproduciendo",
            format!(
                "**{}** • <@{}>",
                truncate(&now.track.title, MAX_LINE_TITLE),
                now.requested_by
            ),
            false,
        );
    }

    let lines = format_queue_page(peek, page, page_size);
    if !lines.is_empty() {
        embed = embed.field("Próximas canciones", lines, false);
    }

    embed = embed.field("Información", format!("**Total:** {} en espera", total), false);

    let total_pages = total.div_ceil(page_size.max(1)).max(1);
    let footer = if total_pages > 1 {
        format!("Página {} de {} • Open Jukebox", page, total_pages)
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Líneas de una página de la cola. `peek` debe cubrir hasta el final de la página.
pub fn format_queue_page(peek: &QueuePeek, page: usize, page_size: usize) -> String {
    let start = page.saturating_sub(1) * page_size;

    let mut lines: Vec<String> = peek
        .entries
        .iter()
        .enumerate()
        .skip(start)
        .map(|(i, entry)| {
            format!(
                "**{}**. {} • <@{}>",
                i + 1,
                truncate(&entry.query, MAX_LINE_TITLE),
                entry.requested_by
            )
        })
        .collect();

    if peek.remaining > 0 {
        lines.push(format!("… y {} más", peek.remaining));
    }

    lines.join("\n")
}

/// Crea un embed de volumen con indicador visual
pub fn create_volume_embed(volume: f32) -> CreateEmbed {
    let percent = volume_percent(volume);
    let status_emoji = match percent {
        0 => "🔈",
        1..=50 => "🔉",
        _ => "🔊",
    };

    CreateEmbed::default()
        .title(format!("{} Control de Volumen", status_emoji))
        .description(format!("**Volumen actual: {}%**", percent))
        .field("📊 Nivel", create_volume_bar(volume), false)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("💡 Usa /volume <0-100> para ajustar"))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de advertencia
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn volume_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Crea una barra visual de volumen
fn create_volume_bar(volume: f32) -> String {
    let segments = 20;
    let filled = ((volume.clamp(0.0, 1.0) * segments as f32) as usize).min(segments);
    let empty = segments - filled;

    let bar = "█".repeat(filled) + &"▒".repeat(empty);
    format!("`[{}]`", bar)
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sequencer::PendingEntry;
    use pretty_assertions::assert_eq;

    fn peek(queries: &[&str], remaining: usize) -> QueuePeek {
        QueuePeek {
            entries: queries
                .iter()
                .map(|q| PendingEntry {
                    query: q.to_string(),
                    requested_by: UserId::new(5),
                })
                .collect(),
            remaining,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(213)), "3:33");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn queue_page_lists_entries_and_rest() {
        let text = format_queue_page(&peek(&["uno", "dos"], 4), 1, 10);
        assert_eq!(text, "**1**. uno • <@5>\n**2**. dos • <@5>\n… y 4 más");
    }

    #[test]
    fn second_page_keeps_global_positions() {
        let text = format_queue_page(&peek(&["a", "b", "c"], 0), 2, 2);
        assert_eq!(text, "**3**. c • <@5>");
    }

    #[test]
    fn long_queries_are_truncated() {
        let long = "x".repeat(200);
        let short = truncate(&long, 10);
        assert_eq!(short.chars().count(), 10);
        assert!(short.ends_with('…'));
        assert_eq!(truncate("corto", 10), "corto");
    }

    #[test]
    fn volume_bar_fills_proportionally() {
        assert_eq!(create_volume_bar(0.0), format!("`[{}]`", "▒".repeat(20)));
        assert_eq!(create_volume_bar(1.0), format!("`[{}]`", "█".repeat(20)));
        assert_eq!(volume_percent(0.55), 55);
    }
}
