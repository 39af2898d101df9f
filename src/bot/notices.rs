use serenity::{builder::CreateMessage, http::Http};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::notice::{Notice, NoticeReceiver},
    ui::embeds,
};

/// Publica los avisos de los secuenciadores en el canal de texto de cada pedido
pub async fn forward(http: Arc<Http>, mut receiver: NoticeReceiver) {
    info!("📨 Reenvío de avisos iniciado");

    while let Some(notice) = receiver.recv().await {
        let Some(channel) = notice.channel() else {
            debug!("Aviso sin canal de respuesta: {:?}", notice);
            continue;
        };

        if let Err(e) = channel.send_message(&http, render(&notice)).await {
            warn!("No se pudo enviar aviso al canal {}: {:?}", channel, e);
        }
    }

    info!("📭 Reenvío de avisos terminado");
}

fn render(notice: &Notice) -> CreateMessage {
    match notice {
        Notice::NowPlaying {
            track,
            requested_by,
            ..
        } => CreateMessage::new().embed(embeds::create_now_playing_embed(track, *requested_by)),
        Notice::ResolutionFailed {
            requested_by,
            query,
            reason,
            ..
        } => CreateMessage::new()
            .content(format!("<@{}>", requested_by))
            .embed(embeds::create_warning_embed(
                "No se pudo reproducir",
                &format!("**{}**\n{}\n\n⏭️ Se pasó a la siguiente canción", query, reason),
            )),
        Notice::PlaybackFailed { title, reason, .. } => CreateMessage::new().embed(
            embeds::create_error_embed(
                "Error de reproducción",
                &format!("**{}** se interrumpió: {}\n\n📭 La cola quedó vacía", title, reason),
            ),
        ),
    }
}
