//! # Bot Module
//!
//! Discord front-end for Open Jukebox.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and handling ([`handlers`])
//! - Gateway events that affect playback (guild removal, forced voice disconnect)
//! - Delivery of sequencer notices to text channels ([`notices`])
//!
//! All playback decisions live in [`crate::audio`]; this layer only parses
//! interactions and renders replies.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Ready, UnavailableGuild, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notices;

use crate::{
    audio::{jukebox::Jukebox, notice::NoticeReceiver},
    config::Config,
    error::{CommandError, InvalidCommand},
};

/// Main Discord event handler.
pub struct JukeboxBot {
    config: Arc<Config>,
    pub jukebox: Arc<Jukebox>,
    /// Se consume en el primer `ready` para lanzar el reenvío de avisos
    notices: Mutex<Option<NoticeReceiver>>,
}

impl JukeboxBot {
    pub fn new(config: Config, jukebox: Arc<Jukebox>, notices: NoticeReceiver) -> Self {
        Self {
            config: Arc::new(config),
            jukebox,
            notices: Mutex::new(Some(notices)),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set, commands are registered only for that guild
    /// (instant propagation, meant for development); otherwise globally.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        // `ready` se repite en cada reconexión; el reenvío se lanza una sola vez
        if let Some(receiver) = self.notices.lock().await.take() {
            tokio::spawn(notices::forward(ctx.http.clone(), receiver));
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// El bot fue expulsado o la guild se borró. Una caída de Discord
    /// (`unavailable`) no cuenta: la guild volverá.
    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        if incomplete.unavailable {
            warn!("⚠️ Guild {} no disponible temporalmente, se conserva su cola", incomplete.id);
            return;
        }

        info!("🚪 Bot removido de guild {}", incomplete.id);
        self.jukebox.guild_left(incomplete.id).await;
    }

    /// Si alguien desconecta al bot a mano, se detiene la reproducción
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);
        match self.jukebox.stop(guild_id).await {
            Ok(()) => info!("⏹️ Cola de guild {} detenida tras la desconexión", guild_id),
            // Ya estaba detenido (p. ej. por /stop)
            Err(CommandError::Invalid(InvalidCommand::NotConnected)) => {
                debug!("Guild {} ya estaba detenida", guild_id)
            }
            Err(e) => error!("Error al detener reproducción: {:?}", e),
        }
    }
}
