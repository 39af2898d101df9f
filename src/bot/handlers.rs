use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::queue::TrackRequest,
    bot::JukeboxBot,
    error::{CommandError, InvalidCommand},
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply_error(ctx, &command, "Solo en servidores", "Este comando solo funciona dentro de un servidor").await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, guild_id, bot).await,
        "skip" => handle_skip(ctx, &command, guild_id, bot).await,
        "stop" => handle_stop(ctx, &command, guild_id, bot).await,
        "queue" => handle_queue(ctx, &command, guild_id, bot).await,
        "nowplaying" => handle_nowplaying(ctx, &command, guild_id, bot).await,
        "volume" => handle_volume(ctx, &command, guild_id, bot).await,
        "ping" => handle_ping(ctx, &command, bot).await,
        _ => reply_error(ctx, &command, "Comando no reconocido", "Usa uno de los comandos de la lista").await,
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let query = option_str(command, "query")
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Verificar que el usuario esté en un canal de voz
    let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => return reply_error(ctx, command, "Sin canal de voz", &e.to_string()).await,
    };

    let request = TrackRequest::new(query, command.user.id).with_reply_channel(command.channel_id);

    // La respuesta no espera a yt-dlp: el aviso de "reproduciendo" llega aparte
    match bot.jukebox.enqueue(guild_id, voice_channel_id, request).await {
        Ok(ack) => reply_embed(ctx, command, embeds::create_track_added_embed(query, ack)).await,
        Err(e) => reply_command_error(ctx, command, &e).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.jukebox.skip(guild_id).await {
        Ok(outcome) => {
            let description = if outcome.queue_empty {
                format!("**{}**\n\n📭 No quedan canciones en la cola", outcome.skipped)
            } else {
                format!("**{}**", outcome.skipped)
            };
            reply_embed(ctx, command, embeds::create_success_embed("Saltada", &description)).await
        }
        Err(e) => reply_command_error(ctx, command, &e).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.jukebox.stop(guild_id).await {
        Ok(()) => {
            reply_embed(
                ctx,
                command,
                embeds::create_success_embed("Detenido", "⏹️ Reproducción detenida y cola limpiada"),
            )
            .await
        }
        Err(e) => reply_command_error(ctx, command, &e).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let page = option_i64(command, "page").unwrap_or(1).max(1) as usize;
    let page_size = bot.config.queue_page_size;

    // Pedir hasta el final de la página; el resto se informa como "y N más"
    let peek = bot.jukebox.peek(guild_id, page * page_size).await;
    let current = bot.jukebox.now_playing(guild_id).await;

    let embed = embeds::create_queue_embed(current.as_ref(), &peek, page, page_size);
    reply_embed(ctx, command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.jukebox.now_playing(guild_id).await {
        Some(now) => reply_embed(ctx, command, embeds::create_now_playing_status_embed(&now)).await,
        None => reply_command_error(ctx, command, &InvalidCommand::NothingPlaying.into()).await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(level) = option_i64(command, "level") else {
        // Sin argumento: mostrar el volumen actual
        let current = bot
            .jukebox
            .snapshot(guild_id)
            .await
            .map_or(bot.config.default_volume, |snapshot| snapshot.volume);
        return reply_embed(ctx, command, embeds::create_volume_embed(current)).await;
    };

    let volume = level as f32 / 100.0;
    match bot.jukebox.set_volume(guild_id, volume).await {
        Ok(()) => reply_embed(ctx, command, embeds::create_volume_embed(volume)).await,
        Err(e) => reply_command_error(ctx, command, &e).await,
    }
}

async fn handle_ping(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let content = format!(
        "🏓 Pong! ({} guilds con cola activa)",
        bot.jukebox.active_guilds()
    );

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Canal de voz donde está el usuario, según la caché
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

async fn reply_error(
    ctx: &Context,
    command: &CommandInteraction,
    title: &str,
    description: &str,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_error_embed(title, description))
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

/// Los comandos inválidos se contestan solo a quien los usó
async fn reply_command_error(
    ctx: &Context,
    command: &CommandInteraction,
    error: &CommandError,
) -> Result<()> {
    let title = match error {
        CommandError::Invalid(InvalidCommand::NothingPlaying) => "Nada sonando",
        CommandError::Invalid(InvalidCommand::NotConnected) => "Sin conexión",
        CommandError::Invalid(InvalidCommand::VolumeOutOfRange(_)) => "Volumen inválido",
        CommandError::Invalid(InvalidCommand::QueueFull(_)) => "Cola llena",
        CommandError::Connect(_) => "No pude entrar al canal",
        CommandError::Unavailable => "Cola no disponible",
    };

    reply_error(ctx, command, title, &error.to_string()).await
}
