use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use open_jukebox::{
    audio::{jukebox::Jukebox, notice, voice::SongbirdVoice},
    bot::JukeboxBot,
    config::Config,
    sources::YtDlpResolver,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    let resolver = Arc::new(YtDlpResolver::new(
        &config.ytdlp_path,
        config.max_concurrent_resolves,
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&resolver).await;
    }

    info!("{}", config.summary());

    // Solo guilds y estados de voz: los comandos llegan como interacciones
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let (notices, notice_rx) = notice::channel();
    let jukebox = Arc::new(Jukebox::new(
        Arc::new(SongbirdVoice::new(songbird.clone(), reqwest::Client::new())),
        resolver,
        config.sequencer_settings(),
        Some(notices),
    ));

    // Crear handler del bot
    let handler = JukeboxBot::new(config.clone(), jukebox.clone(), notice_rx);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        jukebox.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(resolver: &YtDlpResolver) -> Result<()> {
    // Verificar dependencias críticas
    let version = resolver.verify().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
