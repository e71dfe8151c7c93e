use std::sync::Arc;

use anyhow::Result;
use serenity::{
    all::{
        Command as AppCommand, Context as SerenityContext, GatewayIntents, Interaction,
        Permissions, Ready, VoiceState,
    },
    async_trait,
};
use songbird::{Config as VoiceConfig, Songbird, serenity::SerenityInit};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

mod bridge;
mod catalog;
mod commands;
mod config;
mod database;
mod error;
mod metrics;
mod orchestrator;
mod resolver;
mod session;
mod sink;
#[cfg(test)]
mod testing;
mod voice;
mod web;

use catalog::SqliteCatalog;
use config::Settings;
use error::GENERIC_FAILURE;
use metrics::METRICS;
use orchestrator::{Orchestrator, PlaybackOptions};
use resolver::YtDlpResolver;
use voice::SongbirdSink;

struct Handler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        let perms = Permissions::CONNECT | Permissions::SPEAK;
        if let Ok(app) = ctx.http.get_current_application_info().await {
            let invite = format!(
                "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
                app.id,
                perms.bits()
            );
            info!(
                "Invite this bot: {} (app_id={}, user_id={})",
                invite, app.id, ready.user.id
            );
        }

        for def in commands::definitions() {
            if let Err(e) = AppCommand::create_global_command(&ctx.http, def).await {
                error!("failed to register global command: {e:?}");
            }
        }
        METRICS.set_ready(true);
    }

    /// Someone (or Discord) disconnected the bot from voice.
    async fn voice_state_update(
        &self,
        ctx: SerenityContext,
        _old: Option<VoiceState>,
        new: VoiceState,
    ) {
        if new.user_id != ctx.cache.current_user().id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        if self.orchestrator.on_disconnected(guild_id).await {
            warn!(guild = %guild_id, "Disconnected from voice by an external action");
        }
    }

    async fn interaction_create(&self, ctx: SerenityContext, interaction: Interaction) {
        let Interaction::Command(cmd) = interaction else {
            return;
        };
        match commands::dispatch(&ctx, &cmd, &self.orchestrator).await {
            Ok(true) => {}
            Ok(false) => warn!(command = %cmd.data.name, "Unknown command"),
            Err(why) => {
                error!(
                    guild = ?cmd.guild_id,
                    command = %cmd.data.name,
                    "/{} failed: {:?}",
                    cmd.data.name,
                    why
                );
                commands::reply(&ctx, &cmd, GENERIC_FAILURE).await.ok();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let import_only = std::env::args().skip(1).any(|arg| arg == "--import");

    let catalog = Arc::new(SqliteCatalog::open(&settings.database_url)?);
    info!("Catalog database: {}", settings.database_url);

    // Tune Songbird to reduce chance of audio hiccups under load.
    // One track plays at a time, so two preallocated slots cover a handover.
    let voice_cfg = VoiceConfig::default()
        .preallocated_tracks(2)
        .use_softclip(false)
        .mix_mode(settings.mix_mode);
    let manager: Arc<Songbird> = Songbird::serenity_from_config(voice_cfg);

    let orchestrator = Orchestrator::new(
        catalog,
        Arc::new(YtDlpResolver::new()),
        Arc::new(SongbirdSink::new(manager.clone(), settings.bitrate)),
        Handle::current(),
        PlaybackOptions::from(&settings),
    );

    if import_only {
        let summary = orchestrator.import_directory(&settings.music_folder).await?;
        info!(
            "Import finished: {} added, {} duplicates",
            summary.added, summary.duplicates
        );
        return Ok(());
    }

    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = serenity::Client::builder(&settings.token, intents)
        .event_handler(Handler { orchestrator })
        .register_songbird_with(manager)
        .await?;

    let _http = web::spawn_http(settings.http_bind.clone())?;
    info!("Health endpoints on http://{}", settings.http_bind);
    info!("Commands: /play, /next, /stop, /pause, /resume, /volume, /queue, /track");

    if let Err(why) = client.start_autosharded().await {
        error!("Client error: {why:?}");
    }
    Ok(())
}
