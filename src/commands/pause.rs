use anyhow::Result;
use serenity::all::{CommandInteraction, Context as SerenityContext, CreateCommand};

use super::{defer, guild_of, reply_result};
use crate::orchestrator::Orchestrator;

pub fn pause_definition() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current track")
}

pub fn resume_definition() -> CreateCommand {
    CreateCommand::new("resume").description("Resume a paused track")
}

pub async fn handle_pause(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let result = orchestrator
        .pause(guild_id)
        .await
        .map(|track| format!("⏸️ Paused **{}**", track.name));
    reply_result(ctx, cmd, result).await
}

pub async fn handle_resume(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let result = orchestrator
        .resume(guild_id)
        .await
        .map(|track| format!("▶️ Resumed **{}**", track.name));
    reply_result(ctx, cmd, result).await
}
