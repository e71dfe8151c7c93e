use anyhow::Result;
use serenity::all::{CommandInteraction, Context as SerenityContext, CreateCommand};

use super::{defer, guild_of, reply_result};
use crate::orchestrator::Orchestrator;

pub fn definition() -> CreateCommand {
    CreateCommand::new("next").description("Skip to the next queued track")
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let result = orchestrator
        .skip(guild_id)
        .await
        .map(|track| format!("⏭️ Skipped **{}**", track.name));
    reply_result(ctx, cmd, result).await
}
