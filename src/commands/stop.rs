use anyhow::Result;
use serenity::all::{CommandInteraction, Context as SerenityContext, CreateCommand};

use super::{defer, guild_of, reply_result};
use crate::orchestrator::Orchestrator;

pub fn definition() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and leave voice; the queue is kept")
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let result = orchestrator.stop(guild_id).await.map(|stopped| match stopped {
        Some(track) => format!("Stopped **{}** and disconnected.", track.name),
        None => "Disconnected.".to_string(),
    });
    reply_result(ctx, cmd, result).await
}
