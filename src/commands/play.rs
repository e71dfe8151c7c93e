use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption,
};

use super::{actor, defer, describe_play, guild_of, reply_result, string_arg};
use crate::catalog::TrackRef;
use crate::orchestrator::Orchestrator;

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(
        CommandOptionType::String,
        "query",
        "Catalog id, link or search terms; empty to resume the queue",
    )
    .required(false);
    CreateCommand::new("play")
        .description("Play the queue, or play a track right away")
        .add_option(opt)
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let actor = actor(ctx, cmd);
    let options = cmd.data.options();

    let result = match string_arg(&options, "query") {
        Some(query) => match TrackRef::parse(query) {
            Ok(track_ref) => orchestrator
                .play_query(guild_id, &actor, &track_ref)
                .await
                .map(|(enqueued, outcome)| {
                    format!(
                        "**{}** added to queue\n{}",
                        enqueued.track.name,
                        describe_play(&outcome)
                    )
                }),
            Err(e) => Err(e),
        },
        None => orchestrator
            .play(guild_id, &actor)
            .await
            .map(|outcome| describe_play(&outcome)),
    };
    reply_result(ctx, cmd, result).await
}
