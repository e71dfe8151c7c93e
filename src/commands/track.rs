use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption,
};

use super::{
    defer, guild_of, integer_arg, reply, reply_embed, reply_result, string_arg, subcommand,
};
use crate::catalog::TrackRef;
use crate::error::PlaybackError;
use crate::orchestrator::Orchestrator;

pub fn definition() -> CreateCommand {
    CreateCommand::new("track")
        .description("Manage the saved track catalog")
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Save a track")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "query", "Link or search terms")
                        .required(true),
                ),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "delete", "Delete a saved track")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Integer, "id", "Catalog id")
                        .required(true),
                ),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "list", "List saved tracks")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "keywords", "Filter by name")
                        .required(false),
                ),
        )
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    guild_of(cmd)?;
    let (action, args) = subcommand(cmd.data.options()).unwrap_or(("list", Vec::new()));

    let result = match action {
        "add" => match TrackRef::parse(string_arg(&args, "query").unwrap_or_default()) {
            Ok(track_ref) => orchestrator
                .add_track(&track_ref)
                .await
                .map(|track| format!("Saved **{}** as #{}", track.name, track.id)),
            Err(e) => Err(e),
        },
        "delete" => match integer_arg(&args, "id").and_then(|id| i32::try_from(id).ok()) {
            Some(id) => orchestrator
                .delete_track(id)
                .await
                .map(|()| format!("Deleted track #{id}")),
            None => Err(PlaybackError::InvalidInput("This is not id".to_string())),
        },
        _ => {
            let keywords: Vec<String> = string_arg(&args, "keywords")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            return match orchestrator.list_tracks(&keywords).await {
                Ok(tracks) if tracks.is_empty() => reply(ctx, cmd, "No saved tracks match.").await,
                Ok(tracks) => {
                    let body = tracks
                        .iter()
                        .map(|t| format!("`{:>4}`  {}", t.id, t.name))
                        .collect::<Vec<_>>()
                        .join("\n");
                    reply_embed(ctx, cmd, "Saved tracks", body).await
                }
                Err(e) => reply_result(ctx, cmd, Err(e)).await,
            };
        }
    };
    reply_result(ctx, cmd, result).await
}
