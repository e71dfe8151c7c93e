use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption,
};

use super::{actor, defer, guild_of, integer_arg, reply_embed, reply_result, string_arg, subcommand};
use crate::catalog::TrackRef;
use crate::error::PlaybackError;
use crate::orchestrator::{Orchestrator, QueueLine, Removed};

const HISTORY_LIMIT: i64 = 15;

pub fn definition() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Manage the playback queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Append a track")
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "query",
                        "Catalog id, link or search terms",
                    )
                    .required(true),
                ),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "remove", "Remove a position")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Integer, "position", "1 is the head")
                        .min_int_value(1)
                        .required(true),
                ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "list",
            "Show the queue",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "clear",
            "Remove everything but the playing track",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "history",
            "Recently played tracks",
        ))
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let (action, args) = subcommand(cmd.data.options()).unwrap_or(("list", Vec::new()));

    let result = match action {
        "add" => {
            let query = string_arg(&args, "query").unwrap_or_default();
            match TrackRef::parse(query) {
                Ok(track_ref) => orchestrator
                    .enqueue(guild_id, &track_ref, &actor(ctx, cmd).name)
                    .await
                    .map(|enqueued| format!("**{}** added to queue", enqueued.track.name)),
                Err(e) => Err(e),
            }
        }
        "remove" => {
            let position = integer_arg(&args, "position").unwrap_or(0);
            match usize::try_from(position) {
                Ok(position) => orchestrator.remove(guild_id, position).await.map(|removed| match removed {
                    Removed::Dequeued { track, .. } => format!(
                        "**{}** removed from queue",
                        track.map(|t| t.name).unwrap_or_else(|| "Deleted track".to_string())
                    ),
                    Removed::Skipped { track } => format!("⏭️ Skipped **{}**", track.name),
                }),
                Err(_) => Err(PlaybackError::InvalidInput(format!("{position} is not a position"))),
            }
        }
        "clear" => orchestrator
            .clear_queue(guild_id)
            .await
            .map(|n| format!("Removed {n} track(s) from the queue")),
        "history" => {
            return match orchestrator.history(guild_id, HISTORY_LIMIT).await {
                Ok(records) => {
                    let body = records
                        .iter()
                        .map(|(record, track)| {
                            format!(
                                "{}  {} ({})",
                                record.played_at.format("%Y-%m-%d %H:%M"),
                                track.as_ref().map(|t| t.name.as_str()).unwrap_or("Deleted track"),
                                record.user_name
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    reply_embed(ctx, cmd, "History", or_empty(body)).await
                }
                Err(e) => reply_result(ctx, cmd, Err(e)).await,
            };
        }
        _ => {
            return match orchestrator.queue(guild_id).await {
                Ok(lines) => reply_embed(ctx, cmd, "Queue", or_empty(format_queue(&lines))).await,
                Err(e) => reply_result(ctx, cmd, Err(e)).await,
            };
        }
    };
    reply_result(ctx, cmd, result).await
}

fn format_queue(lines: &[QueueLine]) -> String {
    let width = lines.len().to_string().len();
    lines
        .iter()
        .map(|line| {
            let name = line
                .track
                .as_ref()
                .map(|t| t.name.as_str())
                .unwrap_or("Deleted track");
            let marker = if line.playing { "  ▶️" } else { "" };
            format!("{:>width$}.  {}{}", line.position, name, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_empty(body: String) -> String {
    if body.is_empty() {
        "Empty.".to_string()
    } else {
        body
    }
}
