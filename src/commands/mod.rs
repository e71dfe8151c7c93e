use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse, GuildId,
    ResolvedOption, ResolvedValue,
};
use tracing::{debug, error};

use crate::error::PlaybackError;
use crate::orchestrator::{Actor, AdvanceOutcome, AdvanceReport, Orchestrator, PlayOutcome};

pub mod next;
pub mod pause;
pub mod play;
pub mod queue;
pub mod stop;
pub mod track;
pub mod volume;

/// Embed descriptions are capped by Discord.
const EMBED_LIMIT: usize = 4000;

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        play::definition(),
        next::definition(),
        stop::definition(),
        pause::pause_definition(),
        pause::resume_definition(),
        volume::definition(),
        queue::definition(),
        track::definition(),
    ]
}

/// Routes a slash command. Returns `Ok(false)` for unknown commands.
pub async fn dispatch(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<bool> {
    match cmd.data.name.as_str() {
        "play" => play::handle(ctx, cmd, orchestrator).await?,
        "next" => next::handle(ctx, cmd, orchestrator).await?,
        "stop" => stop::handle(ctx, cmd, orchestrator).await?,
        "pause" => pause::handle_pause(ctx, cmd, orchestrator).await?,
        "resume" => pause::handle_resume(ctx, cmd, orchestrator).await?,
        "volume" => volume::handle(ctx, cmd, orchestrator).await?,
        "queue" => queue::handle(ctx, cmd, orchestrator).await?,
        "track" => track::handle(ctx, cmd, orchestrator).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

pub(crate) async fn defer(ctx: &SerenityContext, cmd: &CommandInteraction) {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();
}

pub(crate) fn guild_of(cmd: &CommandInteraction) -> Result<GuildId> {
    cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))
}

pub(crate) async fn reply(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

pub(crate) async fn reply_embed(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    title: &str,
    body: String,
) -> Result<()> {
    let embed = CreateEmbed::new()
        .title(title)
        .description(truncate(body))
        .colour(0x078546);
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embeds(vec![embed]))
        .await?;
    Ok(())
}

/// Replies with the outcome, or with the error's user message. Errors
/// without a message of their own are logged with full context.
pub(crate) async fn reply_result(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    result: Result<String, PlaybackError>,
) -> Result<()> {
    let text = match result {
        Ok(text) => text,
        Err(err) => {
            let guild = cmd.guild_id.map(|g| g.to_string()).unwrap_or_default();
            match &err {
                PlaybackError::StorageFailure(_) | PlaybackError::CallbackTimeout { .. } => {
                    error!(guild = %guild, command = %cmd.data.name, "Command failed: {:?}", err)
                }
                _ => debug!(guild = %guild, command = %cmd.data.name, "Command rejected: {}", err),
            }
            err.user_message()
        }
    };
    reply(ctx, cmd, text).await
}

/// The invoking member, named by guild nickname when set, and the voice
/// channel they are in.
pub(crate) fn actor(ctx: &SerenityContext, cmd: &CommandInteraction) -> Actor {
    let name = cmd
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_else(|| cmd.user.name.clone());
    let voice_channel = cmd.guild_id.and_then(|guild_id| {
        let guild = ctx.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&cmd.user.id)
            .and_then(|vs| vs.channel_id)
    });
    Actor {
        name,
        voice_channel,
    }
}

pub(crate) fn string_arg<'a>(options: &[ResolvedOption<'a>], name: &str) -> Option<&'a str> {
    options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        ResolvedValue::String(s) => Some(*s),
        _ => None,
    })
}

pub(crate) fn integer_arg(options: &[ResolvedOption<'_>], name: &str) -> Option<i64> {
    options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        ResolvedValue::Integer(n) => Some(*n),
        _ => None,
    })
}

/// Splits `/cmd sub ...` into the subcommand name and its options.
pub(crate) fn subcommand<'a>(options: Vec<ResolvedOption<'a>>) -> Option<(&'a str, Vec<ResolvedOption<'a>>)> {
    options.into_iter().find_map(|o| match o.value {
        ResolvedValue::SubCommand(args) => Some((o.name, args)),
        _ => None,
    })
}

pub(crate) fn describe_play(outcome: &PlayOutcome) -> String {
    match outcome {
        PlayOutcome::NothingToPlay => "Nothing to play ¯\\_(ツ)_/¯".to_string(),
        PlayOutcome::AlreadyPlaying => "Already playing.".to_string(),
        PlayOutcome::Advanced(report) => describe_advance(report),
    }
}

pub(crate) fn describe_advance(report: &AdvanceReport) -> String {
    let mut lines: Vec<String> = report
        .skipped
        .iter()
        .map(|s| format!("Skipped queue entry {}: {}", s.entry.id, s.error.user_message()))
        .collect();
    lines.push(match &report.outcome {
        AdvanceOutcome::Started { track, .. } => format!("Playing **{}**", track.name),
        AdvanceOutcome::Exhausted => "Queue finished.".to_string(),
        AdvanceOutcome::Halted => "Playback stopped at an unplayable track.".to_string(),
        AdvanceOutcome::Cancelled => "Playback was stopped.".to_string(),
        AdvanceOutcome::AlreadyPlaying => "Already playing.".to_string(),
    });
    lines.join("\n")
}

fn truncate(mut body: String) -> String {
    if body.len() > EMBED_LIMIT {
        let mut cut = EMBED_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
