use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption,
};

use super::{defer, guild_of, reply_result, string_arg};
use crate::error::PlaybackError;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeChange {
    Set(i32),
    Adjust(i32),
}

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(
        CommandOptionType::String,
        "value",
        "Percent 0-100, or +n / -n; empty to show the current volume",
    )
    .required(false);
    CreateCommand::new("volume")
        .description("Show or change the playback volume")
        .add_option(opt)
}

pub async fn handle(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    defer(ctx, cmd).await;
    let guild_id = guild_of(cmd)?;
    let options = cmd.data.options();

    let result = match string_arg(&options, "value").map(parse_change) {
        None => Ok(format!(
            "Current volume is **{}%**",
            orchestrator.volume(guild_id).await
        )),
        Some(Ok(VolumeChange::Set(percent))) => {
            let now = orchestrator.set_volume(guild_id, percent).await;
            Ok(format!("Volume set to **{now}%**"))
        }
        Some(Ok(VolumeChange::Adjust(delta))) => {
            let now = orchestrator.adjust_volume(guild_id, delta).await;
            Ok(format!("Volume set to **{now}%**"))
        }
        Some(Err(e)) => Err(e),
    };
    reply_result(ctx, cmd, result).await
}

fn parse_change(raw: &str) -> Result<VolumeChange, PlaybackError> {
    let raw = raw.trim();
    let invalid = || PlaybackError::InvalidInput(format!("{raw} is not a volume"));
    let digits = |s: &str| {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            s.parse::<i32>().map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    };
    match raw.split_at_checked(1) {
        Some(("+", rest)) => digits(rest).map(VolumeChange::Adjust),
        Some(("-", rest)) => digits(rest).map(|n| VolumeChange::Adjust(-n)),
        _ => digits(raw).map(VolumeChange::Set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_absolute_and_relative_changes() {
        assert_eq!(parse_change("40").unwrap(), VolumeChange::Set(40));
        assert_eq!(parse_change("+15").unwrap(), VolumeChange::Adjust(15));
        assert_eq!(parse_change(" -5 ").unwrap(), VolumeChange::Adjust(-5));
        for bad in ["", "+", "loud", "+-3", "4.5", "99999999999"] {
            assert!(
                matches!(parse_change(bad), Err(PlaybackError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
