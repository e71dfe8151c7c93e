use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use songbird::driver::MixMode;

use crate::orchestrator::AdvancePolicy;

const TOKEN_CANDIDATES: &[&str] = &["DISCORD_TOKEN", "DISCORD_BOT_TOKEN", "BOT_TOKEN"];

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub database_url: String,
    pub music_folder: PathBuf,
    pub default_volume: i32,
    pub callback_timeout: Duration,
    pub advance_policy: AdvancePolicy,
    pub bitrate: i32,
    pub mix_mode: MixMode,
    pub http_bind: String,
}

impl Settings {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = TOKEN_CANDIDATES
            .iter()
            .find_map(|key| var(*key))
            .ok_or_else(|| anyhow!("Set one of {} in environment", TOKEN_CANDIDATES.join(", ")))?;

        let default_volume: i32 = parse_or(&var, "CARILLON_DEFAULT_VOLUME", 33)?;
        if !(0..=100).contains(&default_volume) {
            return Err(anyhow!("CARILLON_DEFAULT_VOLUME must be within 0..=100, got {default_volume}"));
        }

        let timeout_ms: u64 = parse_or(&var, "CARILLON_CALLBACK_TIMEOUT_MS", 10_000)?;
        if timeout_ms == 0 {
            return Err(anyhow!("CARILLON_CALLBACK_TIMEOUT_MS must be positive"));
        }

        let max_skips: u32 = parse_or(&var, "CARILLON_MAX_CONSECUTIVE_SKIPS", 10)?;
        let advance_policy = match var("CARILLON_ON_UNPLAYABLE").as_deref() {
            None | Some("skip") => AdvancePolicy::Skip {
                max_consecutive: (max_skips > 0).then_some(max_skips),
            },
            Some("halt") => AdvancePolicy::Halt,
            Some(other) => {
                return Err(anyhow!("CARILLON_ON_UNPLAYABLE must be skip or halt, got {other}"));
            }
        };

        let bitrate: i32 = parse_or(&var, "CARILLON_BITRATE", 96_000)?;
        if !(16_000..=192_000).contains(&bitrate) {
            return Err(anyhow!("CARILLON_BITRATE must be within 16000..=192000, got {bitrate}"));
        }

        let mix_mode = match var("CARILLON_MIX_MODE").as_deref() {
            None | Some("stereo") => MixMode::Stereo,
            Some("mono") => MixMode::Mono,
            Some(other) => {
                return Err(anyhow!("CARILLON_MIX_MODE must be mono or stereo, got {other}"));
            }
        };

        Ok(Self {
            token,
            database_url: var("DATABASE_URL").unwrap_or_else(|| "carillon.db".to_string()),
            music_folder: PathBuf::from(var("MUSIC_FOLDER").unwrap_or_else(|| "music".to_string())),
            default_volume,
            callback_timeout: Duration::from_millis(timeout_ms),
            advance_policy,
            bitrate,
            mix_mode,
            http_bind: var("CARILLON_HTTP_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}
