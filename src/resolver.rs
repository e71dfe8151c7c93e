use std::{path::PathBuf, process::Stdio, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tokio::{fs, process::Command as TokioCommand, sync::OnceCell};
use tracing::{debug, info, warn};

use crate::catalog::TrackDraft;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("carillon/0.1 (+https://github.com/)")
        .build()
        .unwrap_or_default()
});

const GITHUB_RELEASES_API: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";

/// Prefer containers symphonia can demux before falling back to any audio.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio/best";

/// A playable description of a track. `source_uri` is short-lived and must
/// be re-resolved for every play.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub name: String,
    pub canonical_url: String,
    pub source_uri: String,
    pub duration: Option<Duration>,
}

impl ResolvedTrack {
    pub fn to_draft(&self) -> TrackDraft {
        TrackDraft {
            name: self.name.clone(),
            url: Some(self.canonical_url.clone()),
            filename: None,
            duration: self.duration.map(|d| d.as_secs() as i32),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("requested song is unavailable ({target}): {reason}")]
    Unavailable { target: String, reason: String },
}

/// Turns a URL or search terms into a playable track.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    fn validate(&self, url: &str) -> bool;
    async fn resolve(&self, url_or_query: &str) -> Result<ResolvedTrack, ResolveError>;
}

/// Resolver backed by the `yt-dlp` executable. Free text is searched on
/// YouTube and the first hit is taken.
#[derive(Debug, Default)]
pub struct YtDlpResolver {
    binary: OnceCell<PathBuf>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn binary(&self) -> Result<&PathBuf, ResolveError> {
        self.binary
            .get_or_try_init(ensure_yt_dlp)
            .await
            .map_err(|e| ResolveError::Unavailable {
                target: "yt-dlp".to_string(),
                reason: format!("{e:#}"),
            })
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    fn validate(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(parsed) => {
                matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
            }
            Err(_) => false,
        }
    }

    async fn resolve(&self, url_or_query: &str) -> Result<ResolvedTrack, ResolveError> {
        let target = if self.validate(url_or_query) {
            url_or_query.to_string()
        } else if url_or_query.contains("://") {
            return Err(ResolveError::InvalidSource(format!(
                "{url_or_query} is not an http(s) link"
            )));
        } else {
            format!("ytsearch1:{url_or_query}")
        };

        let ytdlp = self.binary().await?;
        debug!("Resolving {} with {}", target, ytdlp.display());
        let out = TokioCommand::new(ytdlp)
            .arg("-j")
            .arg("-f")
            .arg(AUDIO_FORMAT)
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(&target)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ResolveError::Unavailable {
                target: target.clone(),
                reason: format!("running yt-dlp: {e}"),
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(classify_failure(&target, stderr.trim()));
        }
        parse_info(&target, &String::from_utf8_lossy(&out.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    extractor_key: Option<String>,
}

fn parse_info(target: &str, stdout: &str) -> Result<ResolvedTrack, ResolveError> {
    let unavailable = |reason: String| ResolveError::Unavailable {
        target: target.to_string(),
        reason,
    };
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| unavailable("no results".to_string()))?;
    let info: YtDlpInfo =
        serde_json::from_str(line).map_err(|e| unavailable(format!("unreadable metadata: {e}")))?;

    let source_uri = info
        .url
        .ok_or_else(|| unavailable("no suitable audio format".to_string()))?;
    let canonical_url = match (info.extractor_key.as_deref(), info.webpage_url) {
        (Some("Youtube"), _) => format!("https://youtu.be/{}", info.id),
        (_, Some(page)) => page,
        (_, None) => target.to_string(),
    };
    Ok(ResolvedTrack {
        name: info.title,
        canonical_url,
        source_uri,
        duration: info
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64),
    })
}

fn classify_failure(target: &str, stderr: &str) -> ResolveError {
    if stderr.contains("Unsupported URL") || stderr.contains("is not a valid URL") {
        ResolveError::InvalidSource(format!("{target} is not supported"))
    } else {
        ResolveError::Unavailable {
            target: target.to_string(),
            reason: stderr.lines().last().unwrap_or("yt-dlp failed").to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    assets: Vec<ReleaseAsset>,
}

fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().ok_or_else(|| anyhow!("no cache dir available on this system"))?;
    Ok(base.join("carillon").join("yt-dlp"))
}

fn platform_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        if cfg!(target_arch = "x86_64") {
            "yt-dlp.exe"
        } else {
            "yt-dlp_x86.exe"
        }
    } else if cfg!(target_os = "linux") {
        "yt-dlp_linux"
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp"
    }
}

async fn ensure_yt_dlp() -> Result<PathBuf> {
    if let Ok(p) = which::which("yt-dlp") {
        return Ok(p);
    }

    let dir = cache_dir()?;
    fs::create_dir_all(&dir).await.ok();

    let local = dir.join(if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    });
    if fs::try_exists(&local).await.unwrap_or(false) {
        return Ok(local);
    }

    warn!("yt-dlp not found on PATH, downloading release into {}", dir.display());
    let resp = HTTP
        .get(GITHUB_RELEASES_API)
        .header(ACCEPT, "application/vnd.github+json")
        .send()
        .await?
        .error_for_status()?;
    let rel: ReleaseInfo = resp.json().await?;

    let wanted = platform_asset_name();
    let asset = rel
        .assets
        .into_iter()
        .find(|a| a.name == wanted)
        .ok_or_else(|| anyhow!("no suitable yt-dlp asset for this platform: {}", wanted))?;

    let bytes = HTTP
        .get(asset.browser_download_url)
        .header(USER_AGENT, "carillon/0.1")
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    fs::write(&local, &bytes).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&local).await?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&local, perms).await?;
    }
    info!("Installed yt-dlp at {}", local.display());
    Ok(local)
}
