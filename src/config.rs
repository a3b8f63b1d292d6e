use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Everything the resolve pipeline needs from the outside: where the
/// downloader binary lives and where the two temp files go.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Path of the external downloader binary. Resolved via PATH when bare.
    pub ytdlp_path: String,
    /// Where audio downloads are materialized before being read back.
    pub audio_tmp: String,
    /// Where video downloads are materialized before being read back.
    pub video_tmp: String,
}

impl Default for Config {
    fn default() -> Self {
        // The temp file names carry the target container extension so the
        // tool's post-processing step writes to exactly this path.
        let tmp = std::env::temp_dir();
        Config {
            ytdlp_path: "yt-dlp".to_string(),
            audio_tmp: tmp.join("yt_dlp_gateway-audio.mp3").to_string_lossy().to_string(),
            video_tmp: tmp.join("yt_dlp_gateway-video.mp4").to_string_lossy().to_string(),
        }
    }
}

/// Platform location of `config.toml`, creating the directory on first use.
async fn config_file_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "YourOrg", "YT-DLP-Gateway")
        .ok_or_else(|| anyhow!("no usable home directory for configuration"))?;
    fs::create_dir_all(dirs.config_dir()).await?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Reads the configuration file, writing a default one on first run, then
/// lets the environment override individual fields.
pub async fn load_config() -> Result<Config> {
    let path = config_file_path().await?;

    let mut config = match fs::read_to_string(&path).await {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("unparseable config file at {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("writing a default config to {}", path.display());
            let config = Config::default();
            save_config(&config).await?;
            config
        }
        Err(e) => return Err(e.into()),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Environment variables win over the config file. `get` is injected so the
/// override logic stays testable without touching the process environment.
pub fn apply_env_overrides(config: &mut Config, get: impl Fn(&str) -> Option<String>) {
    if let Some(path) = get("YTDLP") {
        config.ytdlp_path = path;
    }
    if let Some(path) = get("AUDIO_TMP") {
        config.audio_tmp = path;
    }
    if let Some(path) = get("VIDEO_TMP") {
        config.video_tmp = path;
    }
}

/// Persists the configuration as pretty TOML.
pub async fn save_config(config: &Config) -> Result<()> {
    let path = config_file_path().await?;
    fs::write(path, toml::to_string_pretty(config)?).await?;
    Ok(())
}
