use crate::config::Config;
use crate::error::AppError;
use crate::models::{MediaPayload, OptionInput};
use crate::options::{self, DEFAULTS};
use crate::reshape;
use crate::ytdlp;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::process::Command;

/// Which of the two pipelines a request runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Options as accumulated during fluent configuration; unset keys take
/// their defaults at resolve time.
#[derive(Debug)]
enum KindOptions {
    Audio {
        bitrate: Option<String>,
        format: Option<String>,
    },
    Video {
        resolution: Option<String>,
        format: Option<String>,
    },
}

/// Options after normalization; always fully populated.
enum ResolvedKind {
    Audio { bitrate: String, format: String },
    Video { resolution: String, format: String },
}

/// One media conversion request: probe, availability check (video),
/// download, read-back, cleanup.
#[derive(Debug)]
pub struct Resolver {
    url: String,
    options: KindOptions,
    config: Arc<Config>,
}

impl Resolver {
    pub fn new(kind: MediaKind, url: impl Into<String>, config: Arc<Config>) -> Self {
        let options = match kind {
            MediaKind::Audio => KindOptions::Audio {
                bitrate: None,
                format: None,
            },
            MediaKind::Video => KindOptions::Video {
                resolution: None,
                format: None,
            },
        };
        Resolver {
            url: url.into(),
            options,
            config,
        }
    }

    pub fn audio(url: impl Into<String>, config: Arc<Config>) -> Self {
        Self::new(MediaKind::Audio, url, config)
    }

    pub fn video(url: impl Into<String>, config: Arc<Config>) -> Self {
        Self::new(MediaKind::Video, url, config)
    }

    /// Validates and stores the container format. Absent or falsy input is
    /// left unset so normalization applies (and logs) the default.
    pub fn format(mut self, input: Option<&OptionInput>) -> Result<Self, AppError> {
        let Some(input) = input else { return Ok(self) };
        if input.is_falsy() {
            return Ok(self);
        }
        match &mut self.options {
            KindOptions::Audio { format, .. } => {
                *format = Some(options::validate_audio_format(Some(input), &DEFAULTS)?);
            }
            KindOptions::Video { format, .. } => {
                *format = Some(options::validate_video_format(Some(input), &DEFAULTS)?);
            }
        }
        Ok(self)
    }

    /// Validates and stores the quality (bitrate for audio, resolution for
    /// video). Falsy input is skipped like `format`, except numeric zero,
    /// which is still a quality and canonicalizes to "0kbps" or "0p".
    pub fn quality(mut self, input: Option<&OptionInput>) -> Result<Self, AppError> {
        let Some(input) = input else { return Ok(self) };
        let numeric = matches!(input, OptionInput::Integer(_) | OptionInput::Float(_));
        if input.is_falsy() && !numeric {
            return Ok(self);
        }
        match &mut self.options {
            KindOptions::Audio { bitrate, .. } => {
                *bitrate = Some(options::validate_audio_bitrate(Some(input), &DEFAULTS)?);
            }
            KindOptions::Video { resolution, .. } => {
                *resolution = Some(options::validate_video_resolution(Some(input), &DEFAULTS)?);
            }
        }
        Ok(self)
    }

    /// Resolves and returns the entire metadata envelope.
    pub async fn full(self) -> Result<Value, AppError> {
        Ok(Value::Object(self.resolve().await?))
    }

    /// Resolves and returns only the `media` payload.
    pub async fn short(self) -> Result<Value, AppError> {
        let envelope = self.resolve().await?;
        Ok(envelope.get("media").cloned().unwrap_or(Value::Null))
    }

    fn normalize(&self) -> ResolvedKind {
        match &self.options {
            KindOptions::Audio { bitrate, format } => ResolvedKind::Audio {
                bitrate: resolve_option("audio bitrate", bitrate, DEFAULTS.audio_bitrate),
                format: resolve_option("audio format", format, DEFAULTS.audio_format),
            },
            KindOptions::Video { resolution, format } => ResolvedKind::Video {
                resolution: resolve_option("video resolution", resolution, DEFAULTS.video_resolution),
                format: resolve_option("video format", format, DEFAULTS.video_format),
            },
        }
    }

    async fn resolve(self) -> Result<Map<String, Value>, AppError> {
        let resolved = self.normalize();

        let probe = ytdlp::invoke(&self.config.ytdlp_path, &probe_args(&self.url), true).await?;
        let raw: Value = serde_json::from_str(&probe.stdout)?;
        let mut envelope = reshape::reshape(raw)?;

        if let ResolvedKind::Video { resolution, .. } = &resolved {
            check_video_availability(envelope.get("formats"), resolution)?;
        }

        let output_path = match &resolved {
            ResolvedKind::Audio { .. } => self.config.audio_tmp.clone(),
            ResolvedKind::Video { .. } => self.config.video_tmp.clone(),
        };

        let args = download_args(&self.url, &resolved, &output_path);
        let download = ytdlp::invoke(&self.config.ytdlp_path, &args, false).await;
        if let Err(err) = &download {
            tracing::error!("download invocation failed: {}", err.message());
        }
        let file_present = tokio::fs::metadata(&output_path).await.is_ok();
        if download.is_err() || !file_present {
            return Err(AppError::Download("Something error, please try again".to_string()));
        }

        let media = read_media(&output_path).await?;

        tracing::info!("remove {}", output_path);
        if let Err(e) = tokio::fs::remove_file(&output_path).await {
            tracing::warn!("could not remove {}: {}", output_path, e);
        }

        envelope.insert("media".to_string(), serde_json::to_value(media)?);
        Ok(envelope)
    }
}

fn resolve_option(key: &str, explicit: &Option<String>, default: &str) -> String {
    match explicit {
        Some(value) => {
            tracing::info!("using override {} {}", key, value);
            value.clone()
        }
        None => {
            tracing::info!("using default {} {}", key, default);
            default.to_string()
        }
    }
}

fn probe_args(url: &str) -> Vec<String> {
    vec![url.to_string(), "-j".to_string()]
}

/// The tool's stream selector: prefer a video stream at the wanted height
/// merged with the worst audio; audio requests chain fallbacks so something
/// is always selected.
fn format_selector(kind: MediaKind, resolution_digits: &str) -> String {
    let mut selector = format!("wv*[height={}]+wa*", resolution_digits);
    if kind == MediaKind::Audio {
        selector.push_str("/ (wv*+ba*/w) / (bv*+ba*/b)");
    }
    selector
}

fn download_args(url: &str, resolved: &ResolvedKind, output_path: &str) -> Vec<String> {
    match resolved {
        ResolvedKind::Audio { bitrate, format } => vec![
            url.to_string(),
            "-f".to_string(),
            format_selector(MediaKind::Audio, &options::digits(DEFAULTS.video_resolution)),
            "-x".to_string(),
            "--audio-format".to_string(),
            format.clone(),
            "--audio-quality".to_string(),
            bitrate.clone(),
            "-o".to_string(),
            output_path.to_string(),
        ],
        ResolvedKind::Video { resolution, format } => vec![
            url.to_string(),
            "-f".to_string(),
            format_selector(MediaKind::Video, &options::digits(resolution)),
            "--recode-video".to_string(),
            format.clone(),
            "-o".to_string(),
            output_path.to_string(),
        ],
    }
}

/// Counts extension buckets holding at least one stream at the wanted
/// resolution; zero means the quality cannot be served.
fn buckets_with_resolution(formats: Option<&Value>, resolution_digits: &str) -> usize {
    formats
        .and_then(Value::as_object)
        .map(|by_ext| {
            by_ext
                .values()
                .filter(|by_res| {
                    by_res
                        .get(resolution_digits)
                        .and_then(Value::as_array)
                        .map_or(false, |bucket| !bucket.is_empty())
                })
                .count()
        })
        .unwrap_or(0)
}

fn check_video_availability(formats: Option<&Value>, resolution: &str) -> Result<(), AppError> {
    let digits = options::digits(resolution);
    let found = buckets_with_resolution(formats, &digits);
    tracing::info!("Found {} related videos with resolution/quality {}p", found, digits);
    if found == 0 {
        return Err(AppError::QualityUnavailable(format!(
            "Video quality \"{}p\" not available",
            digits
        )));
    }
    Ok(())
}

async fn read_media(path: &str) -> Result<MediaPayload, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let binary = if bytes.is_empty() {
        BASE64.encode([0u8])
    } else {
        BASE64.encode(&bytes)
    };
    Ok(MediaPayload {
        binary,
        length: bytes.len() as u64,
        bitrate: probe_bitrate(path).await,
        size: human_size(path).await,
    })
}

/// `du -h` first field, or "unknown".
async fn human_size(path: &str) -> String {
    let output = Command::new("du").arg("-h").arg(path).output().await;
    let Ok(output) = output else {
        return "unknown".to_string();
    };
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .next()
        .map(|field| field.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// ffprobe reports stream info on stderr; its summary line looks like
/// `Duration: 00:03:11.87, start: 0.0, bitrate: 128 kb/s`.
async fn probe_bitrate(path: &str) -> String {
    let output = Command::new("ffprobe").arg("-i").arg(path).output().await;
    let Ok(output) = output else {
        return "unknown".to_string();
    };
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .find(|line| line.contains("bitrate"))
        .and_then(|line| line.split_whitespace().nth(5))
        .map(|rate| format!("{}kbps", rate))
        .unwrap_or_else(|| "unknown".to_string())
}
