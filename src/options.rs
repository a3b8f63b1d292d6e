use crate::error::AppError;
use crate::models::OptionInput;
use once_cell::sync::Lazy;
use regex::Regex;

/// Accepts "128", "128k", "128kbps" in any case.
static BITRATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\d+(k(bps)?)?$").unwrap());

/// Accepts "720" or "720p" in any case.
static RESOLUTION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\d+(p)?$").unwrap());

/// Fixed fallbacks and supported-format sets for both media kinds.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub audio_bitrate: &'static str,
    pub audio_format: &'static str,
    pub audio_formats: &'static [&'static str],
    pub video_resolution: &'static str,
    pub video_format: &'static str,
    pub video_formats: &'static [&'static str],
}

pub const DEFAULTS: Defaults = Defaults {
    audio_bitrate: "125kbps",
    audio_format: "mp3",
    audio_formats: &["mp3"],
    video_resolution: "360p",
    video_format: "mp4",
    video_formats: &["mp4"],
};

/// Strips everything but ASCII digits, e.g. "360p" -> "360".
pub fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Canonicalizes an audio bitrate to `<digits>kbps`. Any number is taken at
/// face value through digit extraction; falsy non-numbers fall back to the
/// default.
pub fn validate_audio_bitrate(
    input: Option<&OptionInput>,
    defaults: &Defaults,
) -> Result<String, AppError> {
    let Some(input) = input else {
        return Ok(defaults.audio_bitrate.to_string());
    };
    match input {
        OptionInput::Integer(n) => Ok(format!("{}kbps", n)),
        OptionInput::Float(v) => Ok(format!("{}kbps", digits(&v.to_string()))),
        OptionInput::Text(s) if s.is_empty() => Ok(defaults.audio_bitrate.to_string()),
        OptionInput::Text(s) => {
            if BITRATE_REGEX.is_match(s) {
                Ok(format!("{}kbps", digits(s)))
            } else {
                Err(AppError::InvalidOptionValue(format!(
                    "Audio quality \"{}\" must be valid vbr value",
                    s
                )))
            }
        }
        OptionInput::Other(_) if input.is_falsy() => Ok(defaults.audio_bitrate.to_string()),
        other => Err(AppError::InvalidOptionType(format!(
            "Audio quality must be a \"number\" or \"string\" received \"{}\"",
            other.type_name()
        ))),
    }
}

/// Checks an audio container against the supported set. Falsy inputs,
/// numeric zero included, read as "use the default".
pub fn validate_audio_format(
    input: Option<&OptionInput>,
    defaults: &Defaults,
) -> Result<String, AppError> {
    let Some(input) = input else {
        return Ok(defaults.audio_format.to_string());
    };
    if input.is_falsy() {
        return Ok(defaults.audio_format.to_string());
    }
    match input {
        OptionInput::Text(s) => {
            if defaults.audio_formats.contains(&s.as_str()) {
                Ok(s.clone())
            } else {
                Err(AppError::InvalidOptionValue(format!(
                    "Audio format \"{}\" not supported",
                    s
                )))
            }
        }
        other => Err(AppError::InvalidOptionType(format!(
            "Audio format must be a \"string\" received \"{}\"",
            other.type_name()
        ))),
    }
}

/// Canonicalizes a video resolution to `<digits>p`. Any number is taken at
/// face value through digit extraction; falsy non-numbers fall back to the
/// default.
pub fn validate_video_resolution(
    input: Option<&OptionInput>,
    defaults: &Defaults,
) -> Result<String, AppError> {
    let Some(input) = input else {
        return Ok(defaults.video_resolution.to_string());
    };
    match input {
        OptionInput::Integer(n) => Ok(format!("{}p", n)),
        OptionInput::Float(v) => Ok(format!("{}p", digits(&v.to_string()))),
        OptionInput::Text(s) if s.is_empty() => Ok(defaults.video_resolution.to_string()),
        OptionInput::Text(s) => {
            if RESOLUTION_REGEX.is_match(s) {
                Ok(format!("{}p", digits(s)))
            } else {
                Err(AppError::InvalidOptionValue(format!(
                    "Video resolution \"{}\" must be valid video quality",
                    s
                )))
            }
        }
        OptionInput::Other(_) if input.is_falsy() => Ok(defaults.video_resolution.to_string()),
        other => Err(AppError::InvalidOptionType(format!(
            "Video resolution must be a \"number\" or \"string\" received \"{}\"",
            other.type_name()
        ))),
    }
}

/// Checks a video container against the supported set. Falsy inputs,
/// numeric zero included, read as "use the default".
pub fn validate_video_format(
    input: Option<&OptionInput>,
    defaults: &Defaults,
) -> Result<String, AppError> {
    let Some(input) = input else {
        return Ok(defaults.video_format.to_string());
    };
    if input.is_falsy() {
        return Ok(defaults.video_format.to_string());
    }
    match input {
        OptionInput::Text(s) => {
            if defaults.video_formats.contains(&s.as_str()) {
                Ok(s.clone())
            } else {
                Err(AppError::InvalidOptionValue(format!(
                    "Video format \"{}\" not supported",
                    s
                )))
            }
        }
        other => Err(AppError::InvalidOptionType(format!(
            "Video format must be a \"string\" received \"{}\"",
            other.type_name()
        ))),
    }
}
