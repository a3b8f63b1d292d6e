use crate::models::MediaPayload;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// A conversion result with the media decoded back to raw bytes.
#[derive(Debug)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub length: u64,
    pub bitrate: String,
    pub size: String,
}

/// Small blocking client for the two conversion endpoints. Useful from
/// scripts and tests; not needed by the server itself.
pub struct GatewayClient {
    agent: ureq::Agent,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        GatewayClient {
            agent: ureq::AgentBuilder::new().build(),
            base_url: base_url.into(),
        }
    }

    /// Requests an mp3 conversion and decodes the returned payload.
    pub fn convert_audio(&self, media_url: &str) -> Result<FetchedMedia> {
        self.fetch("mp3", media_url)
    }

    /// Requests an mp4 conversion and decodes the returned payload.
    pub fn convert_video(&self, media_url: &str) -> Result<FetchedMedia> {
        self.fetch("mp4", media_url)
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/dl/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    fn fetch(&self, endpoint: &str, media_url: &str) -> Result<FetchedMedia> {
        let url = self.endpoint_url(endpoint);
        match self.agent.get(&url).query("url", media_url).call() {
            Ok(response) => {
                let payload: MediaPayload =
                    response.into_json().context("decoding media payload")?;
                let bytes = BASE64
                    .decode(payload.binary.as_bytes())
                    .context("decoding base64 media binary")?;
                Ok(FetchedMedia {
                    bytes,
                    length: payload.length,
                    bitrate: payload.bitrate,
                    size: payload.size,
                })
            }
            // The gateway reports every failure as a status with {message}.
            Err(ureq::Error::Status(code, response)) => {
                let message = response
                    .into_json::<serde_json::Value>()
                    .ok()
                    .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or_else(|| format!("HTTP {}", code));
                Err(anyhow!(message))
            }
            Err(e) => Err(anyhow!("request failed: {}", e)),
        }
    }
}
