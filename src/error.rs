use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

// Everything a resolve pipeline can fail with.
#[derive(Debug)]
pub enum AppError {
    /// An option had the wrong type entirely (e.g. a boolean quality).
    InvalidOptionType(String),
    /// An option had the right type but an unacceptable value.
    InvalidOptionValue(String),
    /// The external tool exited badly; carries one cleaned stderr line.
    Tool(String),
    /// The requested video resolution has no matching stream.
    QualityUnavailable(String),
    /// The download invocation failed or left no file behind.
    Download(String),
    /// IO, JSON parsing, and other plumbing failures.
    Internal(anyhow::Error),
}

impl AppError {
    /// The message string exposed to the client.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidOptionType(m)
            | AppError::InvalidOptionValue(m)
            | AppError::Tool(m)
            | AppError::QualityUnavailable(m)
            | AppError::Download(m) => m.clone(),
            AppError::Internal(e) => e.to_string(),
        }
    }
}

// Every failure becomes the same 400 `{message}` shape; the client is not
// told whether its request was bad or the tool fell over.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            tracing::error!("internal error surfaced to client: {:?}", e);
        }
        let body = Json(json!({ "message": self.message() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

// Lets `?` lift IO, JSON, and any other std error into `Internal`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_400() {
        let errors = [
            AppError::InvalidOptionType("t".into()),
            AppError::InvalidOptionValue("v".into()),
            AppError::Tool("x".into()),
            AppError::QualityUnavailable("q".into()),
            AppError::Download("d".into()),
            AppError::Internal(anyhow::anyhow!("boom")),
        ];
        for err in errors {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn message_passes_through_unchanged() {
        let err = AppError::Tool("Unsupported URL".into());
        assert_eq!(err.message(), "Unsupported URL");
    }

    #[test]
    fn internal_message_is_the_stringified_error() {
        let err = AppError::Internal(anyhow::anyhow!("expected JSON object"));
        assert_eq!(err.message(), "expected JSON object");
    }
}
