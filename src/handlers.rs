use crate::{
    error::AppError,
    models::DlQuery,
    resolver::{MediaKind, Resolver},
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

// ===================================================================
//                          CONVERSION HANDLERS
// ===================================================================

/// # GET /dl/mp3 - Converts the given URL into an audio payload.
pub async fn dl_mp3(
    State(state): State<AppState>,
    Query(params): Query<DlQuery>,
) -> Result<Json<Value>, AppError> {
    convert(state, params, MediaKind::Audio).await
}

/// # GET /dl/mp4 - Converts the given URL into a video payload.
pub async fn dl_mp4(
    State(state): State<AppState>,
    Query(params): Query<DlQuery>,
) -> Result<Json<Value>, AppError> {
    convert(state, params, MediaKind::Video).await
}

/// Shared pipeline for both kinds: check the URL, validate format then
/// quality (format first), resolve, and shape the response per `full`.
async fn convert(state: AppState, params: DlQuery, kind: MediaKind) -> Result<Json<Value>, AppError> {
    let url = params.url.as_deref().unwrap_or("").trim().to_string();
    if url.is_empty() {
        return Err(AppError::InvalidOptionValue(
            "Undefined or missing media URL".to_string(),
        ));
    }
    tracing::info!("Processing {:?} request for URL: {}", kind, url);

    let resolver = Resolver::new(kind, url, state.config.clone())
        .format(params.format_input().as_ref())?
        .quality(params.quality_input().as_ref())?;

    let body = if params.wants_full() {
        resolver.full().await?
    } else {
        resolver.short().await?
    };
    Ok(Json(body))
}

// ===================================================================
//                          FALLBACK HANDLER
// ===================================================================

/// Any path outside the two conversion routes gets a bare 500.
pub async fn fallback() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}
