//! Product route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use duka_core::ProductId;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Record that a product page was viewed.
///
/// Answers immediately; the backend call runs in the background and its
/// outcome is never reported.
#[instrument(skip(state))]
pub async fn viewed(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    let product_id = ProductId::new(id);
    if product_id.is_blank() {
        return Err(AppError::BadRequest("Product id is required".to_string()));
    }
    state.backend().track_product_view(product_id);
    Ok(StatusCode::NO_CONTENT)
}
