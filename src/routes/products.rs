use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::app_state::AppState;
use crate::db::queries;
use crate::routes::jobs::Pagination;
use crate::services::categories::CATEGORIES;

/// GET /v1/products — ledger entries, most recently collected first.
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limit = pagination.limit.unwrap_or(50).clamp(1, 200);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let total = queries::ledger_count(&state.db)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let entries = queries::list_ledger(&state.db, limit, offset)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(json!({
        "total": total,
        "limit": limit,
        "offset": offset,
        "count": entries.len(),
        "products": entries,
    })))
}

/// GET /v1/categories — the static collection taxonomy.
pub async fn list_categories() -> Json<serde_json::Value> {
    Json(json!({ "categories": CATEGORIES }))
}
