//! Historical price data handler
//!
//! GET /api/cryptocurrencies/{id}/historical endpoint.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{error, info};

use crate::AppState;
use crate::models::historical::{ErrorResponse, HistoricalDataQuery, SeriesResult, TimeRange};

/// GET /api/cryptocurrencies/{id}/historical
///
/// # Query Parameters
/// - `timeRange`: 1h, 1d, 7d, 30d, 90d, 365d (anything else falls back to 7d)
/// - `convert`: currency code (default: USD)
///
/// # Response
/// - 200: Series data, stored or synthetic (see `metadata.source`)
/// - 500: Storage failure
pub async fn get_historical_data(
    State(state): State<AppState>,
    Path(asset_id): Path<i64>,
    Query(query): Query<HistoricalDataQuery>,
) -> Result<Json<SeriesResult>, (StatusCode, Json<ErrorResponse>)> {
    let time_range = TimeRange::parse(&query.time_range);

    info!(
        asset_id,
        time_range = time_range.as_str(),
        convert = %query.convert,
        "Fetching historical data"
    );

    let result = state
        .historical
        .get_historical_data(asset_id, time_range, &query.convert)
        .await
        .map_err(|e| {
            error!(asset_id, error = %e, "Failed to fetch historical data");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to fetch historical data: {}", e),
                }),
            )
        })?;

    Ok(Json(result))
}
