use axum::extract::Query;
use axum::Json;
use coach_core::progress::{days_elapsed, progress_percent, total_days};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    current_week: Option<u32>,
    #[serde(default)]
    current_day: Option<u32>,
    total_weeks: u32,
}

/// GET /api/progress: project a cursor onto a completion percentage.
pub async fn get_progress(
    Query(query): Query<ProgressQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let percent = progress_percent(query.current_week, query.current_day, query.total_weeks);
    let elapsed = match (query.current_week, query.current_day) {
        (Some(week), Some(day)) => days_elapsed(week, day),
        _ => 0,
    };
    Ok(Json(serde_json::json!({
        "progress_percent": percent,
        "days_elapsed": elapsed,
        "total_days": total_days(query.total_weeks),
    })))
}
