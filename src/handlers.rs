use crate::errors::AppError;
use crate::kpi::build_report;
use crate::models::{KpiReport, RefreshResponse, TodayResponse};
use crate::state::AppState;
use crate::storage::load_dataset;
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Optional RFC 3339 override of "now", for reproducible reports.
    pub now: Option<String>,
}

pub async fn get_kpis(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<KpiReport>, AppError> {
    let now = resolve_now(query.now.as_deref())?;
    let data = state.data.lock().await;
    Ok(Json(build_report(
        &data.quotes,
        &data.jobs,
        now,
        &state.config,
    )))
}

pub async fn get_today(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<TodayResponse>, AppError> {
    let now = resolve_now(query.now.as_deref())?;
    let data = state.data.lock().await;
    let report = build_report(&data.quotes, &data.jobs, now, &state.config);
    Ok(Json(TodayResponse {
        date: report.date,
        quotes_sent_today: report.quotes_sent_today,
        converted_today: report.converted_today,
        converted_amount_today: report.converted_amount_today,
    }))
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let fresh = load_dataset(&state.quotes_path, &state.jobs_path).await;
    let counts = RefreshResponse {
        quotes: fresh.quotes.len(),
        jobs: fresh.jobs.len(),
    };
    info!("refreshed dataset: {} quotes, {} jobs", counts.quotes, counts.jobs);
    *state.data.lock().await = fresh;
    Ok(Json(counts))
}

/// A malformed override is a caller bug, not a data-quality problem, so it
/// is rejected instead of being silently replaced with the clock.
fn resolve_now(raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    match raw {
        None => Ok(Utc::now()),
        Some(value) => DateTime::parse_from_rfc3339(value.trim())
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(|_| AppError::bad_request("now must be an RFC 3339 timestamp")),
    }
}
