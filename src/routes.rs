use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthContext,
    dates::DateWindow,
    error::{ApiError, StoreError},
    metrics,
    models::{Incident, MetricsReport, NewIncident, NewRelease, Release, ReleasePatch, VolumePoint},
    AppContext,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseQuery {
    platform: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl ReleaseQuery {
    fn platform(&self) -> Option<&str> {
        self.platform.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    fn window(&self) -> Result<DateWindow, ApiError> {
        DateWindow::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

#[derive(Serialize)]
pub struct Message {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

impl Message {
    fn ok(message: &'static str) -> Json<Self> {
        Json(Self { message, id: None })
    }

    fn created(message: &'static str, id: i64) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Json(Self { message, id: Some(id) }))
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_metrics(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    query: Result<Query<ReleaseQuery>, QueryRejection>,
) -> Result<Json<MetricsReport>, ApiError> {
    let Query(query) = query?;
    let window = query.window()?;
    let range = metrics::fetch_range(&window, ctx.metrics.trend_lookback_days);

    let releases = ctx.store.find_releases(query.platform(), range.start, range.end).await?;
    let ids: Vec<i64> = releases.iter().map(|r| r.id).collect();
    let incidents = ctx.store.find_incidents(&ids).await?;

    tracing::debug!(
        user = %auth.username,
        platform = query.platform().unwrap_or("*"),
        fetched = releases.len(),
        "metrics requested"
    );
    Ok(Json(metrics::compute_report(&releases, &incidents, &window)))
}

pub async fn deployment_volume(
    ctx: Extension<AppContext>,
    _auth: AuthContext,
    query: Result<Query<ReleaseQuery>, QueryRejection>,
) -> Result<Json<Vec<VolumePoint>>, ApiError> {
    let Query(query) = query?;
    let window = query.window()?;
    let releases = ctx.store.find_releases(query.platform(), window.start, window.end).await?;
    Ok(Json(metrics::deployment_volume(&releases, &window)))
}

pub async fn list_releases(
    ctx: Extension<AppContext>,
    _auth: AuthContext,
    query: Result<Query<ReleaseQuery>, QueryRejection>,
) -> Result<Json<Vec<Release>>, ApiError> {
    let Query(query) = query?;
    let window = query.window()?;
    let releases = ctx.store.find_releases(query.platform(), window.start, window.end).await?;
    Ok(Json(releases))
}

pub async fn add_release(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    body: Result<Json<NewRelease>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    auth.require_write()?;
    let Json(body) = body?;
    if body.platform.trim().is_empty() {
        return Err(ApiError::validation("platform is required"));
    }

    let release = ctx.store.create_release(body).await?;
    tracing::info!(id = release.id, platform = %release.platform, version = %release.version, user = %auth.username, "release added");
    Ok(Message::created("Release added", release.id))
}

pub async fn update_release(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ReleasePatch>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    auth.require_write()?;
    let Path(id) = id?;
    let Json(patch) = body?;
    if patch.platform.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(ApiError::validation("platform is required"));
    }

    ctx.store.update_release(id, patch).await?;
    tracing::info!(id, user = %auth.username, "release updated");
    Ok(Message::ok("Release updated successfully"))
}

pub async fn delete_release(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    auth.require_write()?;
    let Path(id) = id?;
    ctx.store.delete_release(id).await?;
    tracing::info!(id, user = %auth.username, "release deleted");
    Ok(Message::ok("Release deleted successfully"))
}

pub async fn release_incidents(
    ctx: Extension<AppContext>,
    _auth: AuthContext,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Incident>>, ApiError> {
    let Path(id) = id?;
    if ctx.store.get_release(id).await?.is_none() {
        return Err(StoreError::release_not_found(id).into());
    }
    Ok(Json(ctx.store.find_incidents(&[id]).await?))
}

pub async fn add_incident(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    body: Result<Json<NewIncident>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    auth.require_write()?;
    let Json(body) = body?;
    if let (Some(start), Some(end)) = (body.start_time, body.end_time) {
        if end < start {
            return Err(ApiError::validation("end_time must not be before start_time"));
        }
    }

    let incident = ctx.store.create_incident(body).await?;
    tracing::info!(id = incident.id, release_id = incident.release_id, user = %auth.username, "incident added");
    Ok(Message::created("Incident added", incident.id))
}

pub async fn delete_incident(
    ctx: Extension<AppContext>,
    auth: AuthContext,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    auth.require_write()?;
    let Path(id) = id?;
    ctx.store.delete_incident(id).await?;
    tracing::info!(id, user = %auth.username, "incident deleted");
    Ok(Message::ok("Incident deleted successfully"))
}
