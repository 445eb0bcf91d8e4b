// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Lustre HTTP API
//!
//! Axum router for the quota endpoints. Every response, success or error,
//! uses the dashboard envelope:
//!
//! ```json
//! {"count": 0, "previous": "", "next": "", "results": null, "detail": ""}
//! ```
//!
//! | Method | Path (under `/api/v1/{cluster}/lustre`) | Handler |
//! |--------|------------------------------------------|---------|
//! | GET | `/quotas?user=..&user=..&paging=&page=&page_size=` | [`list_quotas`] |
//! | PUT | `/{user}/quota` | [`update_user_quota`] |
//! | PUT | `/quota` | [`update_default_quota`] |
//! | GET | `/quota/applications?name=..` | [`list_applications`] |
//! | POST | `/quota/application` | [`create_application`] |
//! | PUT / DELETE | `/quota/application/{id}` | [`update_application`], [`delete_application`] |
//! | GET | `/quota/application/{id}/decision` | [`application_decision`] |
//! | POST | `/quota/application/{id}/review` | [`review_application`] |

use crate::application::{
    ApplicationService, QuotaAggregator, QuotaUpdateService, ReviewProcessor, ReviewRequest,
};
use crate::domain::application::{ApplicationId, QuotaApplication};
use crate::domain::error::OpsError;
use crate::domain::node_config::PagingConfig;
use crate::domain::paging::{Page, PageLinks, PageRequest};
use crate::domain::quota::UserQuota;
use crate::domain::quota_source::{ClusterResolver, ClusterService};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        OriginalUri, Path, Query, RawQuery, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use url::Url;

/// Response body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub count: usize,
    pub previous: String,
    pub next: String,
    pub results: Option<T>,
    pub detail: String,
}

impl<T> Envelope<T> {
    pub fn ok(results: T) -> Self {
        Self {
            count: 0,
            previous: String::new(),
            next: String::new(),
            results: Some(results),
            detail: String::new(),
        }
    }
}

impl<T> Envelope<Vec<T>> {
    fn page(page: Page<T>, links: PageLinks) -> Self {
        Self {
            count: page.count,
            previous: links.previous.unwrap_or_default(),
            next: links.next.unwrap_or_default(),
            results: Some(page.results),
            detail: String::new(),
        }
    }
}

/// Error response: a status code plus the envelope `detail`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        let status = match err {
            OpsError::Validation(_) => StatusCode::BAD_REQUEST,
            OpsError::NotFound(_) => StatusCode::NOT_FOUND,
            OpsError::Conflict(_) => StatusCode::CONFLICT,
            OpsError::Upstream(_) => StatusCode::BAD_GATEWAY,
            OpsError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(format!("invalid query: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            debug!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        let body = Envelope::<()> {
            count: 0,
            previous: String::new(),
            next: String::new(),
            results: None,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub struct AppState {
    pub aggregator: Arc<QuotaAggregator>,
    pub quota_updates: Arc<QuotaUpdateService>,
    pub applications: Arc<dyn ApplicationService>,
    pub reviews: Arc<ReviewProcessor>,
    pub clusters: Arc<dyn ClusterResolver>,
    pub paging: PagingConfig,
}

impl AppState {
    fn page_request(&self, request: PageRequest) -> PageRequest {
        request.with_defaults(self.paging.default_page_size, self.paging.max_page_size)
    }

    fn ensure_cluster(&self, cluster: &str) -> Result<(), ApiError> {
        self.clusters
            .resolve(cluster, ClusterService::Lustre)
            .map(|_| ())
            .map_err(|e| OpsError::from(e).into())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/{cluster}/lustre/quotas", get(list_quotas))
        .route("/api/v1/{cluster}/lustre/quota", put(update_default_quota))
        .route("/api/v1/{cluster}/lustre/{user}/quota", put(update_user_quota))
        .route(
            "/api/v1/{cluster}/lustre/quota/applications",
            get(list_applications),
        )
        .route(
            "/api/v1/{cluster}/lustre/quota/application",
            post(create_application),
        )
        .route(
            "/api/v1/{cluster}/lustre/quota/application/{id}",
            put(update_application).delete(delete_application),
        )
        .route(
            "/api/v1/{cluster}/lustre/quota/application/{id}/decision",
            get(application_decision),
        )
        .route(
            "/api/v1/{cluster}/lustre/quota/application/{id}/review",
            post(review_application),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

fn parse_id(raw: &str) -> Result<ApplicationId, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map(ApplicationId)
        .map_err(|_| ApiError::bad_request("invalid application id: must be integer"))
}

/// Absolute URL of the current request, used as the base of page links.
fn request_url(headers: &HeaderMap, uri: &OriginalUri) -> Option<Url> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    Url::parse(&format!("http://{host}{}", uri.0)).ok()
}

fn links(headers: &HeaderMap, uri: &OriginalUri, page: &PageRequest, total: usize) -> PageLinks {
    if !page.paging {
        return PageLinks::default();
    }
    request_url(headers, uri)
        .map(|base| PageLinks::build(&base, page, total))
        .unwrap_or_default()
}

/// Every `user` query parameter, in order.
fn requested_users(query: Option<&str>) -> Vec<String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(key, _)| key == "user")
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

pub async fn list_quotas(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
    uri: OriginalUri,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Vec<UserQuota>> {
    let Query(page) = page?;
    let page = state.page_request(page);
    let users = requested_users(raw.as_deref());

    let quotas = state.aggregator.list_quotas(&cluster, users, &page).await?;
    let links = links(&headers, &uri, &page, quotas.count);
    Ok(Json(Envelope::page(quotas, links)))
}

pub async fn update_user_quota(
    State(state): State<Arc<AppState>>,
    Path((cluster, user)): Path<(String, String)>,
    body: Result<Json<UserQuota>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(quota) = body?;
    state
        .quota_updates
        .update_user_quota(&cluster, &user, &quota)
        .await?;
    Ok(Json(Envelope::ok("ok")))
}

pub async fn update_default_quota(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
    body: Result<Json<UserQuota>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(quota) = body?;
    state
        .quota_updates
        .update_default_quota(&cluster, &quota)
        .await?;
    Ok(Json(Envelope::ok("ok")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplierFilter {
    /// Applier name; empty means every applier.
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
    uri: OriginalUri,
    headers: HeaderMap,
    filter: Result<Query<ApplierFilter>, QueryRejection>,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Vec<QuotaApplication>> {
    let Query(filter) = filter?;
    let Query(page) = page?;
    let page = state.page_request(page);

    let applications = state
        .applications
        .list(&cluster, filter.name, &page)
        .await?;
    let links = links(&headers, &uri, &page, applications.count);
    Ok(Json(Envelope::page(applications, links)))
}

pub async fn create_application(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
    body: Result<Json<UserQuota>, JsonRejection>,
) -> ApiResult<&'static str> {
    state.ensure_cluster(&cluster)?;
    let Json(quota) = body?;
    state.applications.create(quota).await?;
    Ok(Json(Envelope::ok("ok")))
}

pub async fn update_application(
    State(state): State<Arc<AppState>>,
    Path((cluster, id)): Path<(String, String)>,
    body: Result<Json<UserQuota>, JsonRejection>,
) -> ApiResult<&'static str> {
    state.ensure_cluster(&cluster)?;
    let id = parse_id(&id)?;
    let Json(quota) = body?;
    state.applications.update(id, quota).await?;
    Ok(Json(Envelope::ok("ok")))
}

pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    Path((cluster, id)): Path<(String, String)>,
) -> ApiResult<&'static str> {
    state.ensure_cluster(&cluster)?;
    let id = parse_id(&id)?;
    state.applications.delete(id).await?;
    Ok(Json(Envelope::ok("ok")))
}

pub async fn application_decision(
    State(state): State<Arc<AppState>>,
    Path((cluster, id)): Path<(String, String)>,
) -> ApiResult<String> {
    state.ensure_cluster(&cluster)?;
    let id = parse_id(&id)?;
    let decision = state.applications.decision(id).await?;
    Ok(Json(Envelope::ok(decision)))
}

pub async fn review_application(
    State(state): State<Arc<AppState>>,
    Path((cluster, id)): Path<(String, String)>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<&'static str> {
    let id = parse_id(&id)?;
    let Json(request) = body?;
    state.reviews.review(&cluster, id, &request).await?;
    Ok(Json(Envelope::ok("ok")))
}
