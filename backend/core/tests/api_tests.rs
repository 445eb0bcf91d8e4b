use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hpcops_core::application::{
    QuotaAggregator, QuotaUpdateService, ReviewProcessor, StandardApplicationService,
};
use hpcops_core::domain::node_config::{ClusterConfig, PagingConfig};
use hpcops_core::domain::quota_source::{ClusterResolver, IdentityProvider, QuotaSource};
use hpcops_core::domain::repository::ApplicationRepository;
use hpcops_core::infrastructure::repositories::InMemoryApplicationRepository;
use hpcops_core::infrastructure::{IdentityClient, LustreClient, StaticClusterRegistry};
use hpcops_core::presentation::api::{router, AppState};
use mockito::{Matcher, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const EXECUTE_PATH: &str = "/api/lustre/execute_cmd";

fn app(server: &ServerGuard) -> Router {
    let addr = server.host_with_port();
    let clusters: Arc<dyn ClusterResolver> = Arc::new(StaticClusterRegistry::new(vec![ClusterConfig {
        name: "hpc1".to_string(),
        lustre_server: addr.clone(),
        slurmrestd: addr,
    }]));
    let source: Arc<dyn QuotaSource> = Arc::new(LustreClient::new(Duration::from_secs(5)).unwrap());
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(IdentityClient::new(Duration::from_secs(5)).unwrap());
    let repository: Arc<dyn ApplicationRepository> = Arc::new(InMemoryApplicationRepository::new());

    let aggregator = Arc::new(QuotaAggregator::new(
        source.clone(),
        identity,
        clusters.clone(),
        4,
    ));
    let state = AppState {
        aggregator: aggregator.clone(),
        quota_updates: Arc::new(QuotaUpdateService::new(source.clone(), clusters.clone())),
        applications: Arc::new(StandardApplicationService::new(repository.clone(), aggregator, 4)),
        reviews: Arc::new(ReviewProcessor::new(repository, source, clusters.clone())),
        clusters,
        paging: PagingConfig::default(),
    };
    router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "ops.example.org");
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mock_query(server: &mut ServerGuard, command: &str, result: Value) -> mockito::Mock {
    server
        .mock("GET", EXECUTE_PATH)
        .match_query(Matcher::UrlEncoded("command".into(), command.into()))
        .with_status(200)
        .with_body(json!({"code": 200, "message": "", "result": result}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn test_list_quotas_merges_and_paginates() {
    let mut server = mockito::Server::new_async().await;
    mock_query(
        &mut server,
        "df -t lustre",
        json!([{"Mounted": "/mnt/a"}, {"Mounted": "/mnt/b"}]),
    )
    .await;
    mock_query(
        &mut server,
        "lfs quota -U /mnt/a",
        json!({"block_quota_soft_limit": "100G", "block_quota_hard_limit": "200G"}),
    )
    .await;
    mock_query(
        &mut server,
        "lfs quota -u alice /mnt/a",
        json!({"user": "alice", "block_quota_soft_limit": "none", "block_quota_hard_limit": "1T"}),
    )
    .await;
    let app = app(&server);

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/hpc1/lustre/quotas?user=alice&page=1&page_size=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["previous"], "");
    let next = body["next"].as_str().unwrap();
    assert!(next.starts_with("http://ops.example.org/api/v1/hpc1/lustre/quotas?"));
    assert!(next.contains("user=alice"));
    assert!(next.contains("page=2"));

    let first = &body["results"][0];
    assert_eq!(first["user"], "alice");
    assert_eq!(first["filesystem"], "/mnt/a");
    assert_eq!(first["block_quota_soft_limit"], "100G");
    assert_eq!(first["block_quota_hard_limit"], "1T");
}

#[tokio::test]
async fn test_unknown_cluster_is_404_envelope() {
    let server = mockito::Server::new_async().await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/api/v1/nowhere/lustre/quotas?user=alice", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "unknown cluster: nowhere");
    assert_eq!(body["results"], Value::Null);
}

#[tokio::test]
async fn test_mount_failure_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", EXECUTE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code": 500, "message": "df failed", "result": null}"#)
        .create_async()
        .await;
    let app = app(&server);

    let (status, _) = send(&app, "GET", "/api/v1/hpc1/lustre/quotas?user=alice", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_default_quota_update_without_limits_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let run = server
        .mock("POST", EXECUTE_PATH)
        .expect(0)
        .create_async()
        .await;
    let app = app(&server);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/hpc1/lustre/quota",
        Some(json!({"filesystem": "/mnt/a", "block_quota_soft_limit": "none"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "no quota limits to update");
    run.assert_async().await;
}

#[tokio::test]
async fn test_user_quota_update_runs_command() {
    let mut server = mockito::Server::new_async().await;
    let run = server
        .mock("POST", EXECUTE_PATH)
        .match_body(Matcher::Json(json!({"command": "lfs setquota -u bob -B 2T /mnt/a"})))
        .with_status(200)
        .with_body(r#"{"code": 200, "message": "", "result": null}"#)
        .create_async()
        .await;
    let app = app(&server);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/hpc1/lustre/bob/quota",
        Some(json!({"filesystem": "/mnt/a", "block_quota_hard_limit": "2T"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], "ok");
    run.assert_async().await;
}

#[tokio::test]
async fn test_application_lifecycle() {
    let mut server = mockito::Server::new_async().await;
    let run = server
        .mock("POST", EXECUTE_PATH)
        .match_body(Matcher::Json(json!({"command": "lfs setquota -u alice -B 1T /mnt/a"})))
        .with_status(200)
        .with_body(r#"{"code": 200, "message": "", "result": null}"#)
        .expect(1)
        .create_async()
        .await;
    let app = app(&server);
    let request = json!({"user": "alice", "filesystem": "/mnt/a", "block_quota_hard_limit": "1T"});

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/hpc1/lustre/quota/application",
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], "ok");

    let (status, body) = send(&app, "GET", "/api/v1/hpc1/lustre/quota/applications?name=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let application = &body["results"][0];
    assert_eq!(application["state"], "reviewing");
    assert_eq!(application["apply"]["block_quota_hard_limit"], "1T");
    let id = application["id"].as_i64().unwrap();

    let mut review = request.clone();
    review["approve"] = json!(true);
    review["decision"] = json!("approved for project X");
    let review_uri = format!("/api/v1/hpc1/lustre/quota/application/{id}/review");
    let (status, _) = send(&app, "POST", &review_uri, Some(review.clone())).await;
    assert_eq!(status, StatusCode::OK);
    run.assert_async().await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/hpc1/lustre/quota/application/{id}/decision"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], "approved for project X");

    let (status, _) = send(&app, "POST", &review_uri, Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let item_uri = format!("/api/v1/hpc1/lustre/quota/application/{id}");
    let (status, _) = send(&app, "DELETE", &item_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &item_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_approval_keeps_application_in_review() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", EXECUTE_PATH)
        .with_status(200)
        .with_body(r#"{"code": 500, "message": "setquota failed", "result": null}"#)
        .create_async()
        .await;
    let app = app(&server);
    let request = json!({"user": "alice", "filesystem": "/mnt/a", "file_quota_hard_limit": "5000"});
    send(&app, "POST", "/api/v1/hpc1/lustre/quota/application", Some(request.clone())).await;

    let (_, body) = send(&app, "GET", "/api/v1/hpc1/lustre/quota/applications", None).await;
    let id = body["results"][0]["id"].as_i64().unwrap();

    let mut review = request;
    review["approve"] = json!(true);
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/hpc1/lustre/quota/application/{id}/review"),
        Some(review),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().contains("setquota failed"));

    let (_, body) = send(&app, "GET", "/api/v1/hpc1/lustre/quota/applications", None).await;
    assert_eq!(body["results"][0]["state"], "reviewing");
}

#[tokio::test]
async fn test_non_integer_id_is_rejected() {
    let server = mockito::Server::new_async().await;
    let app = app(&server);

    let (status, body) = send(&app, "DELETE", "/api/v1/hpc1/lustre/quota/application/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "invalid application id: must be integer");
}

#[tokio::test]
async fn test_update_missing_application_is_404() {
    let server = mockito::Server::new_async().await;
    let app = app(&server);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/hpc1/lustre/quota/application/999",
        Some(json!({"user": "alice", "filesystem": "/mnt/a"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
