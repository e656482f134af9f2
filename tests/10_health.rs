mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let app = common::TestApp::new();
    let (status, body) = app.get("/", None).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["version"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> Result<()> {
    let app = common::TestApp::new();

    let (status, body) = app.get("/api/me", None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/me", Some("not-a-jwt")).await;
    assert_eq!(status, 401);
    Ok(())
}

#[tokio::test]
async fn me_returns_the_caller() -> Result<()> {
    let app = common::TestApp::new();
    let user = app.user("ada@example.com").await;

    let (status, body) = app.get("/api/me", Some(&user.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["is_admin"], false);
    assert_eq!(body["data"]["teams"].as_array().map(|t| t.len()), Some(0));
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_regular_users() -> Result<()> {
    let app = common::TestApp::new();
    let user = app.user("plain@example.com").await;

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", uuid::Uuid::new_v4()), Some(&user.token))
        .await;
    assert_eq!(status, 403);
    Ok(())
}
