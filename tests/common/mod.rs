#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use uplora_api::database::Store;
pub use uplora_api::testing::{TestApp, TestUser};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/uplora-api");
        cmd.env("UPLORA_API_PORT", port.to_string())
            .env("UPLORA_IN_MEMORY", "true")
            .env("APP_ENV", "development")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

pub fn id_of(body: &Value) -> Result<Uuid> {
    let id = body["data"]["id"].as_str().context("response has no data.id")?;
    Ok(id.parse()?)
}

/// Create a team owned by `owner` and return its id.
pub async fn create_team(app: &TestApp, owner: &TestUser, name: &str) -> Result<Uuid> {
    let (status, body) = app.post("/api/teams", Some(&owner.token), json!({ "name": name })).await;
    anyhow::ensure!(status == 201, "team create failed: {} {}", status, body);
    id_of(&body)
}

/// Invite a fresh user at `email` as `role` and accept on their behalf.
pub async fn join_team(app: &TestApp, inviter: &TestUser, team_id: Uuid, email: &str, role: &str) -> Result<TestUser> {
    let user = app.user(email).await;
    join_team_as(app, inviter, team_id, &user, role).await?;
    Ok(user)
}

/// Invite an existing user as `role` and accept on their behalf.
pub async fn join_team_as(app: &TestApp, inviter: &TestUser, team_id: Uuid, user: &TestUser, role: &str) -> Result<()> {
    let (status, body) = app
        .post(
            &format!("/api/teams/{}/invites", team_id),
            Some(&inviter.token),
            json!({ "email": user.email, "role": role }),
        )
        .await;
    anyhow::ensure!(status == 201, "invite failed: {} {}", status, body);

    let invite_id = id_of(&body)?;
    let token = app
        .store
        .get_invite(invite_id)
        .await?
        .context("invite row missing")?
        .token;

    let (status, body) = app
        .post(&format!("/api/invites/{}/accept", token), Some(&user.token), json!({}))
        .await;
    anyhow::ensure!(status == 200, "accept failed: {} {}", status, body);
    Ok(())
}

/// Upload slot for `kind`, with the object already in storage.
pub async fn uploaded_key(app: &TestApp, user: &TestUser, team_id: Uuid, kind: &str, filename: &str) -> Result<String> {
    let content_type = if kind == "image" { "image/png" } else { "video/mp4" };
    let (status, body) = app
        .post(
            &format!("/api/teams/{}/uploads", team_id),
            Some(&user.token),
            json!({ "kind": kind, "filename": filename, "content_type": content_type }),
        )
        .await;
    anyhow::ensure!(status == 201, "upload slot failed: {} {}", status, body);

    let key = body["data"]["key"].as_str().context("slot has no key")?.to_string();
    app.objects.put(key.clone(), b"media".to_vec()).await;
    Ok(key)
}

/// Signed `state` from an authorize response URL.
pub fn state_param(authorize_url: &str) -> Result<String> {
    let url = url::Url::parse(authorize_url)?;
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .context("authorize url has no state")
}

/// Run the OAuth flow for `platform` as `manager` and return the callback status.
pub async fn connect(app: &TestApp, manager: &TestUser, team_id: Uuid, platform: &str) -> Result<u16> {
    let (status, body) = app
        .post(
            &format!("/api/teams/{}/integrations/{}/authorize", team_id, platform),
            Some(&manager.token),
            json!({}),
        )
        .await;
    anyhow::ensure!(status == 200, "authorize failed: {} {}", status, body);

    let url = body["data"]["url"].as_str().context("no consent url")?;
    let state = state_param(url)?;
    let (status, _) = app
        .get(
            &format!("/api/integrations/{}/callback?code=auth-code&state={}", platform, state),
            None,
        )
        .await;
    Ok(status.as_u16())
}
