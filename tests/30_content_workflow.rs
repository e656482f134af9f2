mod common;

use anyhow::Result;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{connect, create_team, id_of, join_team, uploaded_key, TestApp, TestUser};

struct Team {
    app: TestApp,
    id: Uuid,
    owner: TestUser,
    manager: TestUser,
    editor: TestUser,
}

async fn team() -> Result<Team> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let id = create_team(&app, &owner, "Acme").await?;
    let manager = join_team(&app, &owner, id, "manager@example.com", "MANAGER").await?;
    let editor = join_team(&app, &owner, id, "editor@example.com", "EDITOR").await?;
    Ok(Team {
        app,
        id,
        owner,
        manager,
        editor,
    })
}

impl Team {
    fn path(&self, kind: &str) -> String {
        format!("/api/teams/{}/content/{}", self.id, kind)
    }

    async fn create(&self, user: &TestUser, kind: &str, body: Value) -> (u16, Value) {
        let (status, body) = self.app.post(&self.path(kind), Some(&user.token), body).await;
        (status.as_u16(), body)
    }

    async fn text_draft(&self, user: &TestUser) -> Result<Uuid> {
        let (status, body) = self
            .create(user, "text", json!({ "body": "Hello world", "platforms": ["x"] }))
            .await;
        anyhow::ensure!(status == 201, "create failed: {} {}", status, body);
        id_of(&body)
    }
}

#[tokio::test]
async fn editor_draft_submit_approve() -> Result<()> {
    let t = team().await?;
    let id = t.text_draft(&t.editor).await?;
    let post = format!("{}/{}", t.path("text"), id);

    let (status, body) = t.app.get(&post, Some(&t.editor.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "DRAFT");

    let (status, body) = t.app.post(&format!("{}/submit", post), Some(&t.editor.token), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "PENDING");

    // Locked while under review
    let (status, _) = t.app.patch(&post, Some(&t.editor.token), json!({ "body": "edit" })).await;
    assert_eq!(status, 403);

    // Editors do not review
    let (status, _) = t.app.post(&format!("{}/approve", post), Some(&t.editor.token), json!({})).await;
    assert_eq!(status, 403);

    let (status, body) = t
        .app
        .post(&format!("{}/approve", post), Some(&t.manager.token), json!({ "note": "Ship it" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(body["data"]["approved_by"], t.manager.id.to_string());
    assert_eq!(body["data"]["review_note"], "Ship it");

    // Approving twice is not a valid transition
    let (status, _) = t.app.post(&format!("{}/approve", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 409);
    Ok(())
}

#[tokio::test]
async fn rejection_returns_content_to_draft() -> Result<()> {
    let t = team().await?;
    let id = t.text_draft(&t.editor).await?;
    let post = format!("{}/{}", t.path("text"), id);
    t.app.post(&format!("{}/submit", post), Some(&t.editor.token), json!({})).await;

    let (status, body) = t.app.post(&format!("{}/reject", post), Some(&t.owner.token), json!({ "note": "Too long" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "DRAFT");
    assert_eq!(body["data"]["review_note"], "Too long");
    assert!(body["data"]["approved_by"].is_null());

    let (status, body) = t.app.patch(&post, Some(&t.editor.token), json!({ "body": "Shorter" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["body"], "Shorter");
    Ok(())
}

#[tokio::test]
async fn editors_cannot_self_approve() -> Result<()> {
    let t = team().await?;

    let (status, _) = t
        .create(&t.editor, "text", json!({ "body": "Hi", "status": "APPROVED" }))
        .await;
    assert_eq!(status, 403);

    let id = t.text_draft(&t.editor).await?;
    let post = format!("{}/{}", t.path("text"), id);
    let (status, _) = t.app.patch(&post, Some(&t.editor.token), json!({ "status": "APPROVED" })).await;
    assert_eq!(status, 403);

    let (status, body) = t
        .create(&t.manager, "text", json!({ "body": "Hi", "status": "APPROVED" }))
        .await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["approved_by"], t.manager.id.to_string());
    Ok(())
}

#[tokio::test]
async fn status_edits_follow_the_review_flow() -> Result<()> {
    let t = team().await?;
    let id = t.text_draft(&t.editor).await?;
    let post = format!("{}/{}", t.path("text"), id);

    // A draft has not been reviewed, whoever edits it
    let (status, _) = t.app.post(&format!("{}/approve", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 409);
    for target in ["APPROVED", "SCHEDULED"] {
        let (status, body) = t.app.patch(&post, Some(&t.manager.token), json!({ "status": target })).await;
        assert_eq!(status, 409, "{} -> {}", target, body);
    }
    let (_, body) = t.app.get(&post, Some(&t.manager.token)).await;
    assert_eq!(body["data"]["status"], "DRAFT");

    t.app.post(&format!("{}/submit", post), Some(&t.editor.token), json!({})).await;
    let (status, body) = t.app.patch(&post, Some(&t.manager.token), json!({ "status": "APPROVED" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(body["data"]["approved_by"], t.manager.id.to_string());

    // Approved content goes back only through review
    let (status, _) = t.app.patch(&post, Some(&t.manager.token), json!({ "status": "DRAFT" })).await;
    assert_eq!(status, 409);
    let (_, body) = t.app.get(&post, Some(&t.manager.token)).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    Ok(())
}

#[tokio::test]
async fn editors_only_touch_their_own_drafts() -> Result<()> {
    let t = team().await?;
    let other = join_team(&t.app, &t.owner, t.id, "other@example.com", "EDITOR").await?;
    let id = t.text_draft(&t.editor).await?;
    let post = format!("{}/{}", t.path("text"), id);

    // Visible to the whole team
    let (status, _) = t.app.get(&post, Some(&other.token)).await;
    assert_eq!(status, 200);

    let (status, _) = t.app.patch(&post, Some(&other.token), json!({ "body": "mine now" })).await;
    assert_eq!(status, 403);
    let (status, _) = t.app.delete(&post, Some(&other.token)).await;
    assert_eq!(status, 403);

    let (status, _) = t.app.patch(&post, Some(&t.manager.token), json!({ "body": "tidied" })).await;
    assert_eq!(status, 200);
    Ok(())
}

#[tokio::test]
async fn scheduling_requires_a_time() -> Result<()> {
    let t = team().await?;

    let (status, body) = t
        .create(&t.manager, "text", json!({ "body": "Later", "status": "SCHEDULED" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["field_errors"]["scheduled_at"].is_string());

    // Approving content that has a time schedules it
    let (status, body) = t
        .create(
            &t.editor,
            "text",
            json!({ "body": "Later", "scheduled_at": "2030-01-01T09:00:00Z" }),
        )
        .await;
    assert_eq!(status, 201);
    let post = format!("{}/{}", t.path("text"), id_of(&body)?);
    t.app.post(&format!("{}/submit", post), Some(&t.editor.token), json!({})).await;
    let (_, body) = t.app.post(&format!("{}/approve", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(body["data"]["status"], "SCHEDULED");
    Ok(())
}

#[tokio::test]
async fn media_rules_per_kind() -> Result<()> {
    let t = team().await?;
    let image = uploaded_key(&t.app, &t.editor, t.id, "image", "a.png").await?;
    let video = uploaded_key(&t.app, &t.editor, t.id, "video", "a.mp4").await?;
    let video2 = uploaded_key(&t.app, &t.editor, t.id, "video", "b.mp4").await?;

    let (status, body) = t.create(&t.editor, "text", json!({ "body": "", "platforms": [] })).await;
    assert_eq!(status, 400);
    assert!(body["field_errors"]["body"].is_string());

    let (status, _) = t.create(&t.editor, "image", json!({ "media_keys": [] })).await;
    assert_eq!(status, 400);

    let (status, _) = t.create(&t.editor, "video", json!({ "media_keys": [video, video2] })).await;
    assert_eq!(status, 400);

    // Keys must live under the team's folder for this kind
    let (status, _) = t.create(&t.editor, "image", json!({ "media_keys": [video] })).await;
    assert_eq!(status, 400);
    let foreign = format!("teams/{}/image/x.png", Uuid::new_v4());
    let (status, _) = t.create(&t.editor, "image", json!({ "media_keys": [foreign] })).await;
    assert_eq!(status, 400);

    let (status, body) = t.create(&t.editor, "image", json!({ "media_keys": [image.clone()] })).await;
    assert_eq!(status, 201);
    let (status, links) = t
        .app
        .get(&format!("{}/{}/media", t.path("image"), id_of(&body)?), Some(&t.editor.token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(links["data"][0]["key"], image);
    assert!(links["data"][0]["url"].is_string());
    Ok(())
}

#[tokio::test]
async fn uploads_check_content_type() -> Result<()> {
    let t = team().await?;
    let path = format!("/api/teams/{}/uploads", t.id);

    let (status, _) = t
        .app
        .post(&path, Some(&t.editor.token), json!({ "kind": "image", "filename": "a.mp4", "content_type": "video/mp4" }))
        .await;
    assert_eq!(status, 400);

    let (status, _) = t
        .app
        .post(&path, Some(&t.editor.token), json!({ "kind": "text", "filename": "a.txt", "content_type": "text/plain" }))
        .await;
    assert_eq!(status, 400);

    let (status, body) = t
        .app
        .post(&path, Some(&t.editor.token), json!({ "kind": "reel", "filename": "My Reel.mov", "content_type": "video/quicktime" }))
        .await;
    assert_eq!(status, 201);
    let key = body["data"]["key"].as_str().unwrap_or_default();
    assert!(key.starts_with(&format!("teams/{}/reel/", t.id)));
    assert!(key.ends_with("-My-Reel.mov"));
    Ok(())
}

#[tokio::test]
async fn list_filters_by_status() -> Result<()> {
    let t = team().await?;
    let first = t.text_draft(&t.editor).await?;
    t.text_draft(&t.editor).await?;
    t.app
        .post(&format!("{}/{}/submit", t.path("text"), first), Some(&t.editor.token), json!({}))
        .await;

    let (_, all) = t.app.get(&t.path("text"), Some(&t.editor.token)).await;
    assert_eq!(all["data"].as_array().map(|p| p.len()), Some(2));

    let (_, pending) = t.app.get(&format!("{}?status=PENDING", t.path("text")), Some(&t.editor.token)).await;
    assert_eq!(pending["data"].as_array().map(|p| p.len()), Some(1));
    assert_eq!(pending["data"][0]["id"], first.to_string());

    // Other kinds live in their own tables
    let (_, videos) = t.app.get(&t.path("video"), Some(&t.editor.token)).await;
    assert_eq!(videos["data"].as_array().map(|p| p.len()), Some(0));
    Ok(())
}

#[tokio::test]
async fn publish_records_per_platform_results() -> Result<()> {
    let t = team().await?;
    assert_eq!(connect(&t.app, &t.owner, t.id, "x").await?, 303);
    assert_eq!(connect(&t.app, &t.owner, t.id, "tiktok").await?, 303);
    t.app.publisher.fail(uplora_api::types::Platform::Tiktok);

    let (_, body) = t
        .create(
            &t.manager,
            "text",
            json!({ "body": "Launch day", "status": "APPROVED", "platforms": ["x", "tiktok", "pinterest"] }),
        )
        .await;
    let post = format!("{}/{}", t.path("text"), id_of(&body)?);

    let (status, _) = t.app.post(&format!("{}/publish", post), Some(&t.editor.token), json!({})).await;
    assert_eq!(status, 403);

    let (status, body) = t.app.post(&format!("{}/publish", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["status"], "PUBLISHED");
    assert!(data["published_at"].is_string());
    assert_eq!(data["publish_results"]["x"]["ok"], true);
    assert_eq!(data["publish_results"]["tiktok"]["ok"], false);
    assert_eq!(data["publish_results"]["pinterest"]["ok"], false);
    assert!(data["publish_results"]["pinterest"]["error"]
        .as_str()
        .unwrap_or_default()
        .contains("not connected"));

    let published = t.app.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].text, "Launch day");

    // Published content is frozen
    let (status, _) = t.app.patch(&post, Some(&t.owner.token), json!({ "body": "edit" })).await;
    assert_eq!(status, 403);
    let (status, _) = t.app.post(&format!("{}/publish", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 409);
    Ok(())
}

#[tokio::test]
async fn publish_failing_everywhere_keeps_status() -> Result<()> {
    let t = team().await?;
    let (_, body) = t
        .create(&t.manager, "text", json!({ "body": "Nobody hears", "status": "APPROVED", "platforms": ["youtube"] }))
        .await;
    let post = format!("{}/{}", t.path("text"), id_of(&body)?);

    let (status, body) = t.app.post(&format!("{}/publish", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 502);
    assert_eq!(body["details"]["youtube"]["ok"], false);

    let (_, body) = t.app.get(&post, Some(&t.manager.token)).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(body["data"]["publish_results"]["youtube"]["ok"], false);
    Ok(())
}

#[tokio::test]
async fn publish_without_platforms_is_invalid() -> Result<()> {
    let t = team().await?;
    let (_, body) = t
        .create(&t.manager, "text", json!({ "body": "Nowhere", "status": "APPROVED" }))
        .await;
    let post = format!("{}/{}", t.path("text"), id_of(&body)?);

    let (status, body) = t.app.post(&format!("{}/publish", post), Some(&t.manager.token), json!({})).await;
    assert_eq!(status, 400);
    assert!(body["field_errors"]["platforms"].is_string());
    Ok(())
}
