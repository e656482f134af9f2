mod common;

use anyhow::Result;
use serde_json::json;

use common::{connect, create_team, id_of, join_team, join_team_as, uploaded_key, TestApp};
use uplora_api::types::Platform;

#[tokio::test]
async fn deleting_content_removes_its_media() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let video = uploaded_key(&app, &owner, team, "video", "clip.mp4").await?;
    let thumb = uploaded_key(&app, &owner, team, "video", "thumb.mp4").await?;

    let (status, body) = app
        .post(
            &format!("/api/teams/{}/content/video", team),
            Some(&owner.token),
            json!({ "title": "Clip", "media_keys": [video], "thumbnail_key": thumb }),
        )
        .await;
    assert_eq!(status, 201);
    let post = format!("/api/teams/{}/content/video/{}", team, id_of(&body)?);

    let (status, body) = app.delete(&post, Some(&owner.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["deleted"], true);
    assert_eq!(body["data"]["objects_deleted"], 2);
    assert_eq!(body["data"]["warnings"].as_array().map(|w| w.len()), Some(0));

    assert!(!app.objects.contains(&video).await);
    assert!(!app.objects.contains(&thumb).await);
    let (status, _) = app.get(&post, Some(&owner.token)).await;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn transient_storage_failures_are_retried() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let image = uploaded_key(&app, &owner, team, "image", "a.png").await?;

    let (_, body) = app
        .post(&format!("/api/teams/{}/content/image", team), Some(&owner.token), json!({ "media_keys": [image] }))
        .await;
    let post = format!("/api/teams/{}/content/image/{}", team, id_of(&body)?);

    app.objects.fail_next_deletes(2);
    let (status, body) = app.delete(&post, Some(&owner.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["objects_deleted"], 1);
    assert_eq!(body["data"]["warnings"].as_array().map(|w| w.len()), Some(0));
    assert_eq!(app.objects.delete_calls(), 3);
    assert!(!app.objects.contains(&image).await);
    Ok(())
}

#[tokio::test]
async fn storage_leftovers_become_warnings() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let image = uploaded_key(&app, &owner, team, "image", "stuck.png").await?;
    app.objects.stick(image.clone()).await;

    let (_, body) = app
        .post(&format!("/api/teams/{}/content/image", team), Some(&owner.token), json!({ "media_keys": [image] }))
        .await;
    let post = format!("/api/teams/{}/content/image/{}", team, id_of(&body)?);

    let (status, body) = app.delete(&post, Some(&owner.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["objects_deleted"], 0);
    assert_eq!(body["data"]["objects_failed"][0], image);
    assert_eq!(body["data"]["warnings"].as_array().map(|w| w.len()), Some(1));

    // The row is gone even though the object is not
    let (status, _) = app.get(&post, Some(&owner.token)).await;
    assert_eq!(status, 404);
    assert!(app.objects.contains(&image).await);
    assert_eq!(app.objects.delete_calls(), 3);
    Ok(())
}

#[tokio::test]
async fn editors_cannot_delete_submitted_content() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let editor = join_team(&app, &owner, team, "editor@example.com", "EDITOR").await?;
    let image = uploaded_key(&app, &editor, team, "image", "a.png").await?;

    let (_, body) = app
        .post(&format!("/api/teams/{}/content/image", team), Some(&editor.token), json!({ "media_keys": [image] }))
        .await;
    let post = format!("/api/teams/{}/content/image/{}", team, id_of(&body)?);
    app.post(&format!("{}/submit", post), Some(&editor.token), json!({})).await;

    let (status, _) = app.delete(&post, Some(&editor.token)).await;
    assert_eq!(status, 403);
    assert!(app.objects.contains(&image).await);
    assert_eq!(app.objects.delete_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn deleting_a_team_cleans_its_folder_and_connections() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let other = create_team(&app, &owner, "Other").await?;
    let admin = join_team(&app, &owner, team, "admin@example.com", "ADMIN").await?;

    let mine = uploaded_key(&app, &owner, team, "image", "a.png").await?;
    let orphan = format!("teams/{}/video/orphan.mp4", team);
    app.objects.put(orphan.clone(), b"x".to_vec()).await;
    let theirs = uploaded_key(&app, &owner, other, "image", "b.png").await?;
    app.post(&format!("/api/teams/{}/content/image", team), Some(&owner.token), json!({ "media_keys": [mine] }))
        .await;

    connect(&app, &owner, team, "x").await?;
    app.tokens.fail_revocation(Platform::X);

    let (status, _) = app.delete(&format!("/api/teams/{}", team), Some(&admin.token)).await;
    assert_eq!(status, 403);

    let (status, body) = app.delete(&format!("/api/teams/{}", team), Some(&owner.token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["objects_deleted"], 2);
    assert_eq!(body["data"]["warnings"].as_array().map(|w| w.len()), Some(1));
    assert_eq!(app.tokens.revoked().len(), 1);

    assert!(!app.objects.contains(&mine).await);
    assert!(!app.objects.contains(&orphan).await);
    assert!(app.objects.contains(&theirs).await);

    let (status, _) = app.get(&format!("/api/teams/{}", team), Some(&owner.token)).await;
    assert_eq!(status, 404);
    let (_, me) = app.get("/api/me", Some(&admin.token)).await;
    assert_eq!(me["data"]["teams"].as_array().map(|t| t.len()), Some(0));
    Ok(())
}

#[tokio::test]
async fn admin_deletes_a_user_and_their_footprint() -> Result<()> {
    let app = TestApp::new();
    let root = app.admin("root@example.com").await;
    let owner = app.user("owner@example.com").await;
    let leaving = app.user("leaving@example.com").await;

    let kept_team = create_team(&app, &owner, "Kept").await?;
    join_team_as(&app, &owner, kept_team, &leaving, "EDITOR").await?;
    let owned_team = create_team(&app, &leaving, "Gone").await?;

    let authored = uploaded_key(&app, &leaving, kept_team, "image", "mine.png").await?;
    app.post(
        &format!("/api/teams/{}/content/image", kept_team),
        Some(&leaving.token),
        json!({ "media_keys": [authored] }),
    )
    .await;
    let owned_media = uploaded_key(&app, &leaving, owned_team, "image", "x.png").await?;
    let colleague = uploaded_key(&app, &owner, kept_team, "image", "keep.png").await?;

    let (status, body) = app
        .delete(&format!("/api/admin/users/{}", leaving.id), Some(&root.token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["deleted"], true);
    assert_eq!(body["data"]["user_id"], leaving.id.to_string());

    assert!(!app.objects.contains(&authored).await);
    assert!(!app.objects.contains(&owned_media).await);
    assert!(app.objects.contains(&colleague).await);

    // The owner's team survives without the departed member
    let (_, members) = app.get(&format!("/api/teams/{}/members", kept_team), Some(&owner.token)).await;
    assert_eq!(members["data"].as_array().map(|m| m.len()), Some(1));
    let (status, _) = app.get(&format!("/api/teams/{}", owned_team), Some(&root.token)).await;
    assert_eq!(status, 404);

    // The old token no longer resurrects the account
    let (status, _) = app.get("/api/me", Some(&leaving.token)).await;
    assert_eq!(status, 403);
    Ok(())
}

#[tokio::test]
async fn admin_user_deletion_guards() -> Result<()> {
    let app = TestApp::new();
    let root = app.admin("root@example.com").await;

    let (status, _) = app.delete(&format!("/api/admin/users/{}", root.id), Some(&root.token)).await;
    assert_eq!(status, 400);

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", uuid::Uuid::new_v4()), Some(&root.token))
        .await;
    assert_eq!(status, 404);
    Ok(())
}
