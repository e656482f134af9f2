mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{create_team, id_of, join_team, TestApp};
use uplora_api::database::Store;

#[tokio::test]
async fn creator_becomes_owner() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;

    let (status, body) = app.post("/api/teams", Some(&owner.token), json!({ "name": "  Acme  " })).await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["name"], "Acme");
    assert_eq!(body["data"]["role"], "OWNER");

    let (_, me) = app.get("/api/me", Some(&owner.token)).await;
    assert_eq!(me["data"]["teams"][0]["role"], "OWNER");
    Ok(())
}

#[tokio::test]
async fn team_names_are_validated() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;

    let (status, body) = app.post("/api/teams", Some(&owner.token), json!({ "name": "x" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_see_a_team() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let stranger = app.user("stranger@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;

    let (status, _) = app.get(&format!("/api/teams/{}", team), Some(&stranger.token)).await;
    assert_eq!(status, 404);

    let (status, _) = app
        .get(&format!("/api/teams/{}/content/text", team), Some(&stranger.token))
        .await;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn invite_accept_flow() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;

    let (status, body) = app
        .post(
            &format!("/api/teams/{}/invites", team),
            Some(&owner.token),
            json!({ "email": "New.Person@Example.com", "role": "EDITOR" }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["email"], "new.person@example.com");
    assert_eq!(body["data"]["status"], "PENDING");
    assert!(body["data"].get("token").is_none());
    assert!(body["data"].get("warnings").is_none());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new.person@example.com");

    let invite = app.store.get_invite(id_of(&body)?).await?.expect("invite");
    assert!(sent[0].text.contains(&invite.token));

    // Only the invited address may open it
    let other = app.user("someone@example.com").await;
    let (status, _) = app.get(&format!("/api/invites/{}", invite.token), Some(&other.token)).await;
    assert_eq!(status, 403);

    let invited = app.user("new.person@example.com").await;
    let (status, preview) = app
        .get(&format!("/api/invites/{}", invite.token), Some(&invited.token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(preview["data"]["team_name"], "Acme");

    let (status, member) = app
        .post(&format!("/api/invites/{}/accept", invite.token), Some(&invited.token), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(member["data"]["role"], "EDITOR");

    // A second accept sees a settled invite
    let (status, _) = app
        .post(&format!("/api/invites/{}/accept", invite.token), Some(&invited.token), json!({}))
        .await;
    assert_eq!(status, 409);

    let (_, members) = app.get(&format!("/api/teams/{}/members", team), Some(&owner.token)).await;
    assert_eq!(members["data"].as_array().map(|m| m.len()), Some(2));
    Ok(())
}

#[tokio::test]
async fn invite_emails_match_case_insensitively_beyond_ascii() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;

    let (status, body) = app
        .post(
            &format!("/api/teams/{}/invites", team),
            Some(&owner.token),
            json!({ "email": "Ünal@Exämple.org", "role": "EDITOR" }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["email"], "ünal@exämple.org");
    let token = app.store.get_invite(id_of(&body)?).await?.expect("invite").token;

    let invited = app.user("ÜNAL@EXÄMPLE.ORG").await;
    let (status, body) = app
        .post(&format!("/api/invites/{}/accept", token), Some(&invited.token), json!({}))
        .await;
    assert_eq!(status, 200, "{}", body);
    Ok(())
}

#[tokio::test]
async fn expired_invites_are_gone() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;

    let (_, body) = app
        .post(
            &format!("/api/teams/{}/invites", team),
            Some(&owner.token),
            json!({ "email": "late@example.com", "role": "MANAGER" }),
        )
        .await;
    let invite_id = id_of(&body)?;
    app.store.set_invite_expiry(invite_id, Utc::now() - Duration::minutes(1)).await?;
    let token = app.store.get_invite(invite_id).await?.expect("invite").token;

    let late = app.user("late@example.com").await;
    let (status, _) = app
        .post(&format!("/api/invites/{}/accept", token), Some(&late.token), json!({}))
        .await;
    assert_eq!(status, 410);

    let invite = app.store.get_invite(invite_id).await?.expect("invite");
    assert_eq!(invite.status.as_str(), "EXPIRED");
    Ok(())
}

#[tokio::test]
async fn invite_roles_are_bounded_by_the_inviter() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let admin = join_team(&app, &owner, team, "admin@example.com", "ADMIN").await?;
    let editor = join_team(&app, &owner, team, "editor@example.com", "EDITOR").await?;

    let invites = format!("/api/teams/{}/invites", team);

    let (status, _) = app
        .post(&invites, Some(&admin.token), json!({ "email": "a2@example.com", "role": "ADMIN" }))
        .await;
    assert_eq!(status, 403);

    let (status, _) = app
        .post(&invites, Some(&owner.token), json!({ "email": "o2@example.com", "role": "OWNER" }))
        .await;
    assert_eq!(status, 403);

    let (status, _) = app
        .post(&invites, Some(&editor.token), json!({ "email": "e2@example.com", "role": "EDITOR" }))
        .await;
    assert_eq!(status, 403);

    let (status, _) = app
        .post(&invites, Some(&admin.token), json!({ "email": "m2@example.com", "role": "MANAGER" }))
        .await;
    assert_eq!(status, 201);

    // Inviting someone already on the team is a conflict
    let (status, _) = app
        .post(&invites, Some(&owner.token), json!({ "email": "editor@example.com", "role": "EDITOR" }))
        .await;
    assert_eq!(status, 409);
    Ok(())
}

#[tokio::test]
async fn cancelled_invites_cannot_be_accepted() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;

    let (_, body) = app
        .post(
            &format!("/api/teams/{}/invites", team),
            Some(&owner.token),
            json!({ "email": "maybe@example.com", "role": "EDITOR" }),
        )
        .await;
    let invite_id = id_of(&body)?;

    let (status, body) = app
        .delete(&format!("/api/teams/{}/invites/{}", team, invite_id), Some(&owner.token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "REJECTED");

    let token = app.store.get_invite(invite_id).await?.expect("invite").token;
    let maybe = app.user("maybe@example.com").await;
    let (status, _) = app
        .post(&format!("/api/invites/{}/accept", token), Some(&maybe.token), json!({}))
        .await;
    assert_eq!(status, 409);
    Ok(())
}

#[tokio::test]
async fn role_changes_and_removal() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let admin = join_team(&app, &owner, team, "admin@example.com", "ADMIN").await?;
    let editor = join_team(&app, &owner, team, "editor@example.com", "EDITOR").await?;

    let editor_path = format!("/api/teams/{}/members/{}", team, editor.id);
    let owner_path = format!("/api/teams/{}/members/{}", team, owner.id);

    let (status, body) = app.patch(&editor_path, Some(&admin.token), json!({ "role": "MANAGER" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["role"], "MANAGER");

    let (status, _) = app.patch(&editor_path, Some(&admin.token), json!({ "role": "OWNER" })).await;
    assert_eq!(status, 403);

    let (status, _) = app.delete(&owner_path, Some(&admin.token)).await;
    assert_eq!(status, 403);

    // Anyone but the owner may leave
    let (status, _) = app.delete(&editor_path, Some(&editor.token)).await;
    assert_eq!(status, 200);
    let (status, _) = app.get(&format!("/api/teams/{}", team), Some(&editor.token)).await;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn only_owner_and_admin_rename() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("owner@example.com").await;
    let team = create_team(&app, &owner, "Acme").await?;
    let manager = join_team(&app, &owner, team, "manager@example.com", "MANAGER").await?;

    let path = format!("/api/teams/{}", team);
    let (status, _) = app.patch(&path, Some(&manager.token), json!({ "name": "Nope" })).await;
    assert_eq!(status, 403);

    let (status, body) = app.patch(&path, Some(&owner.token), json!({ "name": "Acme Media" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["name"], "Acme Media");
    Ok(())
}
