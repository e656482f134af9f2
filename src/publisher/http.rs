use async_trait::async_trait;
use reqwest::{header, RequestBuilder};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{MediaRef, PublishError, PublishReceipt, PublishRequest, Publisher};
use crate::integrations::oauth::provider_message;
use crate::integrations::providers::GRAPH_API;
use crate::storage::ObjectStore;
use crate::types::{ContentKind, Platform};

const X_API: &str = "https://api.twitter.com/2";
const PINTEREST_API: &str = "https://api.pinterest.com/v5";
const TIKTOK_API: &str = "https://open.tiktokapis.com/v2";
const YOUTUBE_UPLOAD: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";

/// Instagram processes video containers asynchronously
const CONTAINER_POLLS: u32 = 20;
const CONTAINER_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Publisher that calls each platform's REST API
#[derive(Clone)]
pub struct HttpPublisher {
    http: reqwest::Client,
    objects: Arc<dyn ObjectStore>,
}

/// `Ok(true)` once Instagram reports the container `FINISHED`. A missing
/// status means processing has not started reporting yet.
fn container_ready(container: &str, status: Option<&str>) -> Result<bool, PublishError> {
    match status {
        Some("FINISHED") => Ok(true),
        Some("ERROR") | Some("EXPIRED") => Err(PublishError::Provider(format!(
            "Instagram could not process media {}",
            container
        ))),
        _ => Ok(false),
    }
}

fn unsupported(platform: Platform, kind: ContentKind) -> PublishError {
    PublishError::Unsupported(format!("{} does not accept {} posts", platform, kind))
}

fn first_media(request: &PublishRequest) -> Result<&MediaRef, PublishError> {
    request
        .media
        .first()
        .ok_or_else(|| PublishError::Unsupported(format!("{} post has no media", request.kind)))
}

fn require_account(request: &PublishRequest) -> Result<&str, PublishError> {
    request.account_id.as_deref().ok_or_else(|| {
        PublishError::Provider(format!(
            "{} connection has no account; reconnect the integration",
            request.platform
        ))
    })
}

fn string_id(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(String::from)
        .or_else(|| value.as_i64().map(|i| i.to_string()))
}

impl HttpPublisher {
    pub fn new(http: reqwest::Client, objects: Arc<dyn ObjectStore>) -> Self {
        Self { http, objects }
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Value, PublishError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(PublishError::Provider(message));
        }
        Ok(body)
    }

    async fn publish_x(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        if request.kind != ContentKind::Text {
            return Err(unsupported(request.platform, request.kind));
        }

        let body = self
            .call(
                self.http
                    .post(format!("{}/tweets", X_API))
                    .bearer_auth(&request.access_token)
                    .json(&json!({ "text": request.text })),
            )
            .await?;

        let id = body["data"]["id"]
            .as_str()
            .ok_or_else(|| PublishError::Provider("tweet id missing from response".to_string()))?;
        Ok(PublishReceipt {
            external_id: id.to_string(),
            url: Some(format!("https://x.com/i/web/status/{}", id)),
        })
    }

    /// Page posts need the page's own token, derived from the user token.
    async fn page_token(&self, page_id: &str, user_token: &str) -> Result<String, PublishError> {
        let body = self
            .call(
                self.http
                    .get(format!("{}/{}", GRAPH_API, page_id))
                    .query(&[("fields", "access_token"), ("access_token", user_token)]),
            )
            .await?;
        body["access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| PublishError::Provider("page access token unavailable".to_string()))
    }

    async fn publish_facebook(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let page_id = require_account(request)?;
        let token = self.page_token(page_id, &request.access_token).await?;

        let builder = match request.kind {
            ContentKind::Text => self
                .http
                .post(format!("{}/{}/feed", GRAPH_API, page_id))
                .form(&[("message", request.text.as_str()), ("access_token", token.as_str())]),
            ContentKind::Image => self.http.post(format!("{}/{}/photos", GRAPH_API, page_id)).form(&[
                ("url", first_media(request)?.url.as_str()),
                ("caption", request.text.as_str()),
                ("access_token", token.as_str()),
            ]),
            ContentKind::Reel | ContentKind::Video => {
                self.http.post(format!("{}/{}/videos", GRAPH_API, page_id)).form(&[
                    ("file_url", first_media(request)?.url.as_str()),
                    ("description", request.text.as_str()),
                    ("access_token", token.as_str()),
                ])
            }
        };

        let body = self.call(builder).await?;
        let id = string_id(&body["post_id"])
            .or_else(|| string_id(&body["id"]))
            .ok_or_else(|| PublishError::Provider("post id missing from response".to_string()))?;
        Ok(PublishReceipt {
            url: Some(format!("https://www.facebook.com/{}", id)),
            external_id: id,
        })
    }

    async fn create_container(&self, ig_user: &str, token: &str, params: &[(&str, &str)]) -> Result<String, PublishError> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("access_token", token));
        let body = self
            .call(self.http.post(format!("{}/{}/media", GRAPH_API, ig_user)).form(&form))
            .await?;
        string_id(&body["id"]).ok_or_else(|| PublishError::Provider("container id missing from response".to_string()))
    }

    async fn wait_for_container(&self, container: &str, token: &str) -> Result<(), PublishError> {
        for _ in 0..CONTAINER_POLLS {
            let body = self
                .call(
                    self.http
                        .get(format!("{}/{}", GRAPH_API, container))
                        .query(&[("fields", "status_code"), ("access_token", token)]),
                )
                .await?;
            let status = body["status_code"].as_str();
            if container_ready(container, status)? {
                return Ok(());
            }
            debug!("Instagram container {} is {}", container, status.unwrap_or("not reported yet"));
            tokio::time::sleep(CONTAINER_POLL_INTERVAL).await;
        }
        Err(PublishError::Provider("Instagram media processing timed out".to_string()))
    }

    async fn publish_instagram(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let ig_user = require_account(request)?;
        let token = request.access_token.as_str();
        let caption = request.text.as_str();

        let container = match request.kind {
            ContentKind::Text => return Err(unsupported(request.platform, request.kind)),
            ContentKind::Image if request.media.len() > 1 => {
                let mut children = Vec::with_capacity(request.media.len());
                for media in &request.media {
                    children.push(
                        self.create_container(ig_user, token, &[("image_url", media.url.as_str()), ("is_carousel_item", "true")])
                            .await?,
                    );
                }
                let children = children.join(",");
                self.create_container(
                    ig_user,
                    token,
                    &[("media_type", "CAROUSEL"), ("children", children.as_str()), ("caption", caption)],
                )
                .await?
            }
            ContentKind::Image => {
                self.create_container(ig_user, token, &[("image_url", first_media(request)?.url.as_str()), ("caption", caption)])
                    .await?
            }
            ContentKind::Reel | ContentKind::Video => {
                let mut params = vec![
                    ("media_type", "REELS"),
                    ("video_url", first_media(request)?.url.as_str()),
                    ("caption", caption),
                ];
                if let Some(thumb) = &request.thumbnail {
                    params.push(("cover_url", thumb.url.as_str()));
                }
                let container = self.create_container(ig_user, token, &params).await?;
                self.wait_for_container(&container, token).await?;
                container
            }
        };

        let body = self
            .call(
                self.http
                    .post(format!("{}/{}/media_publish", GRAPH_API, ig_user))
                    .form(&[("creation_id", container.as_str()), ("access_token", token)]),
            )
            .await?;
        let id = string_id(&body["id"])
            .ok_or_else(|| PublishError::Provider("media id missing from response".to_string()))?;
        Ok(PublishReceipt { external_id: id, url: None })
    }

    async fn publish_pinterest(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        if request.kind != ContentKind::Image {
            return Err(unsupported(request.platform, request.kind));
        }

        let boards = self
            .call(
                self.http
                    .get(format!("{}/boards", PINTEREST_API))
                    .query(&[("page_size", "1")])
                    .bearer_auth(&request.access_token),
            )
            .await?;
        let board_id = boards["items"]
            .get(0)
            .and_then(|b| string_id(&b["id"]))
            .ok_or_else(|| PublishError::Provider("Pinterest account has no boards".to_string()))?;

        let body = self
            .call(
                self.http
                    .post(format!("{}/pins", PINTEREST_API))
                    .bearer_auth(&request.access_token)
                    .json(&json!({
                        "board_id": board_id,
                        "title": request.display_title(),
                        "description": request.text,
                        "media_source": {
                            "source_type": "image_url",
                            "url": first_media(request)?.url,
                        },
                    })),
            )
            .await?;

        let id = string_id(&body["id"]).ok_or_else(|| PublishError::Provider("pin id missing from response".to_string()))?;
        Ok(PublishReceipt {
            url: Some(format!("https://www.pinterest.com/pin/{}/", id)),
            external_id: id,
        })
    }

    async fn publish_tiktok(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let builder = match request.kind {
            ContentKind::Text => return Err(unsupported(request.platform, request.kind)),
            ContentKind::Image => self
                .http
                .post(format!("{}/post/publish/content/init/", TIKTOK_API))
                .json(&json!({
                    "post_info": {
                        "title": request.display_title(),
                        "description": request.text,
                        "privacy_level": "SELF_ONLY",
                    },
                    "source_info": {
                        "source": "PULL_FROM_URL",
                        "photo_cover_index": 0,
                        "photo_images": request.media.iter().map(|m| m.url.as_str()).collect::<Vec<_>>(),
                    },
                    "post_mode": "DIRECT_POST",
                    "media_type": "PHOTO",
                })),
            ContentKind::Reel | ContentKind::Video => self
                .http
                .post(format!("{}/post/publish/video/init/", TIKTOK_API))
                .json(&json!({
                    "post_info": {
                        "title": request.text,
                        "privacy_level": "SELF_ONLY",
                    },
                    "source_info": {
                        "source": "PULL_FROM_URL",
                        "video_url": first_media(request)?.url,
                    },
                })),
        };

        let body = self.call(builder.bearer_auth(&request.access_token)).await?;
        if let Some(message) = provider_message(&body) {
            return Err(PublishError::Provider(message));
        }
        let id = body["data"]["publish_id"]
            .as_str()
            .ok_or_else(|| PublishError::Provider("publish_id missing from response".to_string()))?;
        Ok(PublishReceipt {
            external_id: id.to_string(),
            url: None,
        })
    }

    /// Resumable upload: open a session with the metadata, then PUT the bytes.
    async fn publish_youtube(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        if !matches!(request.kind, ContentKind::Video | ContentKind::Reel) {
            return Err(unsupported(request.platform, request.kind));
        }

        let media = first_media(request)?;
        let object = self.objects.open(&media.key).await?;

        let session = self
            .http
            .post(YOUTUBE_UPLOAD)
            .bearer_auth(&request.access_token)
            .header("X-Upload-Content-Length", object.content_length)
            .header("X-Upload-Content-Type", "video/*")
            .json(&json!({
                "snippet": {
                    "title": request.display_title(),
                    "description": request.text,
                },
                "status": { "privacyStatus": "private" },
            }))
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        if !session.status().is_success() {
            let status = session.status();
            let body: Value = session.json().await.unwrap_or(Value::Null);
            return Err(PublishError::Provider(
                provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }
        let upload_url = session
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PublishError::Provider("upload session URL missing".to_string()))?
            .to_string();

        let body = self
            .call(
                self.http
                    .put(upload_url)
                    .bearer_auth(&request.access_token)
                    .header(header::CONTENT_TYPE, "video/*")
                    .header(header::CONTENT_LENGTH, object.content_length)
                    .body(reqwest::Body::wrap_stream(object.stream)),
            )
            .await?;

        let id = body["id"]
            .as_str()
            .ok_or_else(|| PublishError::Provider("video id missing from response".to_string()))?;
        Ok(PublishReceipt {
            external_id: id.to_string(),
            url: Some(format!("https://www.youtube.com/watch?v={}", id)),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let receipt = match request.platform {
            Platform::X => self.publish_x(request).await,
            Platform::Facebook => self.publish_facebook(request).await,
            Platform::Instagram => self.publish_instagram(request).await,
            Platform::Pinterest => self.publish_pinterest(request).await,
            Platform::Tiktok => self.publish_tiktok(request).await,
            Platform::Youtube => self.publish_youtube(request).await,
        }?;
        info!("Published {} post to {} as {}", request.kind, request.platform, receipt.external_id);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_containers_wait_for_finished() {
        assert!(!container_ready("c1", None).unwrap());
        assert!(!container_ready("c1", Some("IN_PROGRESS")).unwrap());
        assert!(container_ready("c1", Some("FINISHED")).unwrap());
        assert!(matches!(container_ready("c1", Some("ERROR")), Err(PublishError::Provider(_))));
        assert!(container_ready("c1", Some("EXPIRED")).is_err());
    }
}
