use serde_json::Value;

use crate::types::Platform;

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// `client_id` and `client_secret` in the form body
    Form,
    /// HTTP Basic with `client_id:client_secret`
    Basic,
}

/// How an access token is renewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStyle {
    /// Standard `grant_type=refresh_token`
    RefreshToken,
    /// Meta exchanges the current long-lived token for a fresh one
    MetaExchange,
}

/// Account identity behind a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Static description of one platform's OAuth endpoints and quirks.
pub struct ProviderSpec {
    pub platform: Platform,
    pub auth_url: &'static str,
    pub token_url: &'static str,
    pub revoke_url: Option<&'static str>,
    pub profile_url: Option<&'static str>,
    pub scopes: &'static [&'static str],
    pub scope_separator: &'static str,
    pub client_id_param: &'static str,
    pub pkce: bool,
    pub client_auth: ClientAuth,
    pub refresh: RefreshStyle,
    /// Code exchange is a GET with query parameters (Meta)
    pub exchange_via_get: bool,
    pub extra_auth_params: &'static [(&'static str, &'static str)],
    pub map_account: fn(&Value) -> Option<AccountInfo>,
}

impl std::fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("platform", &self.platform)
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}

impl ProviderSpec {
    pub fn scope_string(&self) -> String {
        self.scopes.join(self.scope_separator)
    }

    /// Split a `scope` field from a token response on commas or whitespace.
    pub fn parse_scopes(&self, scope: &str) -> Vec<String> {
        scope
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub const GRAPH_API: &str = "https://graph.facebook.com/v19.0";

fn string_or_number(v: &Value) -> Option<String> {
    v.as_str()
        .map(String::from)
        .or_else(|| v.as_i64().map(|i| i.to_string()))
}

fn youtube_account(v: &Value) -> Option<AccountInfo> {
    let channel = v["items"].get(0)?;
    Some(AccountInfo {
        id: channel["id"].as_str()?.to_string(),
        name: channel["snippet"]["title"].as_str().map(String::from),
    })
}

fn facebook_account(v: &Value) -> Option<AccountInfo> {
    let page = v["data"].get(0)?;
    Some(AccountInfo {
        id: string_or_number(&page["id"])?,
        name: page["name"].as_str().map(String::from),
    })
}

fn instagram_account(v: &Value) -> Option<AccountInfo> {
    let account = v["data"]
        .as_array()?
        .iter()
        .find_map(|page| page.get("instagram_business_account"))?;
    Some(AccountInfo {
        id: string_or_number(&account["id"])?,
        name: account["username"].as_str().map(String::from),
    })
}

fn x_account(v: &Value) -> Option<AccountInfo> {
    Some(AccountInfo {
        id: v["data"]["id"].as_str()?.to_string(),
        name: v["data"]["username"].as_str().map(String::from),
    })
}

fn tiktok_account(v: &Value) -> Option<AccountInfo> {
    let user = &v["data"]["user"];
    Some(AccountInfo {
        id: user["open_id"].as_str()?.to_string(),
        name: user["display_name"].as_str().map(String::from),
    })
}

fn pinterest_account(v: &Value) -> Option<AccountInfo> {
    let username = v["username"].as_str()?.to_string();
    Some(AccountInfo {
        id: string_or_number(&v["id"]).unwrap_or_else(|| username.clone()),
        name: Some(username),
    })
}

static YOUTUBE: ProviderSpec = ProviderSpec {
    platform: Platform::Youtube,
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    revoke_url: Some("https://oauth2.googleapis.com/revoke"),
    profile_url: Some("https://www.googleapis.com/youtube/v3/channels?part=snippet&mine=true"),
    scopes: &[
        "https://www.googleapis.com/auth/youtube.upload",
        "https://www.googleapis.com/auth/youtube.readonly",
    ],
    scope_separator: " ",
    client_id_param: "client_id",
    pkce: false,
    client_auth: ClientAuth::Form,
    refresh: RefreshStyle::RefreshToken,
    exchange_via_get: false,
    // Google only returns a refresh token with offline access and a fresh consent
    extra_auth_params: &[("access_type", "offline"), ("prompt", "consent")],
    map_account: youtube_account,
};

static FACEBOOK: ProviderSpec = ProviderSpec {
    platform: Platform::Facebook,
    auth_url: "https://www.facebook.com/v19.0/dialog/oauth",
    token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
    revoke_url: Some("https://graph.facebook.com/v19.0/me/permissions"),
    profile_url: Some("https://graph.facebook.com/v19.0/me/accounts?fields=id,name"),
    scopes: &["pages_show_list", "pages_read_engagement", "pages_manage_posts"],
    scope_separator: ",",
    client_id_param: "client_id",
    pkce: false,
    client_auth: ClientAuth::Form,
    refresh: RefreshStyle::MetaExchange,
    exchange_via_get: true,
    extra_auth_params: &[],
    map_account: facebook_account,
};

static INSTAGRAM: ProviderSpec = ProviderSpec {
    platform: Platform::Instagram,
    auth_url: "https://www.facebook.com/v19.0/dialog/oauth",
    token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
    revoke_url: Some("https://graph.facebook.com/v19.0/me/permissions"),
    profile_url: Some(
        "https://graph.facebook.com/v19.0/me/accounts?fields=name,instagram_business_account{id,username}",
    ),
    scopes: &[
        "instagram_basic",
        "instagram_content_publish",
        "pages_show_list",
        "pages_read_engagement",
        "business_management",
    ],
    scope_separator: ",",
    client_id_param: "client_id",
    pkce: false,
    client_auth: ClientAuth::Form,
    refresh: RefreshStyle::MetaExchange,
    exchange_via_get: true,
    extra_auth_params: &[],
    map_account: instagram_account,
};

static X: ProviderSpec = ProviderSpec {
    platform: Platform::X,
    auth_url: "https://twitter.com/i/oauth2/authorize",
    token_url: "https://api.twitter.com/2/oauth2/token",
    revoke_url: Some("https://api.twitter.com/2/oauth2/revoke"),
    profile_url: Some("https://api.twitter.com/2/users/me"),
    scopes: &["tweet.read", "tweet.write", "users.read", "offline.access"],
    scope_separator: " ",
    client_id_param: "client_id",
    pkce: true,
    client_auth: ClientAuth::Basic,
    refresh: RefreshStyle::RefreshToken,
    exchange_via_get: false,
    extra_auth_params: &[],
    map_account: x_account,
};

static TIKTOK: ProviderSpec = ProviderSpec {
    platform: Platform::Tiktok,
    auth_url: "https://www.tiktok.com/v2/auth/authorize/",
    token_url: "https://open.tiktokapis.com/v2/oauth/token/",
    revoke_url: Some("https://open.tiktokapis.com/v2/oauth/revoke/"),
    profile_url: Some("https://open.tiktokapis.com/v2/user/info/?fields=open_id,display_name"),
    scopes: &["user.info.basic", "video.publish", "video.upload"],
    scope_separator: ",",
    client_id_param: "client_key",
    pkce: true,
    client_auth: ClientAuth::Form,
    refresh: RefreshStyle::RefreshToken,
    exchange_via_get: false,
    extra_auth_params: &[],
    map_account: tiktok_account,
};

static PINTEREST: ProviderSpec = ProviderSpec {
    platform: Platform::Pinterest,
    auth_url: "https://www.pinterest.com/oauth/",
    token_url: "https://api.pinterest.com/v5/oauth/token",
    revoke_url: None,
    profile_url: Some("https://api.pinterest.com/v5/user_account"),
    scopes: &["boards:read", "pins:read", "pins:write", "user_accounts:read"],
    scope_separator: ",",
    client_id_param: "client_id",
    pkce: false,
    client_auth: ClientAuth::Basic,
    refresh: RefreshStyle::RefreshToken,
    exchange_via_get: false,
    extra_auth_params: &[],
    map_account: pinterest_account,
};

pub fn provider(platform: Platform) -> &'static ProviderSpec {
    match platform {
        Platform::Youtube => &YOUTUBE,
        Platform::Facebook => &FACEBOOK,
        Platform::Instagram => &INSTAGRAM,
        Platform::X => &X,
        Platform::Tiktok => &TIKTOK,
        Platform::Pinterest => &PINTEREST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_platform_has_a_provider() {
        for platform in Platform::ALL {
            assert_eq!(provider(*platform).platform, *platform);
        }
    }

    #[test]
    fn tiktok_quirks() {
        let tiktok = provider(Platform::Tiktok);
        assert_eq!(tiktok.client_id_param, "client_key");
        assert_eq!(tiktok.scope_string(), "user.info.basic,video.publish,video.upload");
        assert!(tiktok.pkce);
    }

    #[test]
    fn parses_either_separator() {
        let x = provider(Platform::X);
        assert_eq!(x.parse_scopes("tweet.read users.read"), vec!["tweet.read", "users.read"]);
        assert_eq!(x.parse_scopes("a,b"), vec!["a", "b"]);
    }

    #[test]
    fn maps_youtube_channel() {
        let body = json!({"items": [{"id": "UC123", "snippet": {"title": "My Channel"}}]});
        let account = (provider(Platform::Youtube).map_account)(&body).unwrap();
        assert_eq!(account.id, "UC123");
        assert_eq!(account.name.as_deref(), Some("My Channel"));
    }

    #[test]
    fn maps_instagram_business_account() {
        let body = json!({"data": [
            {"id": "1", "name": "Page without IG"},
            {"id": "2", "name": "Page", "instagram_business_account": {"id": "17841", "username": "brand"}}
        ]});
        let account = (provider(Platform::Instagram).map_account)(&body).unwrap();
        assert_eq!(account.id, "17841");
        assert_eq!(account.name.as_deref(), Some("brand"));
    }

    #[test]
    fn missing_identity_maps_to_none() {
        assert!((provider(Platform::X).map_account)(&json!({})).is_none());
        assert!((provider(Platform::Facebook).map_account)(&json!({"data": []})).is_none());
    }
}
