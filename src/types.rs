/// Shared domain vocabulary used across the codebase
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Generates `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a
/// string-backed enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError::new($kind, other)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Team member role. Declared from lowest to highest rank so the derived
/// ordering matches the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Editor,
    Manager,
    Admin,
    Owner,
}

string_enum!(Role, "role", {
    Editor => "EDITOR",
    Manager => "MANAGER",
    Admin => "ADMIN",
    Owner => "OWNER",
});

impl Role {
    /// OWNER, ADMIN and MANAGER can review and publish content.
    pub fn is_privileged(&self) -> bool {
        *self >= Role::Manager
    }

    pub fn outranks(&self, other: Role) -> bool {
        *self > other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Reel,
    Video,
}

string_enum!(ContentKind, "content kind", {
    Text => "text",
    Image => "image",
    Reel => "reel",
    Video => "video",
});

impl ContentKind {
    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Text => "text_posts",
            ContentKind::Image => "image_posts",
            ContentKind::Reel => "reel_posts",
            ContentKind::Video => "video_posts",
        }
    }

    pub fn has_media(&self) -> bool {
        !matches!(self, ContentKind::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    Draft,
    Pending,
    Approved,
    Scheduled,
    Published,
}

string_enum!(ContentStatus, "content status", {
    Draft => "DRAFT",
    Pending => "PENDING",
    Approved => "APPROVED",
    Scheduled => "SCHEDULED",
    Published => "PUBLISHED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

string_enum!(InviteStatus, "invite status", {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Expired => "EXPIRED",
});

/// External publishing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Facebook,
    Instagram,
    X,
    Tiktok,
    Pinterest,
}

string_enum!(Platform, "platform", {
    Youtube => "youtube",
    Facebook => "facebook",
    Instagram => "instagram",
    X => "x",
    Tiktok => "tiktok",
    Pinterest => "pinterest",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_follows_hierarchy() {
        assert!(Role::Owner.outranks(Role::Admin));
        assert!(Role::Admin.outranks(Role::Manager));
        assert!(Role::Manager.outranks(Role::Editor));
        assert!(!Role::Editor.outranks(Role::Editor));
    }

    #[test]
    fn privileged_roles() {
        assert!(Role::Owner.is_privileged());
        assert!(Role::Admin.is_privileged());
        assert!(Role::Manager.is_privileged());
        assert!(!Role::Editor.is_privileged());
    }

    #[test]
    fn parses_stored_forms() {
        assert_eq!("MANAGER".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("reel".parse::<ContentKind>().unwrap(), ContentKind::Reel);
        assert_eq!("SCHEDULED".parse::<ContentStatus>().unwrap(), ContentStatus::Scheduled);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::X);
        assert!("manager".parse::<Role>().is_err());
        assert!("snapchat".parse::<Platform>().is_err());
    }

    #[test]
    fn serde_matches_stored_form() {
        for status in ContentStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
        for platform in Platform::ALL {
            let json = serde_json::to_value(platform).unwrap();
            assert_eq!(json, serde_json::Value::String(platform.as_str().to_string()));
        }
    }

    #[test]
    fn tables_per_kind() {
        assert_eq!(ContentKind::Video.table(), "video_posts");
        assert!(!ContentKind::Text.has_media());
        assert!(ContentKind::Image.has_media());
    }
}
