//! Role-based authorization for team content and administration.
//!
//! Every check here is a pure function of the actor's role, the content
//! status and whether the actor authored the content. Handlers and services
//! load those facts and call in here before touching storage.

use thiserror::Error;

use crate::types::{ContentStatus, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{0}")]
    Denied(String),

    #[error("cannot move content from {from} to {to}")]
    InvalidTransition { from: ContentStatus, to: ContentStatus },
}

fn deny(reason: impl Into<String>) -> AccessError {
    AccessError::Denied(reason.into())
}

/// Actions on a single content post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAction {
    View,
    Edit,
    Submit,
    Approve,
    Reject,
    Publish,
    Delete,
}

/// Team-level actions that do not involve a specific post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAction {
    Rename,
    ViewInvites,
    ManageIntegrations,
    ManageBilling,
    DeleteTeam,
}

/// The member performing an action
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub role: Role,
    pub is_author: bool,
}

impl Actor {
    pub fn new(role: Role, is_author: bool) -> Self {
        Self { role, is_author }
    }
}

/// Check whether a new post may be created directly in `status`.
pub fn check_create(role: Role, status: ContentStatus) -> Result<(), AccessError> {
    match status {
        ContentStatus::Draft | ContentStatus::Pending => Ok(()),
        ContentStatus::Approved | ContentStatus::Scheduled if role.is_privileged() => Ok(()),
        ContentStatus::Approved | ContentStatus::Scheduled => {
            Err(deny("Editors must submit content for approval"))
        }
        ContentStatus::Published => Err(deny("Content is published through the publish action")),
    }
}

/// Check a content action against the post's current status.
pub fn check_content(actor: Actor, action: ContentAction, status: ContentStatus) -> Result<(), AccessError> {
    let privileged = actor.role.is_privileged();

    match action {
        ContentAction::View => Ok(()),

        ContentAction::Edit => match status {
            ContentStatus::Published => Err(deny("Published content cannot be edited")),
            _ if privileged => Ok(()),
            ContentStatus::Draft if actor.is_author => Ok(()),
            ContentStatus::Draft => Err(deny("Editors can only edit their own drafts")),
            ContentStatus::Pending => Err(deny("Pending content is locked until it is reviewed")),
            _ => Err(deny("Approved content can only be edited by owners, admins and managers")),
        },

        ContentAction::Submit => {
            if !(privileged || actor.is_author) {
                return Err(deny("Only the author can submit this content"));
            }
            match status {
                ContentStatus::Draft => Ok(()),
                other => Err(AccessError::InvalidTransition {
                    from: other,
                    to: ContentStatus::Pending,
                }),
            }
        }

        ContentAction::Approve | ContentAction::Reject => {
            if !privileged {
                return Err(deny("Only owners, admins and managers can review content"));
            }
            match status {
                ContentStatus::Pending => Ok(()),
                other => Err(AccessError::InvalidTransition {
                    from: other,
                    to: if action == ContentAction::Approve {
                        ContentStatus::Approved
                    } else {
                        ContentStatus::Draft
                    },
                }),
            }
        }

        ContentAction::Publish => {
            if !privileged {
                return Err(deny("Only owners, admins and managers can publish content"));
            }
            match status {
                ContentStatus::Published => Err(AccessError::InvalidTransition {
                    from: status,
                    to: ContentStatus::Published,
                }),
                _ => Ok(()),
            }
        }

        ContentAction::Delete => {
            if privileged {
                return Ok(());
            }
            match status {
                ContentStatus::Draft if actor.is_author => Ok(()),
                ContentStatus::Draft => Err(deny("Editors can only delete their own drafts")),
                _ => Err(deny("Only drafts can be deleted by editors")),
            }
        }
    }
}

/// Check a status change requested through an edit.
pub fn check_transition(actor: Actor, from: ContentStatus, to: ContentStatus) -> Result<(), AccessError> {
    if from == to {
        return check_content(actor, ContentAction::Edit, from);
    }
    if from == ContentStatus::Published || to == ContentStatus::Published {
        return Err(AccessError::InvalidTransition { from, to });
    }

    match to {
        ContentStatus::Pending => check_content(actor, ContentAction::Submit, from),
        ContentStatus::Draft => check_content(actor, ContentAction::Reject, from),
        ContentStatus::Approved | ContentStatus::Scheduled => check_content(actor, ContentAction::Approve, from)
            .map_err(|e| match e {
                AccessError::InvalidTransition { from, .. } => AccessError::InvalidTransition { from, to },
                denied => denied,
            }),
        ContentStatus::Published => Err(AccessError::InvalidTransition { from, to }),
    }
}

/// Status a pending post moves to on approval.
pub fn approval_target(has_schedule: bool) -> ContentStatus {
    if has_schedule {
        ContentStatus::Scheduled
    } else {
        ContentStatus::Approved
    }
}

pub fn check_team(role: Role, action: TeamAction) -> Result<(), AccessError> {
    let allowed = match action {
        TeamAction::Rename | TeamAction::ViewInvites | TeamAction::ManageIntegrations => role >= Role::Admin,
        TeamAction::ManageBilling | TeamAction::DeleteTeam => role == Role::Owner,
    };

    if allowed {
        Ok(())
    } else {
        Err(deny(match action {
            TeamAction::Rename => "Only owners and admins can rename the team",
            TeamAction::ViewInvites => "Only owners and admins can manage invitations",
            TeamAction::ManageIntegrations => "Only owners and admins can manage integrations",
            TeamAction::ManageBilling => "Only the team owner can manage billing",
            TeamAction::DeleteTeam => "Only the team owner can delete the team",
        }))
    }
}

pub fn check_invite(inviter: Role, invited: Role) -> Result<(), AccessError> {
    if inviter < Role::Admin {
        return Err(deny("Only owners and admins can invite members"));
    }
    if invited == Role::Owner {
        return Err(deny("A team has exactly one owner"));
    }
    if !inviter.outranks(invited) {
        return Err(deny(format!("{} cannot invite a member as {}", inviter, invited)));
    }
    Ok(())
}

pub fn check_role_change(actor: Role, current: Role, new_role: Role) -> Result<(), AccessError> {
    if actor < Role::Admin {
        return Err(deny("Only owners and admins can change roles"));
    }
    if current == Role::Owner || new_role == Role::Owner {
        return Err(deny("Team ownership cannot be changed through roles"));
    }
    if !actor.outranks(current) || !actor.outranks(new_role) {
        return Err(deny(format!("{} cannot assign {} to a {}", actor, new_role, current)));
    }
    Ok(())
}

/// `is_self` covers a member leaving the team.
pub fn check_remove(actor: Role, target: Role, is_self: bool) -> Result<(), AccessError> {
    if target == Role::Owner {
        return Err(deny("The team owner cannot be removed"));
    }
    if is_self {
        return Ok(());
    }
    if actor < Role::Admin || !actor.outranks(target) {
        return Err(deny(format!("{} cannot remove a {}", actor, target)));
    }
    Ok(())
}
