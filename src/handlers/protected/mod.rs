// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here runs behind jwt_auth_middleware, which upserts the caller
// and injects `AuthUser`. Team membership and role checks happen in the
// services these handlers call.

pub mod billing;
pub mod content;
pub mod integrations;
pub mod invites;
pub mod me;
pub mod members;
pub mod teams;
pub mod uploads;

pub use me::get as me_get;

pub use teams::create as teams_create;
pub use teams::delete as team_delete;
pub use teams::get as team_get;
pub use teams::list as teams_list;
pub use teams::rename as team_rename;

pub use members::list as members_list;
pub use members::remove as member_remove;
pub use members::update as member_update;

pub use invites::accept as invite_accept;
pub use invites::cancel as invite_cancel;
pub use invites::create as invite_create;
pub use invites::list as invites_list;
pub use invites::preview as invite_preview;
pub use invites::reject as invite_reject;

pub use content::approve as content_approve;
pub use content::create as content_create;
pub use content::delete as content_delete;
pub use content::get as content_get;
pub use content::list as content_list;
pub use content::media as content_media;
pub use content::publish as content_publish;
pub use content::reject as content_reject;
pub use content::submit as content_submit;
pub use content::update as content_update;

pub use uploads::create as upload_create;

pub use integrations::authorize as integration_authorize;
pub use integrations::disconnect as integration_disconnect;
pub use integrations::list as integrations_list;
pub use integrations::refresh as integration_refresh;

pub use billing::checkout as billing_checkout;
pub use billing::get as billing_get;
pub use billing::portal as billing_portal;
