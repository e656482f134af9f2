// handlers/elevated/mod.rs - Elevated handlers (platform administrators)
//
// Routes here run behind jwt_auth_middleware and require_admin. They act
// across teams, so they bypass team membership entirely.

pub mod admin;

pub use admin::user_delete as admin_user_delete;
