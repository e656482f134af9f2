// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Provider redirects and Stripe webhooks arrive here without a bearer token.
// They authenticate by other means: a signed OAuth state, or a webhook
// signature.

pub mod billing;
pub mod integrations;
pub mod root;

pub use billing::webhook as stripe_webhook;
pub use integrations::callback as oauth_callback;
pub use root::{health, root};
