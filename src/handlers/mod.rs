// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (bearer JWT) → Elevated (platform admin)

pub mod elevated; // Tier 3: /api/admin/*
pub mod protected; // Tier 2: /api/* behind jwt_auth_middleware
pub mod public; // Tier 1: /, /health, provider callbacks and webhooks
