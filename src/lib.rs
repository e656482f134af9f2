pub mod access;
pub mod app;
pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod mail;
pub mod middleware;
pub mod publisher;
pub mod services;
pub mod storage;
pub mod testing;
pub mod types;
