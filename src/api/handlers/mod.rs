//! API handlers.
//!
//! Handlers are stateless; the store and auth state arrive as `Extension`
//! layers installed by `api::app`.

pub mod auth;
pub mod health;
pub mod me;
pub mod root;
