//! Memora: a session-gated memo service.
//!
//! Authenticated users create, list, edit, delete and tag short text or voice
//! memos. Identity is delegated to an external GoTrue-compatible auth
//! provider; Memora only stores memos and a mirror of the users who own them.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (rusqlite, bundled) behind a single mutex-guarded
//!   connection, accessed from `spawn_blocking`
//! - **HTTP**: axum with a route-guard middleware that redirects by session
//!   presence and path class
//! - **Auth**: cookie-carried access/refresh tokens validated and rotated
//!   through the [`auth::provider::AuthProvider`] trait
//! - **Pagination**: stateless cursors on `createdAt`
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`memo`]: Memo repository: validation, CRUD, listing, tags, stats
//! - [`auth`]: Session resolution, the auth provider client, and the route guard
//! - [`api`]: HTTP handlers and the JSON error envelope
//! - [`client`]: Typed API client and the UI-side auth/memo stores
//! - [`server`]: Router assembly and the serve loop

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod memo;
pub mod server;
