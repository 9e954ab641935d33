//! # Classdiary - backend for a class diary Telegram Mini App
//!
//! Students earn stickers for homework and attendance, spend them on
//! cosmetics for a virtual pet that has to be looked after during the day,
//! and are shown a gift every few stickers. Admins curate topics and
//! homework, review uploaded homework and correct sticker counts.
//!
//! ## Features
//!
//! - **Reward ladder**: Gift milestones derived from lifetime earned stickers, with idempotent acknowledgement.
//! - **Virtual pet**: Lazily evaluated task scheduler with a daily cap, a local activity window and deadlines.
//! - **Cosmetic shop**: Atomic purchases, one equipped item per slot, inventory that survives a pet's death.
//! - **Content**: Topics, homework, and homework submissions with base64 media uploads.
//! - **Storage**: One JSON document guarded by an `fs2` file lock and atomic renames.
//! - **HTTP API**: axum routes with Argon2-protected admin endpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classdiary::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     classdiary::api::serve(config).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`diary`] - Domain model and the operations on it
//! - [`storage`] - Document persistence and the [`storage::UserStore`] seam
//! - [`api`] - HTTP routes, admin auth and error mapping
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Input validation and sanitization utilities
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP API      │ ← axum handlers, admin auth
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Diary         │ ← pet, shop, rewards, content
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Storage       │ ← db.json + uploads/
//! └─────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod diary;
pub mod logutil;
pub mod storage;
pub mod validation;
