//! snapaddon: runtime for webhook-driven chat add-ons
//!
//! Tracks tenant installations, keeps each tenant's OAuth access token
//! fresh, authenticates signed platform callbacks, and posts room
//! notifications and glance updates on a tenant's behalf.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapaddon::prelude::*;
//!
//! # async fn example() -> snapaddon::error::Result<()> {
//! let store = Arc::new(FileInstallationStore::open("state.json")?);
//! let runtime = AddonRuntime::new(store);
//! let record = runtime.installation("acme")?;
//! runtime.send_notification(&record, &Notification::text("Hello!")).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod installation;
pub mod notification;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
pub mod token;

#[cfg(feature = "cli")]
pub mod cli;
