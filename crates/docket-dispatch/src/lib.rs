//! # docket-dispatch
//!
//! Background reminder dispatch for docket.
//!
//! This crate provides:
//! - A polling dispatcher that claims due reminders and emails them
//! - Retry bookkeeping with a bounded attempt budget per reminder
//! - Progress notifications via broadcast channels
//! - Mailer implementations (HTTP provider API, in-memory mock)
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docket_dispatch::{DispatcherConfig, HttpMailer, ReminderDispatcher};
//! use docket_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let mailer = Arc::new(HttpMailer::from_env()?);
//!
//! let dispatcher = Arc::new(ReminderDispatcher::new(
//!     db,
//!     mailer,
//!     DispatcherConfig::from_env(),
//! ));
//!
//! // Start the loop and get a handle
//! let handle = dispatcher.clone().start();
//!
//! // Listen for events
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod email;
pub mod mailer;
pub mod worker;

// Re-export core types
pub use docket_core::*;

pub use mailer::{HttpMailer, LogMailer, MockMailer};
pub use worker::{DispatcherConfig, DispatcherEvent, DispatcherHandle, ReminderDispatcher};
