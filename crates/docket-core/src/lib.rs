//! # docket-core
//!
//! Core types, traits, and abstractions for docket, a compliance obligation
//! reminder and confirmation service.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other docket crates depend on: the compliance
//! entities and their state machines, the error taxonomy, repository and
//! mailer traits, request validation, and shared defaults.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod validate;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
