//! Handler modules for docket-api.
//!
//! One module per resource; the public confirmation gateway lives in
//! [`confirm`] and is the only surface that skips authentication.

pub mod confirm;
pub mod recipients;
pub mod records;
pub mod reminders;
pub mod system;
