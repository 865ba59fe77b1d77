//! Centralized default values for tunable parameters.
//!
//! Every value here can be overridden by configuration; these are the
//! fallbacks when nothing else is specified.

/// Days after the due date that the overdue milestone fires.
pub const OVERDUE_GRACE_DAYS: i64 = 7;

/// Send attempts before a reminder is marked failed.
pub const REMINDER_MAX_RETRIES: i32 = 3;

/// Length of generated confirmation tokens.
pub const TOKEN_LENGTH: usize = 48;

/// Dispatcher polling interval when no reminders are due (milliseconds).
pub const DISPATCH_POLL_INTERVAL_MS: u64 = 30_000;

/// Maximum reminders claimed per dispatcher pass.
pub const DISPATCH_BATCH_SIZE: i64 = 16;

/// Seconds a dispatch claim lease holds before another pass may re-claim
/// a reminder whose outcome was never recorded.
pub const DISPATCH_LEASE_SECS: u64 = 300;

/// Capacity of the dispatcher event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Hard ceiling on requested page sizes.
pub const MAX_PAGE_LIMIT: i64 = 500;
