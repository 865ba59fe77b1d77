//! Structured logging field name constants for docket.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

/// Correlation ID propagated across request handling. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "dispatch"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "worker", "mailer"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "schedule", "claim_due", "confirm", "send"
pub const OPERATION: &str = "op";

/// Compliance record UUID being operated on.
pub const RECORD_ID: &str = "record_id";

/// Recipient UUID being operated on.
pub const RECIPIENT_ID: &str = "recipient_id";

/// Reminder UUID being operated on.
pub const REMINDER_ID: &str = "reminder_id";

/// Reminder milestone tag.
pub const REMINDER_TYPE: &str = "reminder_type";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query or pass.
pub const RESULT_COUNT: &str = "result_count";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
