//! Canonical schema constants for structured logging and events
//!
//! These constants keep the logging macros, the engine internals and the
//! log-capture tests in agreement on field names.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Query engine context
pub const FIELD_ENTITY: &str = "entity";
pub const FIELD_PHASE: &str = "phase";
pub const FIELD_RELATION: &str = "relation";

// Collection sizes
pub const FIELD_COUNT: &str = "count";
pub const FIELD_AFFECTED: &str = "affected";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
