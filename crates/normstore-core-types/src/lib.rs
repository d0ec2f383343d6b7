//! Core types shared across normstore facilities
//!
//! This crate holds the canonical field keys and event names used by the
//! structured logging macros and by tests that assert on captured events.

pub mod schema;
