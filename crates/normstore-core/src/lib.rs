//! NormStore Core - in-memory normalized relational store
//!
//! This crate provides:
//! - Model schemas with attributes, embedded groups and typed relations
//! - Normalization of nested payloads into flat per-entity partitions
//! - A fluent query engine with filters, multi-key ordering, pagination,
//!   relation loading and relation-existence filters
//! - Writes (create, insert, insert-or-update, update, delete) that re-read
//!   and shape what they wrote
//! - A per-database hook pipeline over the read phases
//! - Structured logging and a stable error taxonomy
//!
//! Single-threaded: a `Database` keeps its state in `RefCell`s.

pub mod apply;
pub mod commands;
pub mod config;
pub mod database;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod normalize;
pub mod ops;
pub mod query;
pub mod relations;
pub mod seed;

pub use normstore_core_types as core_types;

// Re-export commonly used types
pub use apply::apply;
pub use commands::Mutation;
pub use config::DatabaseConfig;
pub use database::Database;
pub use errors::{ExError, ExErrorKind, Result, StoreError};
pub use model::{Fields, Identity, ModelInstance, ModelSchema, Record};
pub use query::{
    Condition, Constraint, Direction, Item, Phase, PersistOptions, Repo, ReturnData, Update,
    WhereValue,
};
pub use relations::Relation;
