//! Query engine: plan building, read pipeline, relation loading and writes

pub mod has;
pub mod hooks;
pub mod persist;
pub mod plan;
pub mod predicate;
mod read;
pub mod repo;
pub mod shape;
pub mod sort;

pub use has::{Comparator, HasConstraint};
pub use hooks::{HookId, HookRegistry, Phase};
pub use persist::{Condition, PersistOptions, Update};
pub use plan::{Boolean, Constraint, Direction, Load, Order, QueryPlan, WhereClause, WhereValue};
pub use repo::Repo;
pub use shape::{Item, ReturnData};
