pub mod merge;
pub mod store;

pub use merge::merge_recursive;
pub use store::{EntityStore, Partition};
