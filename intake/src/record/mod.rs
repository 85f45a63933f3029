//! Aggregate record model and the copy-on-write editor

mod editor;
mod node;
mod path;
mod types;

pub use editor::{remove_value, set_value};
pub use node::{NodeMap, RecordNode};
pub use path::{FieldPath, PathSegment};
pub use types::{AggregateRecord, Reference};
