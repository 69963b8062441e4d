//! Schema definitions: column kinds, table models and snapshots.

pub mod column;
pub mod model;
pub mod snapshot;

pub use column::{Column, ColumnType};
pub use model::{ForeignKey, Model};
pub use snapshot::{SchemaSnapshot, TableSnapshot};
