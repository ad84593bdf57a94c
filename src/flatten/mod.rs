//! Recursive schema flattening
//!
//! Struct fields are split into one column per child (column-level) and list
//! fields are exploded into one row per element (row-level), repeatedly,
//! until only scalar columns remain.
//!
//! The structural work is done once per schema by `FlattenPlan`; the
//! `SchemaFlattener` then replays the plan on each record, which makes it
//! safe to share across threads.

pub mod types;
pub mod plan;
pub mod flattener;

pub use types::{
    DataType, EmptyListPolicy, Field, FlatColumn, FlatRecord, FlatSchema, FlattenConfig, Record, Schema,
};
pub use plan::{FlattenPlan, Step};
pub use flattener::{flatten, FlatRecords, SchemaFlattener};
