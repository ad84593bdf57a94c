//! Schema inference
//!
//! Derives the nested `Schema` of a record stream from sample records.

pub mod builder;

pub use builder::{infer_schema, SchemaBuilder};
