//! # Flatbed - flattening nested JSON and XML into tables
//!
//! Records whose fields are structs or lists (to any depth) are turned into
//! rows of scalar columns. Struct fields are split into one column per
//! child, named by joining the path with a separator (`address_city`);
//! list fields are exploded into one row per element.
//!
//! ## Modules
//!
//! - **flatten**: the schema pre-pass and row-level flattener
//! - **schema**: schema inference from sample records
//! - **ingest**: JSON / XML documents into records
//! - **output**: JSON Lines and table sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use flatbed::flatten::{flatten, DataType, Field, FlattenConfig, Schema};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), flatbed::FlattenError> {
//! let schema = Schema::new(vec![
//!     Field::scalar("id"),
//!     Field::list("items", DataType::Struct { fields: vec![Field::scalar("sku")] }),
//! ])?;
//!
//! let record = json!({"id": 1, "items": [{"sku": "A"}, {"sku": "B"}]});
//! let record = record.as_object().cloned().unwrap_or_default();
//!
//! let (flat_schema, rows) = flatten(&schema, vec![record], FlattenConfig::default())?;
//!
//! assert_eq!(flat_schema.names().collect::<Vec<_>>(), vec!["id", "items_sku"]);
//! assert_eq!(rows.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod error;
pub mod flatten;
pub mod ingest;
pub mod output;
pub mod schema;

// Re-export commonly used types for convenience
pub use error::{FlattenError, Result};
pub use flatten::{
    DataType, EmptyListPolicy, Field, FlatRecord, FlatSchema, FlattenConfig, Record, Schema, SchemaFlattener,
};
pub use ingest::{Document, Format, IngestOptions};
pub use schema::{infer_schema, SchemaBuilder};

/// Main entry point: read a JSON or XML file and flatten it
pub fn read_and_flatten_file<P: AsRef<Path>>(
    path: P,
    options: &IngestOptions,
    config: FlattenConfig,
) -> Result<(FlatSchema, Vec<FlatRecord>)> {
    let document = ingest::load_path(path, options)?;
    flatten_document(document, config)
}

/// Flatten an already loaded document
pub fn flatten_document(document: Document, config: FlattenConfig) -> Result<(FlatSchema, Vec<FlatRecord>)> {
    let flattener = SchemaFlattener::new(&document.schema, config)?;
    let rows = flattener.flatten_par(document.records)?;
    Ok((flattener.flat_schema().clone(), rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_flattening() {
        let document = ingest::load_bytes(
            br#"[{"id": 1, "address": {"city": "X", "zip": "00000"}, "tags": ["a", "b"]}]"#.to_vec(),
            &IngestOptions::json(),
        )
        .unwrap();

        let (schema, rows) = flatten_document(document, FlattenConfig::default()).unwrap();

        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["id", "address_city", "address_zip", "tags"]
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("tags").unwrap(), "b");
    }
}
