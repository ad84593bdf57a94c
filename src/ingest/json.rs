//! JSON documents: a top-level array of records, a single record, or
//! newline-delimited records

use crate::error::{FlattenError, Result};
use crate::flatten::flattener::kind;
use crate::flatten::types::Record;
use log::debug;
use serde_json::Value;

/// Parse a whole JSON document into records
pub fn parse_records(content: Vec<u8>) -> Result<Vec<Record>> {
    // simd-json rewrites its input buffer, keep the original for the fallback
    let mut scratch = content.clone();

    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| into_record(item, &format!("$[{}]", i)))
            .collect(),
        Ok(value) => Ok(vec![into_record(value, "$")?]),
        Err(err) => {
            debug!("not a single JSON document ({}), reading as NDJSON", err);
            parse_ndjson(&content)
        }
    }
}

/// Parse newline-delimited JSON; every value must be an object
pub fn parse_ndjson(content: &[u8]) -> Result<Vec<Record>> {
    let stream = serde_json::Deserializer::from_slice(content).into_iter::<Value>();
    stream
        .enumerate()
        .map(|(i, value)| into_record(value?, &format!("$[{}]", i)))
        .collect()
}

fn into_record(value: Value, path: &str) -> Result<Record> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(FlattenError::mismatch(path, "struct", kind(&other))),
    }
}
