//! Streaming schema inference
//!
//! Accumulates the shape of every field across sample records and builds
//! the nested `Schema` once at the end. Objects become structs, arrays
//! become lists whose element shape is unified over all elements, and
//! everything else is a scalar. Nulls and empty arrays carry no shape
//! information and unify with anything.
//!
//! Sources that cannot tell a single child from a one-element list (XML)
//! can opt into `singleton_lists`: a value `X` and a list `List<X>` seen at
//! the same path then unify to `List<X>`.

use crate::error::{FlattenError, Result};
use crate::flatten::flattener::kind;
use crate::flatten::types::{join_path, DataType, Field, Record, Schema};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Shape observed so far at one path
#[derive(Debug, Default)]
enum ShapeBuilder {
    /// Only nulls seen
    #[default]
    Unknown,
    Scalar,
    Object(ObjectBuilder),
    Array(Box<ShapeBuilder>),
}

impl ShapeBuilder {
    fn label(&self) -> &'static str {
        match self {
            ShapeBuilder::Unknown => "null",
            ShapeBuilder::Scalar => "scalar",
            ShapeBuilder::Object(_) => "struct",
            ShapeBuilder::Array(_) => "list",
        }
    }

    fn add_value(&mut self, value: &Value, path: &str, singletons: bool) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }

        if singletons && value.is_array() && matches!(self, ShapeBuilder::Scalar | ShapeBuilder::Object(_)) {
            let single = std::mem::take(self);
            *self = ShapeBuilder::Array(Box::new(single));
        }

        if matches!(self, ShapeBuilder::Unknown) {
            *self = match value {
                Value::Object(_) => ShapeBuilder::Object(ObjectBuilder::default()),
                Value::Array(_) => ShapeBuilder::Array(Box::default()),
                _ => ShapeBuilder::Scalar,
            };
        }

        match (&mut *self, value) {
            (ShapeBuilder::Object(builder), Value::Object(obj)) => builder.add_object(obj, path, singletons),
            (ShapeBuilder::Array(items), Value::Array(arr)) => {
                let item_path = format!("{}[]", path);
                for item in arr {
                    items.add_value(item, &item_path, singletons)?;
                }
                Ok(())
            }
            (ShapeBuilder::Array(items), v) if singletons => items.add_value(v, &format!("{}[]", path), singletons),
            (ShapeBuilder::Scalar, v) if !v.is_object() && !v.is_array() => Ok(()),
            (shape, v) => Err(FlattenError::mismatch(path, shape.label(), kind(v))),
        }
    }

    fn build(self) -> Result<DataType> {
        Ok(match self {
            ShapeBuilder::Unknown | ShapeBuilder::Scalar => DataType::Scalar,
            ShapeBuilder::Object(builder) => DataType::Struct {
                fields: builder.build()?,
            },
            ShapeBuilder::Array(items) => DataType::list_of(items.build()?),
        })
    }
}

/// Properties of an object, in first-seen order
#[derive(Debug, Default)]
struct ObjectBuilder {
    order: Vec<String>,
    properties: HashMap<String, ShapeBuilder>,
}

impl ObjectBuilder {
    fn add_object(&mut self, obj: &Map<String, Value>, parent: &str, singletons: bool) -> Result<()> {
        for (key, value) in obj.iter() {
            if !self.properties.contains_key(key) {
                self.order.push(key.clone());
            }
            self.properties
                .entry(key.clone())
                .or_default()
                .add_value(value, &join_path(parent, key), singletons)?;
        }
        Ok(())
    }

    fn build(mut self) -> Result<Vec<Field>> {
        self.order
            .into_iter()
            .map(|name| {
                let shape = self.properties.remove(&name).unwrap_or_default();
                Ok(Field::new(name, shape.build()?))
            })
            .collect()
    }
}

/// Builder accumulating the schema of a record stream
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    root: ObjectBuilder,
    sample_count: usize,
    singleton_lists: bool,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder where a lone value and a list at the same path unify to a list
    pub fn with_singleton_lists() -> Self {
        SchemaBuilder {
            singleton_lists: true,
            ..Self::default()
        }
    }

    /// Add one record; fails if its shape contradicts earlier records
    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        self.sample_count += 1;
        self.root.add_object(record, "", self.singleton_lists)
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Build the final schema from accumulated observations
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.root.build()?)
    }
}

/// Infer a schema from a slice of records in one pass
pub fn infer_schema(records: &[Record]) -> Result<Schema> {
    let mut builder = SchemaBuilder::new();
    for record in records {
        builder.add_record(record)?;
    }
    builder.build()
}
