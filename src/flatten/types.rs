use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

/// A structured record: field name to scalar, nested record or list
pub type Record = Map<String, Value>;

/// A flattened row; keys follow the column order of its `FlatSchema`
pub type FlatRecord = Map<String, Value>;

/// Shape of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataType {
    Scalar,
    Struct { fields: Vec<Field> },
    List { element: Box<DataType> },
}

impl DataType {
    pub fn list_of(element: DataType) -> Self {
        DataType::List {
            element: Box::new(element),
        }
    }

    pub fn is_complex(&self) -> bool {
        !matches!(self, DataType::Scalar)
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            DataType::Scalar => "scalar",
            DataType::Struct { .. } => "struct",
            DataType::List { .. } => "list",
        }
    }
}

/// A named field of a schema or struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Field {
            name: name.into(),
            data_type,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Field::new(name, DataType::Scalar)
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Field::new(name, DataType::Struct { fields })
    }

    pub fn list(name: impl Into<String>, element: DataType) -> Self {
        Field::new(name, DataType::list_of(element))
    }
}

/// Ordered top-level fields of a record stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting duplicate sibling names at any level
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        check_siblings(&fields, "")?;
        Ok(Schema { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_flat(&self) -> bool {
        self.fields.iter().all(|f| !f.data_type.is_complex())
    }

    /// Render the schema as an indented tree
    pub fn tree_string(&self) -> String {
        let mut out = String::from("root\n");
        for field in &self.fields {
            write_tree(&mut out, &field.name, &field.data_type, 1);
        }
        out
    }
}

impl TryFrom<Vec<Field>> for Schema {
    type Error = FlattenError;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<Field> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

fn check_siblings(fields: &[Field], parent: &str) -> Result<()> {
    // sibling position of each name, so both duplicates can be told apart
    let mut seen = HashMap::new();
    for (index, field) in fields.iter().enumerate() {
        let path = join_path(parent, &field.name);
        if let Some(first) = seen.insert(field.name.as_str(), index) {
            return Err(FlattenError::NameCollision {
                name: field.name.clone(),
                first: format!("{} (field {})", path, first + 1),
                second: format!("{} (field {})", path, index + 1),
            });
        }
        check_type(&field.data_type, &path)?;
    }
    Ok(())
}

fn check_type(data_type: &DataType, path: &str) -> Result<()> {
    match data_type {
        DataType::Scalar => Ok(()),
        DataType::Struct { fields } => check_siblings(fields, path),
        DataType::List { element } => check_type(element, &format!("{}[]", path)),
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn write_tree(out: &mut String, name: &str, data_type: &DataType, level: usize) {
    let indent = " |   ".repeat(level - 1);
    let _ = writeln!(out, "{} |-- {}: {}", indent, name, data_type.label());
    match data_type {
        DataType::Scalar => {}
        DataType::Struct { fields } => {
            for field in fields {
                write_tree(out, &field.name, &field.data_type, level + 1);
            }
        }
        DataType::List { element } => write_tree(out, "element", element, level + 1),
    }
}

/// A scalar output column and the nested path it was taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatColumn {
    pub name: String,
    pub source: String,
}

/// Schema of flattened rows: scalar columns only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatSchema {
    pub columns: Vec<FlatColumn>,
}

impl FlatSchema {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The equivalent all-scalar nested schema
    pub fn to_schema(&self) -> Schema {
        Schema {
            fields: self.columns.iter().map(|c| Field::scalar(c.name.clone())).collect(),
        }
    }
}

/// What to emit for a row whose list is empty or null
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyListPolicy {
    /// Remove the row
    #[default]
    Drop,
    /// Keep one row with the list column set to null
    Null,
}

impl FromStr for EmptyListPolicy {
    type Err = FlattenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(EmptyListPolicy::Drop),
            "null" => Ok(EmptyListPolicy::Null),
            other => Err(FlattenError::UnsupportedFormat(format!(
                "unknown empty-list policy `{}` (use drop or null)",
                other
            ))),
        }
    }
}

/// Configuration for the flattening process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Separator between parent and child names
    pub separator: String,

    /// Behaviour for empty or null lists
    pub empty_lists: EmptyListPolicy,

    /// Maximum struct/list nesting a column may come from
    pub max_depth: usize,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            separator: String::from("_"),
            empty_lists: EmptyListPolicy::Drop,
            max_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_schema() -> Schema {
        Schema::new(vec![
            Field::scalar("id"),
            Field::structure(
                "address",
                vec![Field::scalar("city"), Field::scalar("zip")],
            ),
            Field::list("tags", DataType::Scalar),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_siblings_rejected() {
        let err = Schema::new(vec![Field::scalar("id"), Field::scalar("id")]).unwrap_err();
        assert!(matches!(err, FlattenError::NameCollision { .. }));

        let nested = Schema::new(vec![Field::structure(
            "a",
            vec![Field::scalar("x"), Field::scalar("x")],
        )]);
        match nested {
            Err(FlattenError::NameCollision { first, second, .. }) => {
                assert_eq!(first, "a.x (field 1)");
                assert_eq!(second, "a.x (field 2)");
            }
            other => panic!("Expected NameCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_same_name_in_different_structs_is_fine() {
        let schema = Schema::new(vec![
            Field::structure("a", vec![Field::scalar("x")]),
            Field::structure("b", vec![Field::scalar("x")]),
        ]);
        assert!(schema.is_ok());
    }

    #[test]
    fn test_schema_serde_shape() {
        let schema = address_schema();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json[0], serde_json::json!({"name": "id", "type": "scalar"}));
        assert_eq!(json[2]["element"], serde_json::json!({"type": "scalar"}));

        let back: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_deserialize_validates_siblings() {
        let json = serde_json::json!([
            {"name": "id", "type": "scalar"},
            {"name": "id", "type": "scalar"}
        ]);
        assert!(serde_json::from_value::<Schema>(json).is_err());
    }

    #[test]
    fn test_tree_string() {
        let tree = address_schema().tree_string();
        let expected = "root\n \
|-- id: scalar\n \
|-- address: struct\n \
|    |-- city: scalar\n \
|    |-- zip: scalar\n \
|-- tags: list\n \
|    |-- element: scalar\n";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_empty_list_policy_from_str() {
        assert_eq!("drop".parse::<EmptyListPolicy>().unwrap(), EmptyListPolicy::Drop);
        assert_eq!("NULL".parse::<EmptyListPolicy>().unwrap(), EmptyListPolicy::Null);
        assert!("keep".parse::<EmptyListPolicy>().is_err());
    }

    #[test]
    fn test_flat_schema_to_schema_is_flat() {
        let flat = FlatSchema {
            columns: vec![
                FlatColumn { name: "id".into(), source: "id".into() },
                FlatColumn { name: "a_b".into(), source: "a.b".into() },
            ],
        };
        let schema = flat.to_schema();
        assert!(schema.is_flat());
        assert_eq!(schema.fields()[1].name, "a_b");
    }
}
