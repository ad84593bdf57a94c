//! Row-level flattening driven by a pre-computed `FlattenPlan`

use crate::error::{FlattenError, Result};
use crate::flatten::plan::{FlattenPlan, Step};
use crate::flatten::types::{
    join_path, DataType, EmptyListPolicy, Field, FlatRecord, FlatSchema, FlattenConfig, Record, Schema,
};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Flattens records of one schema into scalar-only rows
#[derive(Debug, Clone)]
pub struct SchemaFlattener {
    plan: FlattenPlan,
}

impl SchemaFlattener {
    /// Run the schema pre-pass; schema-level errors surface here
    pub fn new(schema: &Schema, config: FlattenConfig) -> Result<Self> {
        let plan = FlattenPlan::from_schema(schema, config)?;
        Ok(Self::from_plan(plan))
    }

    pub fn from_plan(plan: FlattenPlan) -> Self {
        SchemaFlattener { plan }
    }

    pub fn flat_schema(&self) -> &FlatSchema {
        &self.plan.flat_schema
    }

    pub fn plan(&self) -> &FlattenPlan {
        &self.plan
    }

    /// Flatten one record into zero or more flat rows
    ///
    /// The whole record is checked against the schema first, so a list that
    /// explodes into no rows cannot hide a mismatch elsewhere in the record.
    pub fn flatten_record(&self, mut record: Record) -> Result<Vec<FlatRecord>> {
        check_record(&record, self.plan.input.fields(), "")?;

        let fields = self.plan.input.fields();
        let mut row = Vec::with_capacity(fields.len());
        for field in fields {
            row.push(record.remove(&field.name).unwrap_or(Value::Null));
        }

        let mut rows = vec![row];
        for step in &self.plan.steps {
            rows = self.apply(step, rows)?;
            if rows.is_empty() {
                break;
            }
        }

        rows.into_iter().map(|row| self.finish(row)).collect()
    }

    /// Lazily flatten a stream of records
    pub fn flatten_records<I>(&self, records: I) -> FlatRecords<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Record>,
    {
        FlatRecords {
            flattener: self,
            records: records.into_iter(),
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Flatten a batch on the rayon pool, keeping input order
    pub fn flatten_par(&self, records: Vec<Record>) -> Result<Vec<FlatRecord>> {
        let batches = records
            .into_par_iter()
            .map(|record| self.flatten_record(record))
            .collect::<Result<Vec<_>>>()?;
        Ok(batches.into_iter().flatten().collect())
    }

    fn apply(&self, step: &Step, rows: Vec<Vec<Value>>) -> Result<Vec<Vec<Value>>> {
        match step {
            Step::Expand {
                index,
                path,
                children,
            } => rows
                .into_iter()
                .map(|row| expand(row, *index, path, children))
                .collect(),
            Step::Explode { index, path } => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    explode(row, *index, path, self.plan.config.empty_lists, &mut out)?;
                }
                Ok(out)
            }
        }
    }

    fn finish(&self, row: Vec<Value>) -> Result<FlatRecord> {
        let mut flat = FlatRecord::new();
        for (column, value) in self.plan.flat_schema.columns.iter().zip(row) {
            if matches!(value, Value::Object(_) | Value::Array(_)) {
                return Err(FlattenError::mismatch(&column.source, "scalar", kind(&value)));
            }
            flat.insert(column.name.clone(), value);
        }
        Ok(flat)
    }
}

fn expand(mut row: Vec<Value>, index: usize, path: &str, children: &[String]) -> Result<Vec<Value>> {
    let values: Vec<Value> = match std::mem::take(&mut row[index]) {
        Value::Object(mut obj) => {
            let values = children
                .iter()
                .map(|child| obj.remove(child).unwrap_or(Value::Null))
                .collect();
            if let Some((key, value)) = obj.into_iter().next() {
                return Err(FlattenError::mismatch(
                    format!("{}.{}", path, key),
                    "no such field",
                    kind(&value),
                ));
            }
            values
        }
        Value::Null => vec![Value::Null; children.len()],
        other => return Err(FlattenError::mismatch(path, "struct", kind(&other))),
    };
    row.splice(index..=index, values);
    Ok(row)
}

fn explode(
    mut row: Vec<Value>,
    index: usize,
    path: &str,
    policy: EmptyListPolicy,
    out: &mut Vec<Vec<Value>>,
) -> Result<()> {
    let items = match std::mem::take(&mut row[index]) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => return Err(FlattenError::mismatch(path, "list", kind(&other))),
    };

    if items.is_empty() {
        if policy == EmptyListPolicy::Null {
            out.push(row);
        }
        return Ok(());
    }

    let last = items.len() - 1;
    for (i, item) in items.into_iter().enumerate() {
        if i == last {
            row[index] = item;
            out.push(row);
            break;
        }
        let mut copy = row.clone();
        copy[index] = item;
        out.push(copy);
    }
    Ok(())
}

/// Every key must be declared and every value must fit its field's shape
fn check_record(record: &Map<String, Value>, fields: &[Field], parent: &str) -> Result<()> {
    if let Some((key, value)) = record
        .iter()
        .find(|(key, _)| !fields.iter().any(|f| &f.name == *key))
    {
        return Err(FlattenError::mismatch(join_path(parent, key), "no such field", kind(value)));
    }

    for field in fields {
        if let Some(value) = record.get(&field.name) {
            check_shape(value, &field.data_type, &join_path(parent, &field.name))?;
        }
    }
    Ok(())
}

fn check_shape(value: &Value, data_type: &DataType, path: &str) -> Result<()> {
    match (data_type, value) {
        (_, Value::Null) => Ok(()),
        (DataType::Scalar, Value::Object(_) | Value::Array(_)) => {
            Err(FlattenError::mismatch(path, "scalar", kind(value)))
        }
        (DataType::Scalar, _) => Ok(()),
        (DataType::Struct { fields }, Value::Object(obj)) => check_record(obj, fields, path),
        (DataType::List { element }, Value::Array(items)) => {
            let item_path = format!("{}[]", path);
            items.iter().try_for_each(|item| check_shape(item, element, &item_path))
        }
        (other, _) => Err(FlattenError::mismatch(path, other.label(), kind(value))),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "struct",
    }
}

/// Iterator over flat rows produced from a record stream
///
/// Stops after the first error.
pub struct FlatRecords<'a, I> {
    flattener: &'a SchemaFlattener,
    records: I,
    pending: VecDeque<FlatRecord>,
    failed: bool,
}

impl<I> Iterator for FlatRecords<'_, I>
where
    I: Iterator<Item = Record>,
{
    type Item = Result<FlatRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.failed {
                return None;
            }
            let record = self.records.next()?;
            match self.flattener.flatten_record(record) {
                Ok(rows) => self.pending.extend(rows),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Flatten a whole batch: the flat schema and every flat row
pub fn flatten<I>(schema: &Schema, records: I, config: FlattenConfig) -> Result<(FlatSchema, Vec<FlatRecord>)>
where
    I: IntoIterator<Item = Record>,
{
    let flattener = SchemaFlattener::new(schema, config)?;
    let rows = flattener.flatten_records(records).collect::<Result<Vec<_>>>()?;
    Ok((flattener.plan.flat_schema, rows))
}
