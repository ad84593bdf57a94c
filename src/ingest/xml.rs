//! XML documents: each element named by the row tag is one record
//!
//! Mapping from elements to values:
//! - attributes become fields prefixed with `_`
//! - child elements become fields; repeated children become a list
//! - a text-only element becomes a typed scalar
//! - text next to attributes or children is stored in `_VALUE`
//! - an empty element is null

use crate::error::{FlattenError, Result};
use crate::flatten::types::{DataType, Field, Record};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Number, Value};

const VALUE_FIELD: &str = "_VALUE";
const ATTRIBUTE_PREFIX: &str = "_";

/// An element being assembled
#[derive(Debug, Default)]
struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let mut frame = Frame {
            name: element_name(start)?,
            ..Frame::default()
        };

        for attr in start.attributes() {
            let attr = attr.map_err(|e| FlattenError::Xml(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| FlattenError::Xml(e.to_string()))?;
            // namespace declarations are not data
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let raw = std::str::from_utf8(&attr.value).map_err(|e| FlattenError::Xml(e.to_string()))?;
            let value = quick_xml::escape::unescape(raw).map_err(|e| FlattenError::Xml(e.to_string()))?;
            frame
                .fields
                .insert(format!("{}{}", ATTRIBUTE_PREFIX, key), typed_scalar(value.trim()));
        }

        Ok(frame)
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.fields.is_empty() {
            return if text.is_empty() {
                Value::Null
            } else {
                typed_scalar(text)
            };
        }

        let mut fields = self.fields;
        if !text.is_empty() {
            fields.insert(VALUE_FIELD.to_string(), typed_scalar(text));
        }
        Value::Object(fields)
    }

    fn into_record(self) -> Record {
        match self.into_value() {
            Value::Object(fields) => fields,
            Value::Null => Record::new(),
            scalar => {
                let mut record = Record::new();
                record.insert(VALUE_FIELD.to_string(), scalar);
                record
            }
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(|e| FlattenError::Xml(e.to_string()))
}

/// Numbers and booleans are typed; everything else stays a string.
/// Integers with leading zeros keep their text (zip codes, identifiers).
fn typed_scalar(text: &str) -> Value {
    let leading_zero = text.len() > 1
        && (text.starts_with('0') || text.starts_with("-0"))
        && !text.starts_with("0.")
        && !text.starts_with("-0.");

    if !leading_zero {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Number(i.into());
        }
        if text.bytes().any(|b| b.is_ascii_digit()) {
            if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        }
    }

    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

/// Resolve a `&name;` reference found in text
fn resolve_reference(name: &str) -> Result<String> {
    let resolved = match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => name.strip_prefix('#').and_then(|code| {
            let parsed = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => code.parse::<u32>(),
            };
            parsed.ok().and_then(char::from_u32)
        }),
    };

    resolved
        .map(String::from)
        .ok_or_else(|| FlattenError::Xml(format!("unknown entity reference `&{};`", name)))
}

/// Wrap lone values sitting where the schema declares a list
///
/// A child that occurs once is parsed as a plain value and the same child
/// repeated as a list; once the schema knows the path is a list, the single
/// occurrences become one-element lists.
pub fn wrap_singletons(record: &mut Record, fields: &[Field]) {
    for field in fields {
        if let Some(value) = record.get_mut(&field.name) {
            conform(value, &field.data_type);
        }
    }
}

fn conform(value: &mut Value, data_type: &DataType) {
    match data_type {
        DataType::Scalar => {}
        DataType::Struct { fields } => {
            if let Value::Object(obj) = value {
                wrap_singletons(obj, fields);
            }
        }
        DataType::List { element } => {
            if !value.is_null() && !value.is_array() {
                let single = std::mem::take(value);
                *value = Value::Array(vec![single]);
            }
            if let Value::Array(items) = value {
                for item in items {
                    conform(item, element);
                }
            }
        }
    }
}

/// Collect every outermost element named `row_tag` as a record
pub fn parse_records(content: &[u8], row_tag: &str) -> Result<Vec<Record>> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut records = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if !stack.is_empty() || element_name(&e)? == row_tag {
                    stack.push(Frame::open(&e)?);
                }
            }
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    let child = Frame::open(&e)?;
                    parent.add_child(child.name.clone(), child.into_value());
                } else if element_name(&e)? == row_tag {
                    records.push(Frame::open(&e)?.into_record());
                }
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.add_child(frame.name.clone(), frame.into_value()),
                        None => records.push(frame.into_record()),
                    }
                }
            }
            Event::Text(e) => {
                if let Some(frame) = stack.last_mut() {
                    let text = e.decode().map_err(|e| FlattenError::Xml(e.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(frame) = stack.last_mut() {
                    let text = std::str::from_utf8(&e).map_err(|e| FlattenError::Xml(e.to_string()))?;
                    frame.text.push_str(text);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(frame) = stack.last_mut() {
                    let name = e.decode().map_err(|e| FlattenError::Xml(e.to_string()))?;
                    frame.text.push_str(&resolve_reference(&name)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FlattenError::Xml(format!(
            "unexpected end of document inside <{}>",
            stack[0].name
        )));
    }

    Ok(records)
}
