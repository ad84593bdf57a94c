//! Document ingestion: JSON or XML bytes into records plus an inferred schema
//!
//! Format and row tag are validated before any parsing happens, so an
//! unsupported request never reaches the flattener.

pub mod json;
pub mod xml;

use crate::error::{FlattenError, Result};
use crate::flatten::types::{Record, Schema};
use crate::schema::SchemaBuilder;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

static XML_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9._\-]*(:[A-Za-z_][A-Za-z0-9._\-]*)?$").unwrap()
});

/// Source document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
}

impl FromStr for Format {
    type Err = FlattenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            other => Err(FlattenError::UnsupportedFormat(format!(
                "`{}` (use json or xml)",
                other
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Xml => f.write_str("xml"),
        }
    }
}

/// How to read a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    pub format: Format,

    /// Element marking one record; required for XML, ignored for JSON
    #[serde(default)]
    pub row_tag: Option<String>,
}

impl IngestOptions {
    pub fn json() -> Self {
        IngestOptions {
            format: Format::Json,
            row_tag: None,
        }
    }

    pub fn xml(row_tag: impl Into<String>) -> Self {
        IngestOptions {
            format: Format::Xml,
            row_tag: Some(row_tag.into()),
        }
    }

    /// Check the format/row-tag combination
    pub fn validate(&self) -> Result<()> {
        match (self.format, self.row_tag.as_deref()) {
            (Format::Json, Some(tag)) => {
                warn!("row tag `{}` is ignored for JSON input", tag);
                Ok(())
            }
            (Format::Json, None) => Ok(()),
            (Format::Xml, None) => Err(FlattenError::UnsupportedFormat(
                "XML input requires a row tag".to_string(),
            )),
            (Format::Xml, Some(tag)) if !XML_NAME_REGEX.is_match(tag) => Err(
                FlattenError::UnsupportedFormat(format!("invalid XML row tag `{}`", tag)),
            ),
            (Format::Xml, Some(_)) => Ok(()),
        }
    }
}

/// Records of a document together with their inferred schema
#[derive(Debug, Clone)]
pub struct Document {
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl Document {
    /// Infer the schema of already-parsed records
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        Self::infer(SchemaBuilder::new(), records)
    }

    /// Infer the schema of XML records, where one occurrence of a repeated
    /// element is a plain value; such values are wrapped to match the schema
    pub fn from_xml_records(records: Vec<Record>) -> Result<Self> {
        let mut document = Self::infer(SchemaBuilder::with_singleton_lists(), records)?;
        for record in &mut document.records {
            xml::wrap_singletons(record, document.schema.fields());
        }
        Ok(document)
    }

    fn infer(mut builder: SchemaBuilder, records: Vec<Record>) -> Result<Self> {
        for record in &records {
            builder.add_record(record)?;
        }
        Ok(Document {
            schema: builder.build()?,
            records,
        })
    }
}

/// Parse a document held in memory
pub fn load_bytes(content: Vec<u8>, options: &IngestOptions) -> Result<Document> {
    options.validate()?;

    let records = match options.format {
        Format::Json => json::parse_records(content)?,
        Format::Xml => {
            let tag = options.row_tag.as_deref().unwrap_or_default();
            xml::parse_records(&content, tag)?
        }
    };

    if records.is_empty() {
        warn!("no records found in {} input", options.format);
    }
    info!("read {} {} records", records.len(), options.format);

    match options.format {
        Format::Json => Document::from_records(records),
        Format::Xml => Document::from_xml_records(records),
    }
}

/// Read and parse a document from disk
pub fn load_path<P: AsRef<Path>>(path: P, options: &IngestOptions) -> Result<Document> {
    options.validate()?;
    let content = std::fs::read(path.as_ref())?;
    load_bytes(content, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("XML".parse::<Format>().unwrap(), Format::Xml);
        assert!(matches!(
            "csv".parse::<Format>(),
            Err(FlattenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_xml_requires_valid_row_tag() {
        let missing = IngestOptions {
            format: Format::Xml,
            row_tag: None,
        };
        assert!(matches!(missing.validate(), Err(FlattenError::UnsupportedFormat(_))));

        assert!(IngestOptions::xml("1record").validate().is_err());
        assert!(IngestOptions::xml("bad tag").validate().is_err());
        assert!(IngestOptions::xml("").validate().is_err());
        assert!(IngestOptions::xml("record").validate().is_ok());
        assert!(IngestOptions::xml("ns:row-item").validate().is_ok());
    }

    #[test]
    fn test_json_ignores_row_tag() {
        let options = IngestOptions {
            format: Format::Json,
            row_tag: Some("record".to_string()),
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_load_bytes_infers_schema() {
        let doc = load_bytes(
            br#"[{"id": 1, "tags": ["a"]}, {"id": 2, "tags": []}]"#.to_vec(),
            &IngestOptions::json(),
        )
        .unwrap();
        assert_eq!(doc.records.len(), 2);
        assert_eq!(doc.schema.fields().len(), 2);
        assert!(!doc.schema.is_flat());
    }

    #[test]
    fn test_xml_single_and_repeated_children() {
        let xml = "<c><book><a>Ann</a></book><book><a>Cy</a><a>Di</a></book></c>";
        let doc = load_bytes(xml.as_bytes().to_vec(), &IngestOptions::xml("book")).unwrap();

        assert_eq!(
            doc.schema.fields()[0].data_type,
            crate::flatten::DataType::list_of(crate::flatten::DataType::Scalar)
        );
        assert_eq!(doc.records[0].get("a").unwrap(), &serde_json::json!(["Ann"]));

        let (_, rows) = crate::flatten_document(doc, crate::FlattenConfig::default()).unwrap();
        let authors: Vec<&str> = rows.iter().filter_map(|r| r.get("a").and_then(|v| v.as_str())).collect();
        assert_eq!(authors, vec!["Ann", "Cy", "Di"]);
    }

    #[test]
    fn test_json_single_and_repeated_values_still_conflict() {
        let err = load_bytes(
            br#"[{"a": "Ann"}, {"a": ["Cy", "Di"]}]"#.to_vec(),
            &IngestOptions::json(),
        )
        .unwrap_err();
        assert!(matches!(err, FlattenError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_invalid_options_fail_before_reading() {
        let err = load_path("/nonexistent/input.xml", &IngestOptions::xml("<row>")).unwrap_err();
        assert!(matches!(err, FlattenError::UnsupportedFormat(_)));
    }
}
