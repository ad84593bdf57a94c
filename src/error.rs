//! Error taxonomy shared by the flattener and the ingestion boundary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlattenError>;

#[derive(Debug, Error)]
pub enum FlattenError {
    /// A record's shape disagrees with its schema at `path`
    #[error("schema mismatch at `{path}`: expected {expected}, found {found}")]
    SchemaMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// Two distinct source paths produce the same column name
    #[error("column name `{name}` produced by both `{first}` and `{second}`")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    /// Unknown format or missing/invalid XML row tag
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("nesting depth of `{path}` exceeds the limit of {limit}")]
    DepthLimitExceeded { path: String, limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(String),
}

impl FlattenError {
    pub(crate) fn mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        FlattenError::SchemaMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<quick_xml::Error> for FlattenError {
    fn from(err: quick_xml::Error) -> Self {
        FlattenError::Xml(err.to_string())
    }
}
