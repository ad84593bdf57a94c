//! Sinks for flattened rows

pub mod writer;
pub mod table;

pub use writer::JsonLinesWriter;
pub use table::render_table;
