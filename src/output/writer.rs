use crate::error::Result;
use crate::flatten::types::FlatRecord;
use std::io::Write;

/// Writes flat rows as JSON Lines, one object per row
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    rows_written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesWriter {
            writer,
            rows_written: 0,
        }
    }

    pub fn write_row(&mut self, row: &FlatRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_rows<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a FlatRecord>,
    {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
