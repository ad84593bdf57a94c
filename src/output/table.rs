//! Plain-text table rendering of flat rows

use crate::flatten::types::{FlatRecord, FlatSchema};
use serde_json::Value;

/// Longest cell content before truncation
const MAX_CELL_WIDTH: usize = 20;

fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    if text.chars().count() > MAX_CELL_WIDTH {
        let kept: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", kept)
    } else {
        text
    }
}

fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", " ".repeat(width.saturating_sub(len)), text)
}

/// Render rows as a boxed table, showing at most `limit` rows
pub fn render_table(schema: &FlatSchema, rows: &[FlatRecord], limit: Option<usize>) -> String {
    let shown = limit.map_or(rows.len(), |n| n.min(rows.len()));

    let header: Vec<String> = schema.names().map(|n| cell_text(Some(&Value::String(n.to_string())))).collect();
    let cells: Vec<Vec<String>> = rows[..shown]
        .iter()
        .map(|row| schema.names().map(|name| cell_text(row.get(name))).collect())
        .collect();

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    let separator = widths
        .iter()
        .fold(String::from("+"), |acc, w| format!("{}{}+", acc, "-".repeat(*w)));
    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .fold(String::from("|"), |acc, (v, w)| format!("{}{}|", acc, pad_left(v, *w)))
    };

    let mut out = String::new();
    out.push_str(&separator);
    out.push('\n');
    out.push_str(&line(&header));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&separator);
    out.push('\n');

    if shown < rows.len() {
        out.push_str(&format!(
            "only showing top {} row{}\n",
            shown,
            if shown == 1 { "" } else { "s" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::FlatColumn;
    use serde_json::json;

    fn schema() -> FlatSchema {
        FlatSchema {
            columns: vec![
                FlatColumn { name: "id".into(), source: "id".into() },
                FlatColumn { name: "tags".into(), source: "tags[]".into() },
            ],
        }
    }

    fn row(id: i64, tag: Value) -> FlatRecord {
        let mut row = FlatRecord::new();
        row.insert("id".to_string(), json!(id));
        row.insert("tags".to_string(), tag);
        row
    }

    #[test]
    fn test_render() {
        let rows = vec![row(1, json!("a")), row(2, Value::Null)];
        let table = render_table(&schema(), &rows, None);
        let expected = "\
+---+----+
| id|tags|
+---+----+
|  1|   a|
|  2|null|
+---+----+
";
        assert_eq!(table, expected);
    }

    #[test]
    fn test_limit_and_truncation() {
        let rows = vec![
            row(1, json!("a very long tag value indeed")),
            row(2, json!("b")),
        ];
        let table = render_table(&schema(), &rows, Some(1));
        assert!(table.contains("|a very long tag v...|"));
        assert!(!table.contains("|  2|"));
        assert!(table.ends_with("only showing top 1 row\n"));
    }
}
