use serde_json::{json, Map, Value};

use super::{Cell, ReportTable};
use crate::errors::ServiceError;

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Integer(n) => json!(n),
        Cell::Empty => Value::Null,
        // money keeps its exact decimal text
        other => Value::String(other.display()),
    }
}

/// `{title, subtitle, columns, rows: [{column: value}], total}`
pub fn render_table(table: &ReportTable) -> Result<Vec<u8>, ServiceError> {
    let rows: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(cell_value))
                .collect();
            Value::Object(object)
        })
        .collect();

    let document = json!({
        "title": table.title,
        "subtitle": table.subtitle,
        "columns": table.columns,
        "rows": rows,
        "total": table.rows.len(),
    });

    serde_json::to_vec_pretty(&document)
        .map_err(|e| ServiceError::RenderError(format!("JSON writing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::tests::sample_table;

    #[test]
    fn rows_are_keyed_by_column() {
        let bytes = render_table(&sample_table()).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["total"], 2);
        assert_eq!(doc["rows"][0]["Serial"], "LAP0001");
        assert_eq!(doc["rows"][0]["Price"], "899.90");
        assert_eq!(doc["rows"][1]["Price"], Value::Null);
    }
}
