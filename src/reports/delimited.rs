use crate::errors::ServiceError;

use super::ReportTable;

/// Comma-separated values, header row first
pub fn render_table(table: &ReportTable) -> Result<Vec<u8>, ServiceError> {
    let mut writer = ::csv::Writer::from_writer(vec![]);

    writer.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| cell.display()))
            .map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::RenderError(format!("CSV flush failed: {e}")))
}

fn csv_err(e: ::csv::Error) -> ServiceError {
    ServiceError::RenderError(format!("CSV writing failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::tests::sample_table;

    #[test]
    fn writes_header_and_rows() {
        let bytes = render_table(&sample_table()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Serial,Price,Purchase date");
        assert_eq!(lines[1], "LAP0001,899.90,2024-01-15");
        assert_eq!(lines[2], "MON0002,,");
    }

    #[test]
    fn empty_table_is_just_the_header() {
        let table = ReportTable::new("Empty", &["A", "B"]);
        let text = String::from_utf8(render_table(&table).unwrap()).unwrap();
        assert_eq!(text, "A,B\n");
    }
}
