use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};

use super::{Cell, ReportTable};
use crate::errors::ServiceError;

const HEADER_BLUE: u32 = 0x366092;
/// Sheet names are capped at 31 characters
const MAX_SHEET_NAME: usize = 31;

fn xlsx_err(e: XlsxError) -> ServiceError {
    ServiceError::RenderError(format!("XLSX writing failed: {e}"))
}

fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".into()
    } else {
        cleaned
    }
}

/// One worksheet: styled header row, then data rows
pub fn render_table(table: &ReportTable) -> Result<Vec<u8>, ServiceError> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BLUE))
        .set_align(FormatAlign::Center);
    let money = Format::new().set_num_format("#,##0.00");
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm");

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(&table.title)).map_err(xlsx_err)?;

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for (col, name) in table.columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, name, &header)
            .map_err(xlsx_err)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let col = c as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(r, col, s).map_err(xlsx_err)?;
                }
                Cell::Integer(n) => {
                    sheet.write_number(r, col, *n as f64).map_err(xlsx_err)?;
                }
                Cell::Money(d) => {
                    let value = d.to_f64().unwrap_or_default();
                    sheet
                        .write_number_with_format(r, col, value, &money)
                        .map_err(xlsx_err)?;
                }
                Cell::Date(d) => {
                    sheet
                        .write_datetime_with_format(r, col, d, &date)
                        .map_err(xlsx_err)?;
                }
                Cell::DateTime(dt) => {
                    sheet
                        .write_datetime_with_format(r, col, &dt.naive_utc(), &datetime)
                        .map_err(xlsx_err)?;
                }
                Cell::Empty => {}
            }
            if let Some(width) = widths.get_mut(c) {
                *width = (*width).max(cell.display().chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (*width as f64 + 2.0).min(50.0);
        sheet.set_column_width(col as u16, width).map_err(xlsx_err)?;
    }
    if !table.columns.is_empty() {
        sheet.set_freeze_panes(1, 0).map_err(xlsx_err)?;
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::tests::sample_table;

    #[test]
    fn workbook_is_a_zip_container() {
        let bytes = render_table(&sample_table()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sheet_name("Products [2024/01]"), "Products 202401");
        assert_eq!(sheet_name("???"), "Report");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), MAX_SHEET_NAME);
    }
}
