//! Spreadsheet workbook reading (xlsx, xlsm, xlsb, xls, ods) via calamine.
//!
//! Each sheet becomes one [`RawTable`]; the first row is the header row.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use crate::error::{ParseError, ParseResult};
use crate::models::{CellValue, RawRow, RawTable};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// True if the payload looks like a zipped (xlsx/ods) or OLE (xls) workbook.
pub fn is_workbook_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

/// Read every sheet of a workbook, in workbook order.
///
/// Sheets without a header row are returned as empty tables so the caller
/// can report them.
pub fn parse_workbook(bytes: &[u8]) -> ParseResult<Vec<RawTable>> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let mut tables = Vec::with_capacity(sheet_names.len());

    for name in sheet_names {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(header_text).collect(),
            None => {
                tables.push(RawTable::new(name, Vec::new()));
                continue;
            }
        };

        let mut table = RawTable::new(name, headers);
        for cells in rows {
            if cells.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }
            let row: RawRow = table
                .headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.is_empty())
                .map(|(i, h)| (h.clone(), cells.get(i).map(to_cell).unwrap_or(CellValue::Empty)))
                .collect();
            table.rows.push(row);
        }
        tables.push(table);
    }

    Ok(tables)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Map a calamine cell to a [`CellValue`]. Date cells keep their serial.
pub(crate) fn to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s),
        Data::Bool(b) => CellValue::Text(b.to_string()),
    }
}
