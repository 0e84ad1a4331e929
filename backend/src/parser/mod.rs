//! Turn fetched bytes into raw tables.
//!
//! Delimited text goes through encoding and delimiter auto-detection, then the
//! `csv` reader. Spreadsheet workbooks are handed to [`workbook`]. Nothing here
//! knows about crops or prices; see [`cell`] for the date and number coercion
//! used by the normalizer.

pub mod cell;
pub mod workbook;

use crate::error::ParseResult;
use crate::models::{CellValue, RawRow, RawTable};

pub use cell::{excel_serial_to_date, parse_date, parse_number};
pub use workbook::{is_workbook_bytes, parse_workbook};

/// A parsed delimited file with the detection results.
#[derive(Debug, Clone)]
pub struct DelimitedTable {
    pub table: RawTable,
    pub encoding: String,
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    // Strip a UTF-8 byte order mark so the first header is not polluted.
    text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Comma wins when nothing is found, since that is what exports default to.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter into a named table.
///
/// Every cell is text; blank lines are skipped and short rows padded with
/// empty cells. Blank content gives a table with no headers and no rows.
pub fn parse_delimited(name: &str, content: &str, delimiter: char) -> ParseResult<RawTable> {
    if content.trim().is_empty() {
        return Ok(RawTable::new(name, Vec::new()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();

    let mut table = RawTable::new(name, headers);

    for result in reader.records() {
        let record = result?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let row: RawRow = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), CellValue::from_text(record.get(i).unwrap_or(""))))
            .collect();

        table.rows.push(row);
    }

    Ok(table)
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_delimited_bytes(name: &str, bytes: &[u8]) -> ParseResult<DelimitedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_delimited(name, &content, delimiter)?;

    Ok(DelimitedTable {
        table,
        encoding,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_delimited("crops", "Crop,Date,Price\nWheat,2024-01-15,21.5\nRice,2024-01-15,34", ',').unwrap();

        assert_eq!(table.name, "crops");
        assert_eq!(table.headers, vec!["Crop", "Date", "Price"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["Crop"], CellValue::Text("Wheat".into()));
        assert_eq!(table.rows[1]["Price"], CellValue::Text("34".into()));
    }

    #[test]
    fn test_quoted_values_with_delimiter_inside() {
        let csv = "Crop,Market,Price\n\"Gram, whole\",\"Pune\",41\n";
        let table = parse_delimited("t", csv, ',').unwrap();

        assert_eq!(table.rows[0]["Crop"], CellValue::Text("Gram, whole".into()));
        assert_eq!(table.rows[0]["Market"], CellValue::Text("Pune".into()));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_delimited("t", "a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_short_rows_padded_with_empty() {
        let table = parse_delimited("t", "a;b;c\n1;;3\n4", ';').unwrap();

        assert_eq!(table.rows[0]["b"], CellValue::Empty);
        assert_eq!(table.rows[1]["c"], CellValue::Empty);
    }

    #[test]
    fn test_blank_input_is_empty_table() {
        let blank = parse_delimited("t", "  \n", ',').unwrap();
        assert!(blank.headers.is_empty());
        assert!(blank.rows.is_empty());

        let parsed = parse_delimited_bytes("t", b"").unwrap();
        assert_eq!(parsed.table.name, "t");
        assert!(parsed.table.rows.is_empty());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse_with_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Crop;Date;Price\nWheat;2024-01-15;21.5");
        let parsed = parse_delimited_bytes("crops", &bytes).unwrap();

        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.table.headers[0], "Crop");
        assert_eq!(parsed.table.rows.len(), 1);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert!(decoded.starts_with("Soci"));
        assert!(decoded.contains('é'));
    }
}
