//! Spreadsheet and CSV decoding into [`RowRecord`]s.
//!
//! Only the first worksheet of a workbook is read. The first row supplies the
//! field names; blank cells are dropped and fully blank rows are skipped.
//! Each row keeps its 1-indexed line in the source, so skipped rows never
//! shift the positions reported after them.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{json, Map, Value};

use crate::ingest::RowRecord;

/// Extensions routed to the workbook reader.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported file extension '{0}'")]
    Unsupported(String),

    #[error("unreadable workbook: {0}")]
    Workbook(String),

    #[error("unreadable csv: {0}")]
    Csv(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("file contains no data rows")]
    Empty,
}

/// Decode the file at `path`, choosing the reader by extension.
///
/// Row positions are source lines: with the header on row 1 the first data
/// row is 2, and a file without blank rows numbers row `index` as `index + 2`.
pub fn decode_file(path: &Path) -> Result<Vec<RowRecord>, DecodeError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = if extension == "csv" {
        read_csv(path)?
    } else if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(path)?
    } else {
        return Err(DecodeError::Unsupported(extension));
    };

    if rows.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(rows
        .into_iter()
        .map(|(position, fields)| RowRecord::new(position, fields))
        .collect())
}

/// A decoded row and its 1-indexed line in the source.
type SourceRow = (usize, Map<String, Value>);

fn read_workbook(path: &Path) -> Result<Vec<SourceRow>, DecodeError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DecodeError::NoSheets)?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| DecodeError::Workbook(e.to_string()))?;

    // The range starts at the first used cell, not necessarily at A1.
    let header_line = range.start().map_or(0, |(row, _)| row as usize) + 1;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(header_text).collect();

    Ok(rows
        .enumerate()
        .map(|(offset, cells)| {
            let fields = cells
                .iter()
                .zip(&headers)
                .filter(|(_, header)| !header.is_empty())
                .filter_map(|(cell, header)| cell_to_value(cell).map(|v| (header.clone(), v)))
                .collect::<Map<_, _>>();
            (header_line + offset + 1, fields)
        })
        .filter(|(_, fields)| !fields.is_empty())
        .collect())
}

fn read_csv(path: &Path) -> Result<Vec<SourceRow>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DecodeError::Csv(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DecodeError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| DecodeError::Csv(e.to_string()))?;
        // The reader skips empty lines but still counts them.
        let line = record
            .position()
            .map_or(index + 2, |p| p.line() as usize);
        let fields: Map<String, Value> = record
            .iter()
            .zip(&headers)
            .filter(|(cell, header)| !header.is_empty() && !cell.is_empty())
            .map(|(cell, header)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        if !fields.is_empty() {
            rows.push((line, fields));
        }
    }
    Ok(rows)
}

fn header_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Convert a workbook cell into a JSON value; `None` for blank or error cells.
fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| Value::String(trimmed.to_string()))
        }
        Data::Int(i) => Some(json!(*i)),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Some(json!(*f as i64))
            } else {
                Some(json!(*f))
            }
        }
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => Some(Value::String(dt.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use rust_xlsxwriter::Workbook;
    use tempfile::NamedTempFile;

    use super::*;

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn reads_first_sheet_of_a_workbook() {
        let file = temp_with_suffix(".xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "reg_no").unwrap();
        sheet.write_string(0, 1, "stu_name").unwrap();
        sheet.write_string(0, 2, "semester").unwrap();
        sheet.write_string(1, 0, "R1").unwrap();
        sheet.write_string(1, 1, "Asha").unwrap();
        sheet.write_number(1, 2, 3.0).unwrap();
        sheet.write_string(3, 0, "R2").unwrap();
        let other = workbook.add_worksheet();
        other.write_string(0, 0, "ignored").unwrap();
        workbook.save(file.path()).unwrap();

        let rows = decode_file(file.path()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 2);
        assert_eq!(rows[0].get("reg_no"), Some(&json!("R1")));
        assert_eq!(rows[0].get("semester"), Some(&json!(3)));
        assert_eq!(rows[1].position, 4);
        assert_eq!(rows[1].get("reg_no"), Some(&json!("R2")));
        assert!(rows[1].get("stu_name").is_none());
    }

    #[test]
    fn reads_csv_with_trimmed_cells() {
        let mut file = temp_with_suffix(".csv");
        writeln!(file, "staff_id,staff_name,staff_dept").unwrap();
        writeln!(file, " S1 , Kavya ,CSE").unwrap();
        writeln!(file, ",,").unwrap();
        writeln!(file, "S2,,ECE").unwrap();
        file.flush().unwrap();

        let rows = decode_file(file.path()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("staff_id"), Some(&json!("S1")));
        assert_eq!(rows[0].get("staff_name"), Some(&json!("Kavya")));
        assert_eq!(rows[1].position, 4);
        assert!(rows[1].get("staff_name").is_none());
    }

    #[test]
    fn positions_count_blank_csv_lines() {
        let mut file = temp_with_suffix(".csv");
        writeln!(file, "reg_no,stu_name").unwrap();
        writeln!(file, "R1,Asha").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "R2,Ravi").unwrap();
        file.flush().unwrap();

        let rows = decode_file(file.path()).unwrap();

        let positions: Vec<_> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![2, 4]);
        assert_eq!(rows[1].get("reg_no"), Some(&json!("R2")));
    }

    #[test]
    fn positions_follow_sheet_rows_when_table_starts_lower() {
        let file = temp_with_suffix(".xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 0, "staff_id").unwrap();
        sheet.write_string(3, 0, "S1").unwrap();
        sheet.write_string(5, 0, "S2").unwrap();
        workbook.save(file.path()).unwrap();

        let rows = decode_file(file.path()).unwrap();

        let positions: Vec<_> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![4, 6]);
    }

    #[test]
    fn header_only_file_is_empty() {
        let mut file = temp_with_suffix(".csv");
        writeln!(file, "reg_no,course_code").unwrap();
        file.flush().unwrap();

        assert_matches!(decode_file(file.path()), Err(DecodeError::Empty));
    }

    #[test]
    fn garbage_workbook_is_rejected() {
        let mut file = temp_with_suffix(".xlsx");
        file.write_all(b"definitely not a zip archive").unwrap();
        file.flush().unwrap();

        assert_matches!(decode_file(file.path()), Err(DecodeError::Workbook(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let file = temp_with_suffix(".pdf");
        assert_matches!(
            decode_file(file.path()),
            Err(DecodeError::Unsupported(ext)) if ext == "pdf"
        );
    }
}
