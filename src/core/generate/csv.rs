//! RFC 4180 CSV encoding for HUD entity sections
//!
//! HUD CSV conventions: UTF-8 with BOM, CRLF line endings, comma delimiter,
//! header row first, empty string for null values, ISO-8601 dates. Fields
//! containing delimiter, quote, or line-break characters are quoted with
//! embedded quotes doubled.

use crate::core::generate::entities::{CsvVersion, EntitySection};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const LINE_SEPARATOR: &str = "\r\n";
const FIELD_SEPARATOR: char = ',';

/// Encodes one entity section as a complete CSV file body.
///
/// The header row always follows the entity's column catalog for the given
/// spec version, even when the section has no rows - an empty table is a
/// header-only file, not a missing file.
pub fn encode_section(section: &EntitySection, version: CsvVersion) -> Vec<u8> {
    let columns = section.kind.columns(version);

    let mut out = Vec::new();
    out.extend_from_slice(UTF8_BOM);

    let header: Vec<String> = columns.iter().map(|c| escape_field(c)).collect();
    push_row(&mut out, &header);

    for row in &section.rows {
        let values: Vec<String> = columns
            .iter()
            .map(|column| escape_field(row.field(column).unwrap_or("")))
            .collect();
        push_row(&mut out, &values);
    }

    out
}

fn push_row(out: &mut Vec<u8>, values: &[String]) {
    let line = values.join(&FIELD_SEPARATOR.to_string());
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(LINE_SEPARATOR.as_bytes());
}

/// Quotes a field when it contains the delimiter, a quote, or a line break.
fn escape_field(value: &str) -> String {
    if value.contains(FIELD_SEPARATOR)
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
