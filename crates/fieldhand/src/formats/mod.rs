// ABOUTME: Output formats for stored customer records.
// ABOUTME: CSV export for spreadsheets plus the phone normalization it applies.

//! Record export.
//!
//! The CSV produced here is meant to be opened directly by spreadsheet
//! software: it starts with a UTF-8 byte order mark and quotes every data field.

pub mod phone;

pub use phone::format_phone_number;

use std::io;

use crate::store::CustomerRecord;

/// Byte order mark that makes spreadsheet software read the file as UTF-8.
pub const UTF8_BOM: char = '\u{feff}';

/// Header row of [`export_csv`].
pub const CSV_HEADERS: [&str; 5] = ["Full Name", "Email", "Phone", "Address", "Notes"];

/// One record to export, with the name of the site it came from when known.
#[derive(Debug, Clone, Copy)]
pub struct ExportRow<'a> {
    pub record: &'a CustomerRecord,
    pub site_name: Option<&'a str>,
}

impl<'a> ExportRow<'a> {
    pub fn new(record: &'a CustomerRecord, site_name: Option<&'a str>) -> Self {
        Self { record, site_name }
    }

    /// Notes prefixed with the site name, `"site - notes"`.
    fn notes(&self) -> String {
        let notes = self.record.notes.as_str();
        match self.site_name.filter(|s| !s.is_empty()) {
            Some(site) if notes.is_empty() => site.to_string(),
            Some(site) => format!("{} - {}", site, notes),
            None => notes.to_string(),
        }
    }
}

/// Renders records as CSV. Records with a blank phone are left out.
///
/// The header is written bare and every data field is quoted. Rows are
/// separated by `\n` with no terminator after the last one.
pub fn export_csv<'a, I>(rows: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = ExportRow<'a>>,
{
    let mut header = csv_writer(csv::QuoteStyle::Necessary);
    header.write_record(CSV_HEADERS)?;

    let mut body = csv_writer(csv::QuoteStyle::Always);
    for row in rows {
        let record = row.record;
        if record.phone.trim().is_empty() {
            continue;
        }
        body.write_record([
            record.full_name.as_str(),
            record.email.as_str(),
            format_phone_number(&record.phone).as_str(),
            record.address.as_str(),
            row.notes().as_str(),
        ])?;
    }

    let mut out = String::new();
    out.push(UTF8_BOM);
    out.push_str(&into_string(header)?);
    out.push_str(&into_string(body)?);
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn csv_writer(quote_style: csv::QuoteStyle) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(quote_style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, csv::Error> {
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
}
