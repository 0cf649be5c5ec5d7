//! Record Source: delimited user file to raw rows.
//!
//! Bytes are decoded with encoding auto-detection, then parsed with the
//! `csv` crate. Every row must have as many fields as the header.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::logs::BatchLog;
use crate::models::{RawRow, REQUIRED_COLUMNS};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub rows: Vec<RawRow>,
    /// Detected encoding
    pub encoding: String,
    pub delimiter: u8,
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes using the given encoding, falling back to lossy UTF-8.
pub fn decode_content<'a>(bytes: &'a [u8], encoding: &str) -> Cow<'a, str> {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0,
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0,
        _ => String::from_utf8_lossy(bytes),
    }
}

/// Parse decoded CSV text into raw rows.
///
/// # Example
/// ```
/// use userload::parser::parse_users;
///
/// let csv = "user_id;name;email;signup_date\nid1;Alice;alice@example.com;01.03.2024 10:00";
/// let rows = parse_users(csv, b';').unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get("name"), "Alice");
/// assert_eq!(rows[0].line, 2);
/// ```
pub fn parse_users(content: &str, delimiter: u8) -> SourceResult<Vec<RawRow>> {
    parse_with_headers(content, delimiter).map(|(_, rows)| rows)
}

fn parse_with_headers(content: &str, delimiter: u8) -> SourceResult<(Vec<String>, Vec<RawRow>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SourceError::Empty);
    }

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == *col))
    {
        return Err(SourceError::MissingColumn((*missing).to_string()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(parse_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let values: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();

        rows.push(RawRow::new(line, values));
    }

    Ok((headers, rows))
}

fn parse_error(err: csv::Error) -> SourceError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => SourceError::Parse {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            message: format!("expected {} fields, found {}", expected_len, len),
        },
        _ => SourceError::Parse {
            line: err.position().map(|p| p.line()).unwrap_or(0),
            message: err.to_string(),
        },
    }
}

/// Parse raw bytes with encoding auto-detection.
pub fn parse_bytes(bytes: &[u8], delimiter: u8) -> SourceResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let (headers, rows) = parse_with_headers(&content, delimiter)?;

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

/// Read and parse the user file at `path`.
pub fn read_user_file(path: &Path, delimiter: u8, log: &dyn BatchLog) -> SourceResult<ParseResult> {
    log.info("read", format!("Reading {}", path.display()));

    let bytes = std::fs::read(path).map_err(|source| {
        let err = SourceError::Io {
            path: path.to_path_buf(),
            source,
        };
        log.error("read", err.to_string());
        err
    })?;

    let result = parse_bytes(&bytes, delimiter).map_err(|err| {
        log.error("read", err.to_string());
        err
    })?;

    log.success(
        "read",
        format!(
            "Read {} rows ({} columns, encoding {})",
            result.rows.len(),
            result.headers.len(),
            result.encoding
        ),
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MemoryLog;

    const HEADER: &str = "user_id;name;email;signup_date";

    #[test]
    fn test_simple_file() {
        let csv = format!("{HEADER}\nid1;Alice;alice@example.com;01.03.2024 10:00\nid2;Bob;bob@example.com;02.03.2024 11:30");
        let rows = parse_users(&csv, b';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("user_id"), "id1");
        assert_eq!(rows[0].get("signup_date"), "01.03.2024 10:00");
        assert_eq!(rows[1].get("name"), "Bob");
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_quoted_and_padded_values() {
        let csv = format!("{HEADER}\n\"id1\";\"Alice Smith\";  alice@example.com ;01.03.2024 10:00");
        let rows = parse_users(&csv, b';').unwrap();

        assert_eq!(rows[0].get("user_id"), "id1");
        assert_eq!(rows[0].get("name"), "Alice Smith");
        assert_eq!(rows[0].get("email"), "alice@example.com");
    }

    #[test]
    fn test_comma_delimiter() {
        let csv = "user_id,name,email,signup_date\nid1,Alice,a@b.io,01.03.2024 10:00";
        let rows = parse_users(csv, b',').unwrap();
        assert_eq!(rows[0].get("email"), "a@b.io");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = format!("{HEADER}\nid1;A;a@b.io;01.03.2024 10:00\n\nid2;B;b@b.io;01.03.2024 10:00\n");
        let rows = parse_users(&csv, b';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_optional_domain_column_kept_raw() {
        let csv = "user_id;name;email;signup_date;domain\nid1;A;a@b.io;01.03.2024 10:00;stale.org";
        let rows = parse_users(csv, b';').unwrap();
        assert_eq!(rows[0].get("domain"), "stale.org");
    }

    #[test]
    fn test_row_shape_mismatch_is_parse_error() {
        let csv = format!("{HEADER}\nid1;A;a@b.io;01.03.2024 10:00\nid2;B;b@b.io");
        let err = parse_users(&csv, b';').unwrap_err();
        match err {
            SourceError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("expected 4 fields"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let csv = "user_id;name;signup_date\nid1;A;01.03.2024 10:00";
        let err = parse_users(csv, b';').unwrap_err();
        assert!(matches!(err, SourceError::MissingColumn(ref c) if c == "email"));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_users("", b';'), Err(SourceError::Empty)));
    }

    #[test]
    fn test_latin1_decoding() {
        // "José" in ISO-8859-1
        let bytes: &[u8] = &[0x4A, 0x6F, 0x73, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "José");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let log = MemoryLog::new();
        let err = read_user_file(Path::new("/nonexistent/users.csv"), b';', &log).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert_eq!(log.at_level(crate::logs::LogLevel::Error).len(), 1);
    }
}
