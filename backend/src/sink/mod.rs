//! Sink Writer: validated users to a delimited file.
//!
//! Output columns are `user_id, name, email, signup_date, domain`, every
//! field quoted, no index column. An existing file is replaced.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{SinkError, SinkResult};
use crate::logs::BatchLog;
use crate::models::{UserRecord, COL_DOMAIN, COL_EMAIL, COL_NAME, COL_SIGNUP_DATE, COL_USER_ID};
use crate::transform::{check_records, TransformResult};

/// Serialize records to any writer.
pub fn write_users<W: Write>(writer: W, records: &[UserRecord], delimiter: u8) -> SinkResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Always)
        .has_headers(true)
        .from_writer(writer);

    if records.is_empty() {
        csv_writer
            .write_record([COL_USER_ID, COL_NAME, COL_EMAIL, COL_SIGNUP_DATE, COL_DOMAIN])
            .map_err(|e| SinkError::Csv(e.to_string()))?;
    }

    for record in records {
        csv_writer
            .serialize(record)
            .map_err(|e| SinkError::Csv(e.to_string()))?;
    }

    csv_writer
        .flush()
        .map_err(|e| SinkError::Csv(e.to_string()))
}

/// Write records to `path`, truncating any existing file.
pub fn write_user_file(
    path: &Path,
    records: &[UserRecord],
    delimiter: u8,
    log: &dyn BatchLog,
) -> SinkResult<()> {
    log.info("write", format!("Writing {} records to {}", records.len(), path.display()));

    let result = create_and_write(path, records, delimiter);

    match &result {
        Ok(()) => log.success("write", format!("Saved {}", path.display())),
        Err(err) => log.error("write", err.to_string()),
    }
    result
}

fn create_and_write(path: &Path, records: &[UserRecord], delimiter: u8) -> SinkResult<()> {
    let io_error = |source: std::io::Error| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = File::create(path).map_err(io_error)?;
    write_users(file, records, delimiter)
}

/// Read a file produced by [`write_user_file`] back into records.
///
/// Every record is checked again with
/// [`check_record`](crate::transform::check_record); the ones that fail
/// land in [`TransformResult::rejected`] with their source line. A row that
/// cannot be read as a record at all fails the whole file.
pub fn read_processed_file(path: &Path, delimiter: u8) -> SinkResult<TransformResult> {
    let file = File::open(path).map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| SinkError::Csv(e.to_string()))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| SinkError::Csv(e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let record: UserRecord = row
            .deserialize(Some(&headers))
            .map_err(|e| SinkError::Csv(format!("line {}: {}", line, e)))?;
        records.push((line, record));
    }

    Ok(check_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn alice() -> UserRecord {
        UserRecord {
            user_id: Uuid::parse_str("6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11").unwrap(),
            name: "Alice".into(),
            email: "alice@Example.COM".into(),
            signup_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            domain: "Example.COM".into(),
        }
    }

    #[test]
    fn test_all_fields_quoted() {
        let mut out = Vec::new();
        write_users(&mut out, &[alice()], b';').unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("\"user_id\";\"name\";\"email\";\"signup_date\";\"domain\"")
        );
        assert_eq!(
            lines.next(),
            Some("\"6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11\";\"Alice\";\"alice@Example.COM\";\"2024-03-01\";\"Example.COM\"")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let mut out = Vec::new();
        write_users(&mut out, &[], b';').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim_end(),
            "\"user_id\";\"name\";\"email\";\"signup_date\";\"domain\""
        );
    }

    #[test]
    fn test_read_back_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        write_user_file(&path, &[alice()], b';', &crate::logs::MemoryLog::new()).unwrap();

        let result = read_processed_file(&path, b';').unwrap();
        assert_eq!(result.records, vec![alice()]);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_read_back_drops_invalid_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        std::fs::write(
            &path,
            "\"user_id\";\"name\";\"email\";\"signup_date\";\"domain\"\n\
             \"6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11\";\"\";\"not-an-email\";\"2024-03-01\";\"gmail.com\"\n\
             \"0b9e8d7c-6a5f-4e3d-8c2b-1a0f9e8d7c6b\";\"Bob\";\"bob@gmail.com\";\"2024-03-01\";\"yahoo.com\"\n\
             \"1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f\";\"Carol\";\"carol@yahoo.com\";\"2024-03-02\";\"yahoo.com\"\n",
        )
        .unwrap();

        let result = read_processed_file(&path, b';').unwrap();

        let names: Vec<&str> = result.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Carol"]);
        let lines: Vec<u64> = result.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(result.rejected[0].error.code(), "missing_field");
        assert_eq!(result.rejected[1].error.code(), "domain_mismatch");
    }

    #[test]
    fn test_unreadable_record_fails_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        std::fs::write(
            &path,
            "user_id;name;email;signup_date;domain\nid1;Alice;alice@gmail.com;2024-03-01;gmail.com\n",
        )
        .unwrap();

        let err = read_processed_file(&path, b';').unwrap_err();
        assert!(matches!(err, SinkError::Csv(ref msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_embedded_quotes_escaped() {
        let mut record = alice();
        record.name = "Alice \"Al\" Smith".into();
        let mut out = Vec::new();
        write_users(&mut out, &[record], b';').unwrap();
        assert!(String::from_utf8(out).unwrap().contains("\"Alice \"\"Al\"\" Smith\""));
    }
}
