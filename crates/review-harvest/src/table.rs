//! UTF-8-with-BOM CSV files.
//!
//! Every table the pipeline produces starts with a byte-order mark so that
//! spreadsheet tools detect the encoding. Writes go to a sibling temporary
//! file that is renamed over the target, so a reader never sees a
//! half-written table.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{HarvestError, HarvestResult};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize rows under `headers` and replace `path`.
///
/// The header line is written even when there are no rows.
pub fn write_table<T, I>(path: &Path, headers: &[&str], rows: I) -> HarvestResult<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(UTF8_BOM)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and deserialize all rows, tolerating a leading BOM.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> HarvestResult<Vec<T>> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Header names of a table.
pub fn read_headers(path: &Path) -> HarvestResult<Vec<String>> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    Ok(reader.headers()?.iter().map(String::from).collect())
}

/// Fail with `MissingColumn` unless the table has every listed column.
pub fn require_columns(path: &Path, columns: &[&str]) -> HarvestResult<()> {
    let headers = read_headers(path)?;
    for column in columns {
        if !headers.iter().any(|h| h == column) {
            return Err(HarvestError::MissingColumn {
                column: column.to_string(),
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

fn read_without_bom(path: &Path) -> HarvestResult<String> {
    let mut content = String::new();
    File::open(path)?.read_to_string(&mut content)?;
    match content.strip_prefix('\u{feff}') {
        Some(rest) => Ok(rest.to_string()),
        None => Ok(content),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table.csv".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Score")]
        score: Option<f64>,
    }

    #[test]
    fn test_written_file_starts_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_table(
            &path,
            &["Name", "Score"],
            [Row {
                name: "Телефон".to_string(),
                score: None,
            }],
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "Name,Score\nТелефон,\n");
        assert!(!dir.path().join(".rows.csv.tmp").exists());
    }

    #[test]
    fn test_read_back_with_and_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let with_bom = dir.path().join("a.csv");
        write_table(
            &with_bom,
            &["Name", "Score"],
            [Row {
                name: "x".to_string(),
                score: Some(4.5),
            }],
        )
        .unwrap();
        let rows: Vec<Row> = read_table(&with_bom).unwrap();
        assert_eq!(rows[0].score, Some(4.5));

        let plain = dir.path().join("b.csv");
        std::fs::write(&plain, "Name,Score\ny,\n").unwrap();
        let rows: Vec<Row> = read_table(&plain).unwrap();
        assert_eq!(rows[0].name, "y");
        assert_eq!(rows[0].score, None);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_table(&path, &["Name", "Score"], Vec::<Row>::new()).unwrap();
        assert_eq!(read_headers(&path).unwrap(), vec!["Name", "Score"]);
        let rows: Vec<Row> = read_table(&path).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_require_columns_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.csv");
        std::fs::write(&path, "\u{feff}Theme,Rating\nкамера,4.5\n").unwrap();

        assert!(require_columns(&path, &["Theme"]).is_ok());
        let err = require_columns(&path, &["ReviewText"]).unwrap_err();
        assert!(matches!(err, HarvestError::MissingColumn { ref column, .. } if column == "ReviewText"));
    }
}
