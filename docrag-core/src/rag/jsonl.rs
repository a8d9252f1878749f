//! Line-delimited JSON files: one object per line, UTF-8.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonlError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: invalid record: {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads every non-blank line of `path` as a `T`, in file order.
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, JsonlError> {
    let io_err = |source| JsonlError::Io {
        path: path.display().to_string(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut items = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| JsonlError::Parse {
            path: path.display().to_string(),
            line: i + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Writes `items` to `path`, replacing any previous contents.
///
/// Parent directories are created as needed.
pub fn write<T: Serialize>(path: &Path, items: &[T]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Hex SHA-256 of a file's bytes.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::AttributeRecord;

    #[test]
    fn test_write_overwrites_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.jsonl");

        let first = vec![
            AttributeRecord::new("a", "string", "first"),
            AttributeRecord::new("b", "string", "second"),
            AttributeRecord::new("c", "string", "third"),
        ];
        write(&path, &first).unwrap();

        let second = vec![AttributeRecord::new("z", "integer", "only")];
        write(&path, &second).unwrap();

        let back: Vec<AttributeRecord> = read(&path).unwrap();
        assert_eq!(back, second);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_non_ascii_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        write(&path, &[AttributeRecord::new("état", "chaîne", "déjà vu")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("état"));
        assert!(raw.contains(r#""type":"chaîne""#));
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        fs::write(
            &path,
            "{\"attribute\":\"a\",\"type\":\"t\",\"description\":\"d\"}\n\n",
        )
        .unwrap();

        let back: Vec<AttributeRecord> = read(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].supported_products, "");
    }

    #[test]
    fn test_read_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        fs::write(
            &path,
            "{\"attribute\":\"a\",\"type\":\"t\",\"description\":\"d\"}\nnot json\n",
        )
        .unwrap();

        let err = read::<AttributeRecord>(&path).unwrap_err();
        assert!(matches!(err, JsonlError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_sha256_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "one").unwrap();
        let a = sha256_file(&path).unwrap();
        fs::write(&path, "two").unwrap();
        let b = sha256_file(&path).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
