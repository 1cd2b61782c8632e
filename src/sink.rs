//! Local destinations for bucket object metadata
//!
//! Object listings can be far larger than the rest of a crawl, so they are
//! streamed to a sink instead of being held in the report.

use crate::resource::Record;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Receives object metadata as bucket listings are walked.
///
/// Calls are blocking and may come from any thread; the storage enumerator
/// runs them on tokio's blocking pool, one page of objects at a time.
pub trait ObjectSink: Send + Sync {
    fn write_object(&self, bucket: &str, object: &Record) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per line: `{"bucket": ..., <object fields>}`
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create object dump {}", path.display()))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl ObjectSink for JsonLinesSink {
    fn write_object(&self, bucket: &str, object: &Record) -> Result<()> {
        let mut line = Record::with_capacity(object.len() + 1);
        line.insert("bucket".into(), Value::String(bucket.to_string()));
        line.extend(object.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("object dump writer poisoned"))?;
        serde_json::to_writer(&mut *writer, &line).context("Failed to serialize object")?;
        writer.write_all(b"\n").context("Failed to write object dump")?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("object dump writer poisoned"))?;
        writer.flush().context("Failed to flush object dump")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::into_record;
    use serde_json::json;

    #[test]
    fn test_json_lines_sink_writes_one_line_per_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();

        sink.write_object("logs", &into_record(json!({"name": "a.txt", "size": "12"})).unwrap())
            .unwrap();
        sink.write_object("logs", &into_record(json!({"name": "b.txt", "size": "3"})).unwrap())
            .unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"bucket": "logs", "name": "a.txt", "size": "12"}));
        assert_eq!(lines[1]["name"], "b.txt");
    }
}
