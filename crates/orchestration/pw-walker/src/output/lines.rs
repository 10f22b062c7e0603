//! Line-oriented output.

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_error::{PwError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Sink;

/// Line format for [`LineSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The bare key, one per line (default)
    #[default]
    Text,

    /// JSON Lines - one `{"bucket":..,"key":..}` object per line
    Jsonl,
}

#[derive(Serialize)]
struct KeyRecord<'a> {
    bucket: &'a str,
    key: &'a str,
}

/// Writes one line per discovered key.
///
/// Suitable for piping to tools like `grep`, `jq` or `wc -l`.
pub struct LineSink {
    format: OutputFormat,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
}

impl LineSink {
    /// Create a sink writing to any writer.
    pub fn from_writer(writer: impl Write + Send + 'static, format: OutputFormat) -> Self {
        Self {
            format,
            writer: Mutex::new(BufWriter::new(Box::new(writer))),
        }
    }

    /// Create a sink writing to stdout.
    pub fn stdout(format: OutputFormat) -> Self {
        Self::from_writer(std::io::stdout(), format)
    }

    /// Create (or truncate) `path` and write to it.
    pub fn create(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PwError::Output(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(path)
            .map_err(|e| PwError::Output(format!("Failed to create {}: {e}", path.display())))?;
        Ok(Self::from_writer(file, format))
    }

    /// Format configured for this sink.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn line(&self, bucket: &str, key: &str) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(key.to_string()),
            OutputFormat::Jsonl => serde_json::to_string(&KeyRecord { bucket, key })
                .map_err(|e| PwError::Output(format!("JSON serialization failed: {e}"))),
        }
    }
}

#[async_trait]
impl Sink for LineSink {
    async fn write(&self, bucket: &str, key: &str) -> Result<()> {
        let line = self.line(bucket, key)?;
        writeln!(self.writer.lock(), "{line}")
            .map_err(|e| PwError::Output(format!("Failed to write key: {e}")))
    }

    async fn finish(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| PwError::Output(format!("Failed to flush output: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_output_format_serde() {
        let format: OutputFormat = serde_json::from_str("\"jsonl\"").unwrap();
        assert_eq!(format, OutputFormat::Jsonl);
    }

    #[tokio::test]
    async fn test_text_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        let sink = LineSink::create(&path, OutputFormat::Text).unwrap();

        sink.write("docs", "readme.txt").await.unwrap();
        sink.write("docs", "img/a b.txt").await.unwrap();
        sink.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "readme.txt\nimg/a b.txt\n");
    }

    #[tokio::test]
    async fn test_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/keys.jsonl");
        let sink = LineSink::create(&path, OutputFormat::Jsonl).unwrap();

        sink.write("docs", "say \"hi\".txt").await.unwrap();
        sink.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["bucket"], "docs");
        assert_eq!(value["key"], "say \"hi\".txt");
    }

    #[test]
    fn test_create_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LineSink::create(dir.path(), OutputFormat::Text),
            Err(PwError::Output(_))
        ));
    }
}
