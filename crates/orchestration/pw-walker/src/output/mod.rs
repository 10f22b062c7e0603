//! Sinks for discovered keys.
//!
//! This module provides the [`Sink`] trait and implementations:
//! - [`LineSink`] - One line per key (text or JSONL) to a file or stdout
//! - [`TreeSink`] - Directory trees rendered as text and/or JSON on finish
//! - [`MultiSink`] - Fan-out to several sinks

mod lines;
mod tree;

pub use lines::{LineSink, OutputFormat};
pub use tree::{TreeNode, TreeSink, render_tree};

use async_trait::async_trait;
use pw_error::Result;
use std::sync::Arc;

/// Trait for consuming discovered keys.
///
/// `write` is called once per emitted key, in channel order, and `finish`
/// once after every bucket of a run has been walked.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Record one key discovered in `bucket`.
    async fn write(&self, bucket: &str, key: &str) -> Result<()>;

    /// Flush buffered output and render anything built up during the run.
    async fn finish(&self) -> Result<()>;
}

/// Sink forwarding every key to several sinks.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl MultiSink {
    /// Create an empty fan-out sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sinks were added.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Sink for MultiSink {
    async fn write(&self, bucket: &str, key: &str) -> Result<()> {
        for sink in &self.sinks {
            sink.write(bucket, key).await?;
        }
        Ok(())
    }

    /// Finishes every sink, even after a failure, and returns the first error.
    async fn finish(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.finish().await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pw_error::PwError;

    #[derive(Default)]
    struct Recording {
        keys: Mutex<Vec<String>>,
        finished: Mutex<bool>,
        fail_finish: bool,
    }

    #[async_trait]
    impl Sink for Recording {
        async fn write(&self, bucket: &str, key: &str) -> Result<()> {
            self.keys.lock().push(format!("{bucket}/{key}"));
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            *self.finished.lock() = true;
            if self.fail_finish {
                return Err(PwError::Output("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_multi_sink_fans_out() {
        let a = Arc::new(Recording::default());
        let b = Arc::new(Recording::default());
        let multi = MultiSink::new().with_sink(a.clone()).with_sink(b.clone());
        assert_eq!(multi.len(), 2);

        multi.write("docs", "a.txt").await.unwrap();
        multi.finish().await.unwrap();

        assert_eq!(*a.keys.lock(), vec!["docs/a.txt"]);
        assert_eq!(*b.keys.lock(), vec!["docs/a.txt"]);
        assert!(*a.finished.lock() && *b.finished.lock());
    }

    #[tokio::test]
    async fn test_multi_sink_finishes_all_on_error() {
        let failing = Arc::new(Recording {
            fail_finish: true,
            ..Default::default()
        });
        let ok = Arc::new(Recording::default());
        let multi = MultiSink::new()
            .with_sink(failing.clone())
            .with_sink(ok.clone());

        assert!(matches!(multi.finish().await, Err(PwError::Output(_))));
        assert!(*ok.finished.lock());
    }
}
