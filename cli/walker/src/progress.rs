//! Progress reporting for prefixwalk.

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_cli_common::{format_number, format_rate};
use pw_error::Result;
use pw_walker::Sink;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Periodically prints how many keys have been written.
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval
    interval: Duration,
    /// Shared state for progress tracking
    state: Arc<ProgressState>,
    /// Handle to the background reporter task
    handle: Option<JoinHandle<()>>,
}

/// Shared state for progress tracking.
struct ProgressState {
    /// Keys handed to the sink
    keys_written: AtomicU64,
    /// Bucket of the most recent key
    current_bucket: Mutex<String>,
    /// Whether to stop reporting
    stop: AtomicBool,
    /// Start time
    start_time: Instant,
}

impl ProgressState {
    fn line(&self) -> String {
        let keys = self.keys_written.load(Ordering::Relaxed);
        let bucket = self.current_bucket.lock().clone();
        let elapsed = self.start_time.elapsed();
        format!(
            "{} keys written, bucket {} ({}, {:.1}s elapsed)",
            format_number(keys),
            if bucket.is_empty() { "-" } else { bucket.as_str() },
            format_rate(keys, elapsed),
            elapsed.as_secs_f64()
        )
    }
}

impl ProgressReporter {
    /// Create a new progress reporter.
    pub fn new(enabled: bool, interval_secs: u64) -> Self {
        Self {
            enabled,
            interval: Duration::from_secs(interval_secs.max(1)),
            state: Arc::new(ProgressState {
                keys_written: AtomicU64::new(0),
                current_bucket: Mutex::new(String::new()),
                stop: AtomicBool::new(false),
                start_time: Instant::now(),
            }),
            handle: None,
        }
    }

    /// Wrap `inner` so every key written through it is counted.
    pub fn counting(&self, inner: Arc<dyn Sink>) -> CountingSink {
        CountingSink {
            inner,
            state: Arc::clone(&self.state),
        }
    }

    /// Keys counted so far.
    pub fn keys_written(&self) -> u64 {
        self.state.keys_written.load(Ordering::Relaxed)
    }

    /// Start the background progress reporter.
    pub fn start(&mut self) {
        if !self.enabled {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // Skip first immediate tick

            loop {
                interval_timer.tick().await;

                if state.stop.load(Ordering::Relaxed) {
                    break;
                }

                let _ = writeln!(io::stderr(), "[Progress] {}", state.line());
            }
        });

        self.handle = Some(handle);
    }

    /// Stop the progress reporter and print the final count.
    pub async fn stop(mut self) {
        if !self.enabled {
            return;
        }

        self.state.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }

        let _ = writeln!(io::stderr(), "[Progress] Complete: {}", self.state.line());
    }
}

/// Sink wrapper feeding the progress counters.
pub struct CountingSink {
    inner: Arc<dyn Sink>,
    state: Arc<ProgressState>,
}

#[async_trait]
impl Sink for CountingSink {
    async fn write(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner.write(bucket, key).await?;

        self.state.keys_written.fetch_add(1, Ordering::Relaxed);
        let mut current = self.state.current_bucket.lock();
        if current.as_str() != bucket {
            *current = bucket.to_string();
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.inner.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_error::PwError;

    struct Rejecting;

    #[async_trait]
    impl Sink for Rejecting {
        async fn write(&self, _bucket: &str, key: &str) -> Result<()> {
            if key.ends_with(".bad") {
                return Err(PwError::Output("rejected".to_string()));
            }
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_counting_sink_counts_successful_writes() {
        let reporter = ProgressReporter::new(false, 1);
        let sink = reporter.counting(Arc::new(Rejecting));

        sink.write("docs", "a.txt").await.unwrap();
        sink.write("logs", "b.txt").await.unwrap();
        assert!(sink.write("logs", "c.bad").await.is_err());
        sink.finish().await.unwrap();

        assert_eq!(reporter.keys_written(), 2);
        assert_eq!(*reporter.state.current_bucket.lock(), "logs");
        assert!(reporter.state.line().starts_with("2 keys written, bucket logs"));
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_inert() {
        let mut reporter = ProgressReporter::new(false, 1);
        reporter.start();
        assert!(reporter.handle.is_none());
        reporter.stop().await;
    }

    #[tokio::test]
    async fn test_enabled_reporter_stops() {
        let mut reporter = ProgressReporter::new(true, 1);
        reporter.start();
        assert!(reporter.handle.is_some());
        reporter.stop().await;
    }
}
