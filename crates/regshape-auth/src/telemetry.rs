//! Optional execution-time instrumentation.

use std::future::Future;
use std::time::Instant;

use tracing::info;

/// Instrumentation settings, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrumentation {
    pub track_execution_time: bool,
}

impl Instrumentation {
    pub fn new(track_execution_time: bool) -> Self {
        Self {
            track_execution_time,
        }
    }

    /// Await `fut`, logging its duration when tracking is enabled.
    pub async fn timed<F: Future>(&self, operation: &'static str, fut: F) -> F::Output {
        if !self.track_execution_time {
            return fut.await;
        }

        let start = Instant::now();
        let output = fut.await;
        info!(
            operation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "execution time"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_returns_inner_output() {
        let enabled = Instrumentation::new(true);
        let disabled = Instrumentation::default();

        assert_eq!(enabled.timed("op", async { 7 }).await, 7);
        assert_eq!(disabled.timed("op", async { "x" }).await, "x");
    }
}
