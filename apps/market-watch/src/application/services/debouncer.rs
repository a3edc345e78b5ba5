//! Filter Debouncer
//!
//! Coalesces keystroke-level filter input into a single settled term once
//! input has been quiet for a fixed period.
//!
//! Every new value cancels the pending one and restarts the quiet timer, so a
//! burst of inputs yields exactly one emission carrying the burst's last
//! value, lower-cased.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::view::FilterTerm;
use crate::infrastructure::metrics;

/// Default quiet period.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Configuration for the filter debouncer.
#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    /// Time without input before the last value is emitted.
    pub quiet_period: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

// =============================================================================
// Debounce State Machine
// =============================================================================

#[derive(Debug)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

/// Resettable single-shot timer holding at most one pending value.
#[derive(Debug)]
pub struct Debounce<T> {
    quiet_period: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debounce<T> {
    /// Create an idle debouncer.
    #[must_use]
    pub const fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    /// Replace any pending value with `value` and restart the timer.
    ///
    /// Returns the discarded value, if one was pending.
    pub fn push(&mut self, value: T, now: Instant) -> Option<T> {
        let previous = self.pending.replace(Pending {
            value,
            deadline: now + self.quiet_period,
        });
        previous.map(|p| p.value)
    }

    /// When the pending value becomes due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Take the pending value if its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(p) if now >= p.deadline => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Drop the pending value without emitting it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }
}

// =============================================================================
// Debouncer Task
// =============================================================================

/// Task turning raw filter input into settled filter terms.
pub struct FilterDebouncer {
    state: Debounce<String>,
    input: mpsc::Receiver<String>,
    output: mpsc::Sender<FilterTerm>,
    cancel: CancellationToken,
}

impl FilterDebouncer {
    /// Create a new debouncer.
    #[must_use]
    pub const fn new(
        config: DebounceConfig,
        input: mpsc::Receiver<String>,
        output: mpsc::Sender<FilterTerm>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state: Debounce::new(config.quiet_period),
            input,
            output,
            cancel,
        }
    }

    /// Run until cancelled or the input closes. A value still pending at
    /// that point is discarded.
    pub async fn run(mut self) {
        loop {
            let deadline = self.state.deadline();
            let wake_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("Filter debouncer cancelled");
                    break;
                }
                maybe_raw = self.input.recv() => {
                    let Some(raw) = maybe_raw else {
                        tracing::debug!("Filter input closed, stopping debouncer");
                        break;
                    };
                    if let Some(discarded) = self.state.push(raw, Instant::now()) {
                        tracing::trace!(discarded = %discarded, "Superseded pending filter");
                    }
                }
                () = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    let Some(raw) = self.state.poll(Instant::now()) else {
                        continue;
                    };
                    let term = FilterTerm::settle(&raw);
                    metrics::record_filter_settled();
                    tracing::debug!(filter = %term, "Filter settled");
                    if self.output.send(term).await.is_err() {
                        tracing::debug!("Settled filter channel closed, stopping debouncer");
                        break;
                    }
                }
            }
        }

        if let Some(dropped) = self.state.cancel() {
            tracing::debug!(dropped = %dropped, "Discarded pending filter on shutdown");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};

    use super::*;

    fn spawn_debouncer() -> (
        mpsc::Sender<String>,
        mpsc::Receiver<FilterTerm>,
        CancellationToken,
        JoinHandle<()>,
    ) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (output_tx, output_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let debouncer =
            FilterDebouncer::new(DebounceConfig::default(), input_rx, output_tx, cancel.clone());
        let handle = tokio::spawn(debouncer.run());
        (input_tx, output_rx, cancel, handle)
    }

    #[test]
    fn state_machine_restarts_timer_on_push() {
        let start = Instant::now();
        let mut state = Debounce::new(Duration::from_millis(300));
        assert!(state.deadline().is_none());

        assert!(state.push("a", start).is_none());
        assert_eq!(state.deadline(), Some(start + Duration::from_millis(300)));

        let later = start + Duration::from_millis(50);
        assert_eq!(state.push("ab", later), Some("a"));
        assert_eq!(state.deadline(), Some(later + Duration::from_millis(300)));
    }

    #[test]
    fn state_machine_emits_only_after_quiet_period() {
        let start = Instant::now();
        let mut state = Debounce::new(Duration::from_millis(300));
        state.push("abc", start);

        assert!(state.poll(start + Duration::from_millis(299)).is_none());
        assert_eq!(state.poll(start + Duration::from_millis(300)), Some("abc"));
        assert!(state.poll(start + Duration::from_millis(900)).is_none());
    }

    #[test]
    fn state_machine_cancel_discards() {
        let start = Instant::now();
        let mut state = Debounce::new(Duration::from_millis(300));
        state.push(1, start);

        assert_eq!(state.cancel(), Some(1));
        assert!(state.poll(start + Duration::from_secs(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_emits_single_lowercased_value() {
        let (input, mut output, cancel, _handle) = spawn_debouncer();

        input.send("a".to_string()).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        input.send("ab".to_string()).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        input.send("ABC".to_string()).await.unwrap();
        let last_input_at = Instant::now();

        let term = output.recv().await.unwrap();
        assert_eq!(term.as_str(), "abc");
        assert!(last_input_at.elapsed() >= Duration::from_millis(300));

        assert!(
            timeout(Duration::from_secs(1), output.recv())
                .await
                .is_err(),
            "a settled burst emits exactly once"
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_emit_separately() {
        let (input, mut output, cancel, _handle) = spawn_debouncer();

        input.send("Gold".to_string()).await.unwrap();
        assert_eq!(output.recv().await.unwrap().as_str(), "gold");

        input.send("Gold".to_string()).await.unwrap();
        assert_eq!(output.recv().await.unwrap().as_str(), "gold");

        input.send(String::new()).await.unwrap();
        assert!(output.recv().await.unwrap().is_empty());
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn pending_value_discarded_on_cancel() {
        let (input, mut output, cancel, handle) = spawn_debouncer();

        input.send("metal".to_string()).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(output.recv().await.is_none());
    }
}
