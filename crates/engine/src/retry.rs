//! Automatic recovery from payload-too-large provider rejections.
//!
//! The provider crate classifies raw rejections into two closed
//! variants: a single message that is too long on its own (fatal, no
//! window can fix it) and an aggregate window that is too long
//! (recoverable by shrinking the window and retrying). This controller
//! owns the retry bookkeeping: bounded attempts, the shrinking window
//! cap, and the caller-facing hooks. The state lives for one turn and
//! is never persisted.

use crate::options::LengthErrorHook;
use tabletalk_core::error::{EngineError, Error, ProviderError};
use tracing::{debug, warn};

/// Per-turn retry state for window-length recovery.
#[derive(Debug)]
pub struct RetryController {
    attempts: usize,
    max_attempts: usize,
}

impl RetryController {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Decide what to do with a provider error.
    ///
    /// `Ok(cap)` means retry the turn with the window truncated to
    /// `cap` messages; `Err` means surface the error. Non-length
    /// errors pass through unchanged.
    pub fn decide(
        &mut self,
        error: ProviderError,
        current_window: usize,
        on_message_length: Option<&LengthErrorHook>,
        on_messages_length: Option<&LengthErrorHook>,
    ) -> Result<usize, Error> {
        match error {
            ProviderError::MessageTooLong { .. } => {
                warn!(%error, "Single message exceeds provider limit");
                if let Some(hook) = on_message_length {
                    hook(&error);
                }
                Err(error.into())
            }
            ProviderError::ContextWindowExceeded { max_length, .. } => {
                if self.attempts >= self.max_attempts {
                    warn!(
                        attempts = self.attempts,
                        "Window length retries exhausted"
                    );
                    return Err(EngineError::LengthRetriesExhausted {
                        attempts: self.attempts,
                    }
                    .into());
                }
                if let Some(hook) = on_messages_length {
                    hook(&error);
                }
                self.attempts += 1;

                // The reported maximum is the target cap, but the
                // retry must always shrink the window or it cannot
                // converge.
                let shrunk = current_window.saturating_sub(1).max(1);
                let cap = if max_length == 0 || max_length >= current_window {
                    shrunk
                } else {
                    max_length
                };
                debug!(
                    attempt = self.attempts,
                    cap, current_window, "Retrying with a smaller window"
                );
                Ok(cap)
            }
            other => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn window_error(max_length: usize) -> ProviderError {
        ProviderError::ContextWindowExceeded {
            length: 100,
            max_length,
            message: "too long".into(),
        }
    }

    #[test]
    fn recoverable_error_shrinks_to_reported_maximum() {
        let mut retry = RetryController::new(3);
        let cap = retry.decide(window_error(8), 20, None, None).unwrap();
        assert_eq!(cap, 8);
        assert_eq!(retry.attempts(), 1);
    }

    #[test]
    fn cap_always_shrinks_the_window() {
        let mut retry = RetryController::new(3);
        // Reported max is not smaller than what we just sent
        let cap = retry.decide(window_error(50), 20, None, None).unwrap();
        assert_eq!(cap, 19);
        // Unknown max
        let cap = retry.decide(window_error(0), 19, None, None).unwrap();
        assert_eq!(cap, 18);
    }

    #[test]
    fn exhaustion_is_a_distinct_error() {
        let mut retry = RetryController::new(2);
        retry.decide(window_error(5), 10, None, None).unwrap();
        retry.decide(window_error(4), 5, None, None).unwrap();
        let error = retry.decide(window_error(3), 4, None, None).unwrap_err();
        assert!(matches!(
            error,
            Error::Engine(EngineError::LengthRetriesExhausted { attempts: 2 })
        ));
    }

    #[test]
    fn single_message_error_is_fatal() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let hook: LengthErrorHook = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let mut retry = RetryController::new(3);
        let error = retry
            .decide(
                ProviderError::MessageTooLong {
                    length: 9000,
                    max_length: 4096,
                    message: "message too long".into(),
                },
                10,
                Some(&hook),
                None,
            )
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Provider(ProviderError::MessageTooLong { .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(retry.attempts(), 0);
    }

    #[test]
    fn window_hook_fires_per_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let hook: LengthErrorHook = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let mut retry = RetryController::new(3);
        retry.decide(window_error(5), 10, None, Some(&hook)).unwrap();
        retry.decide(window_error(4), 5, None, Some(&hook)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unrelated_errors_pass_through() {
        let mut retry = RetryController::new(3);
        let error = retry
            .decide(
                ProviderError::RateLimited { retry_after_secs: 30 },
                10,
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Provider(ProviderError::RateLimited { .. })
        ));
        assert_eq!(retry.attempts(), 0);
    }
}
