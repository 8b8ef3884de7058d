//! Translation boundary for provider rejections.
//!
//! LLM providers report payload-size problems as free-form error text.
//! This module is the ONLY place that matches on that text; everything
//! downstream works with the closed `ProviderError` variants. Two
//! classes matter to the engine:
//!
//! - a single message's content alone is over the limit → fatal
//! - the aggregate window is over the limit → recoverable by shrinking
//!
//! Both carry two numbers extracted with a fixed rule: the first
//! integer in the text is the maximum allowed size, the second is the
//! attempted size.

use regex::Regex;
use std::sync::OnceLock;
use tabletalk_core::error::ProviderError;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid literal pattern"))
}

/// Extract the first two integers from the error text.
///
/// First number is the provider-reported maximum, second is the
/// attempted size. Missing numbers default to zero.
fn extract_limits(text: &str) -> (usize, usize) {
    let mut numbers = number_pattern()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<usize>().ok());
    let max_length = numbers.next().unwrap_or(0);
    let length = numbers.next().unwrap_or(0);
    (max_length, length)
}

/// Map a non-success provider response into a `ProviderError`.
///
/// Length rejections become the structured `MessageTooLong` /
/// `ContextWindowExceeded` variants; everything else passes through as
/// an opaque `ApiError`.
pub fn classify_api_error(status_code: u16, body: &str) -> ProviderError {
    let lower = body.to_lowercase();

    let about_length = lower.contains("too long")
        || lower.contains("length")
        || lower.contains("context window");

    if about_length {
        let (max_length, length) = extract_limits(body);

        // "message length"/"message too long" (singular) is a per-message
        // rejection; "messages", "context length" or "context window"
        // refer to the aggregate window.
        let aggregate = lower.contains("messages")
            || lower.contains("context length")
            || lower.contains("context window");

        if aggregate {
            return ProviderError::ContextWindowExceeded {
                length,
                max_length,
                message: body.to_string(),
            };
        }
        if lower.contains("message length") || lower.contains("message too long") {
            return ProviderError::MessageTooLong {
                length,
                max_length,
                message: body.to_string(),
            };
        }
    }

    ProviderError::ApiError {
        status_code,
        message: body.to_string(),
    }
}
