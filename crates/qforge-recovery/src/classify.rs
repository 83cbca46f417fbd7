//! Raw error classification.

use crate::details::{ErrorContext, ErrorDetails, ErrorKind};
use crate::raw::RawError;

/// Keyword table, checked in order.
const KEYWORDS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::Timeout, &["timeout", "timed out", "deadline"]),
    (
        ErrorKind::Auth,
        &["unauthorized", "forbidden", "authentication", "credential"],
    ),
    (
        ErrorKind::Resource,
        &["quota", "rate limit", "capacity", "exhausted", "too many", "throttl"],
    ),
    (
        ErrorKind::Network,
        &["network", "connection", "unreachable", "unavailable"],
    ),
    (
        ErrorKind::Compilation,
        &["compil", "transpil", "native gate set", "basis"],
    ),
    (
        ErrorKind::Validation,
        &["invalid", "malformed", "out of range", "not found", "parse"],
    ),
    (
        ErrorKind::Execution,
        &["execution", "job failed", "backend", "submission"],
    ),
];

fn kind_from_status(status: u16) -> Option<ErrorKind> {
    match status {
        400 | 422 => Some(ErrorKind::Validation),
        401 | 403 => Some(ErrorKind::Auth),
        408 | 504 => Some(ErrorKind::Timeout),
        429 | 507 => Some(ErrorKind::Resource),
        500..=599 => Some(ErrorKind::Network),
        _ => None,
    }
}

fn kind_from_message(message: &str) -> Option<ErrorKind> {
    let lower = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
}

/// Kind of `raw`, without building a record.
pub fn classify_kind(raw: &RawError) -> ErrorKind {
    raw.status
        .and_then(kind_from_status)
        .or_else(|| kind_from_message(&raw.message))
        .unwrap_or(ErrorKind::Unknown)
}

/// Classify `raw` observed in `context`.
///
/// The status code decides first, then message keywords. Severity is the
/// kind's default, escalated one step on any retry attempt.
pub fn classify(raw: &RawError, context: &ErrorContext) -> ErrorDetails {
    let kind = classify_kind(raw);
    let mut details = ErrorDetails::new(kind, raw.message.clone()).with_context(context);
    if let Some(code) = &raw.code {
        details = details.with_code(code.clone());
    }
    if context.attempt > 0 {
        details = details.with_severity(kind.default_severity().escalate());
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::{OperationPhase, Severity};

    fn ctx() -> ErrorContext {
        ErrorContext::new(OperationPhase::Submission).with_provider("A")
    }

    #[test]
    fn test_status_wins_over_keywords() {
        let raw = RawError::new("connection timed out").with_status(401);
        assert_eq!(classify_kind(&raw), ErrorKind::Auth);
        let raw = RawError::new("whatever").with_status(503);
        assert_eq!(classify_kind(&raw), ErrorKind::Network);
        let raw = RawError::new("slow down").with_status(429);
        assert_eq!(classify_kind(&raw), ErrorKind::Resource);
        let raw = RawError::new("gateway").with_status(504);
        assert_eq!(classify_kind(&raw), ErrorKind::Timeout);
    }

    #[test]
    fn test_keyword_order() {
        let cases = [
            ("Job submission failed: connection timed out", ErrorKind::Timeout),
            ("invalid credentials", ErrorKind::Auth),
            ("daily quota exhausted", ErrorKind::Resource),
            ("service unavailable", ErrorKind::Network),
            ("transpilation failed for ccx", ErrorKind::Compilation),
            ("parameter out of range", ErrorKind::Validation),
            ("Job failed: qubit calibration drift", ErrorKind::Execution),
            ("something odd", ErrorKind::Unknown),
        ];
        for (message, kind) in cases {
            assert_eq!(classify_kind(&RawError::new(message)), kind, "{message}");
        }
    }

    #[test]
    fn test_unrecoverable_kinds() {
        let d = classify(&RawError::new("bad").with_status(400), &ctx());
        assert!(!d.recoverable());
        assert!(!d.suggested_actions().is_empty());
        let d = classify(&RawError::new("???"), &ctx());
        assert_eq!(d.kind(), ErrorKind::Unknown);
        assert!(!d.recoverable());
    }

    #[test]
    fn test_code_and_context_carried() {
        let raw = RawError::new("network down").with_code("NET_42");
        let d = classify(&raw, &ctx().with_job("j1"));
        assert_eq!(d.code(), "NET_42");
        assert_eq!(d.provider(), Some("A"));
        assert_eq!(d.job_id(), Some("j1"));
        assert_eq!(d.phase(), Some(OperationPhase::Submission));
        assert!(d.recoverable());
    }

    #[test]
    fn test_severity_escalates_on_retry() {
        let raw = RawError::new("network down");
        assert_eq!(classify(&raw, &ctx()).severity(), Severity::Low);
        assert_eq!(
            classify(&raw, &ctx().with_attempt(1)).severity(),
            Severity::Medium
        );
    }
}
