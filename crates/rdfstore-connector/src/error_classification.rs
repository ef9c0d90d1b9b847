use crate::{
    error::{Action, StorageError},
    transport::{HttpResponse, TransportError, TransportErrorKind},
};

/// Longest body excerpt kept on an HTTP error.
const BODY_EXCERPT_CHARS: usize = 4096;

/// Build the error for a non-success response, folding the status line, the
/// action and whatever the body tells us into one message.
pub fn from_http(action: Action, response: &HttpResponse) -> StorageError {
    let status_line = match &response.reason {
        Some(reason) => format!("HTTP {} {}", response.status, reason),
        None => format!("HTTP {}", response.status),
    };
    let headline = format!("A HTTP error ({status_line}) occurred while {action} the Store.");

    let declared_body = response.content_length.is_none_or(|length| length > 0);
    let (body, message) = match &response.body {
        Ok(bytes) if declared_body && !bytes.is_empty() => {
            let excerpt = excerpt(&String::from_utf8_lossy(bytes));
            let message =
                format!("{headline}\nStore returned the following error message:\n{excerpt}");
            (Some(excerpt), message)
        }
        Err(read_error) if declared_body => (
            None,
            format!(
                "{headline}\nUnable to read the error message returned by the Store: {read_error}"
            ),
        ),
        _ => (
            None,
            format!("{headline}\nEmpty response body, no further error information available"),
        ),
    };

    StorageError::Http {
        action,
        status: response.status,
        reason: response.reason.clone(),
        body,
        message,
    }
}

pub fn from_transport(action: Action, error: TransportError) -> StorageError {
    StorageError::Transport {
        action,
        kind: error.kind,
        message: error.message,
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Whether repeating the same request could succeed.
pub fn is_retryable(error: &StorageError) -> bool {
    match error {
        StorageError::Transport { kind, .. } => {
            matches!(kind, TransportErrorKind::Connect | TransportErrorKind::Timeout)
        }
        StorageError::Http { status, .. } => matches!(status, 408 | 429 | 502 | 503 | 504),
        _ => false,
    }
}

/// Low-cardinality label for metrics.
pub fn error_class(error: &StorageError) -> &'static str {
    match error {
        StorageError::Http { status, .. } if *status >= 500 => "http_5xx",
        StorageError::Http { status, .. } if *status >= 400 => "http_4xx",
        StorageError::Http { .. } => "http_other",
        StorageError::Transport { kind, .. } => match kind {
            TransportErrorKind::Connect => "transport_connect",
            TransportErrorKind::Timeout => "transport_timeout",
            TransportErrorKind::Request => "transport_request",
            TransportErrorKind::Body => "transport_body",
            TransportErrorKind::Other => "transport_other",
        },
        StorageError::Cancelled { .. } => "cancelled",
        StorageError::TransactionAlreadyActive => "transaction_active",
        StorageError::NoActiveTransaction { .. } => "no_transaction",
        StorageError::Unsupported(_) => "unsupported",
        StorageError::InvalidArgument(_) => "invalid_argument",
        StorageError::UnsupportedContentType { .. } => "unsupported_content_type",
        StorageError::FormatSelection { .. } => "format_selection",
        StorageError::Parse { .. } => "parse_error",
        StorageError::InvalidResponse { .. } => "invalid_response",
        StorageError::Serialize(_) => "serialize_error",
        StorageError::Config(_) => "config",
        StorageError::Io(_) => "io",
        StorageError::SemaphoreClosed => "semaphore_closed",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn message_includes_body_excerpt() {
        let response = HttpResponse::new(500, Some("text/plain"), "database is offline");
        let error = from_http(Action::LoadGraph, &response);
        let message = error.to_string();
        assert!(message.starts_with(
            "A HTTP error (HTTP 500 Internal Server Error) occurred while loading a Graph from the Store."
        ));
        assert!(message.ends_with("database is offline"));
        assert_eq!(error.status(), Some(500));
    }

    #[test]
    fn empty_body_message() {
        let response = HttpResponse::new(404, None, Vec::new());
        let message = from_http(Action::DeleteGraph, &response).to_string();
        assert!(message.contains("deleting a Graph from"));
        assert!(message.ends_with("Empty response body, no further error information available"));
    }

    #[test]
    fn unreadable_body_message() {
        let response = HttpResponse {
            status: 503,
            reason: None,
            content_type: None,
            content_length: Some(120),
            body: Err("connection reset".to_string()),
        };
        let error = from_http(Action::CommitTransaction, &response);
        let message = error.to_string();
        assert!(message.starts_with("A HTTP error (HTTP 503) occurred while committing"));
        assert!(message.ends_with(
            "Unable to read the error message returned by the Store: connection reset"
        ));
        assert!(is_retryable(&error));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(BODY_EXCERPT_CHARS + 10);
        let response = HttpResponse::new(400, None, body);
        match from_http(Action::Query, &response) {
            StorageError::Http { body: Some(body), .. } => {
                assert_eq!(body.chars().count(), BODY_EXCERPT_CHARS + 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn classification_labels() {
        let http = from_http(Action::Query, &HttpResponse::new(401, None, "denied"));
        assert_eq!(error_class(&http), "http_4xx");
        assert!(!is_retryable(&http));

        let timeout = from_transport(
            Action::Query,
            TransportError::new(TransportErrorKind::Timeout, "deadline elapsed"),
        );
        assert_eq!(error_class(&timeout), "transport_timeout");
        assert!(is_retryable(&timeout));
    }
}
