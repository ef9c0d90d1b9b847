#![allow(clippy::unwrap_used)]

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::transport::{
    HttpResponse, RequestDescriptor, Transport, TransportError, TransportErrorKind,
};

/// Scripted reply for the next request
pub(crate) enum Reply {
    Response(HttpResponse),
    Error(TransportError),
    /// Never answers; only cancellation gets the caller out
    Hang,
}

impl Reply {
    pub(crate) fn ok() -> Self {
        Reply::Response(HttpResponse::new(200, None, Vec::new()))
    }

    pub(crate) fn text(body: &str) -> Self {
        Reply::Response(HttpResponse::new(200, Some("text/plain"), body))
    }

    pub(crate) fn content(content_type: &str, body: &str) -> Self {
        Reply::Response(HttpResponse::new(200, Some(content_type), body))
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Reply::Response(HttpResponse::new(status, Some("text/plain"), body))
    }

    pub(crate) fn connect_error() -> Self {
        Reply::Error(TransportError::new(
            TransportErrorKind::Connect,
            "connection refused",
        ))
    }
}

/// Transport answering from a script and recording every request.
/// An exhausted script answers `200` with an empty body.
pub(crate) struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RequestDescriptor>>,
}

impl MockTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.path).collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.call_count() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} requests"
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, request: RequestDescriptor) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Hang) => futures::future::pending().await,
            None => Ok(HttpResponse::new(200, None, Vec::new())),
        }
    }
}
