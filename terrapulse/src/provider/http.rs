//! HTTP transport abstraction for upstream services.
//!
//! Both upstream clients (imagery and summarization) speak through
//! [`UpstreamHttp`], which keeps their request/response logic testable with
//! a mock transport. Failures stay close to the wire here; each client maps
//! them into its own error classification.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Transport-level failures, before client-specific classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpFailure {
    /// Non-success status. The body is kept for classification only and
    /// must never be copied into a client-visible message.
    #[error("upstream returned HTTP {code}")]
    Status { code: u16, body: String },

    /// The configured per-request timeout elapsed
    #[error("upstream request timed out")]
    TimedOut,

    /// Connection or protocol error
    #[error("network error: {0}")]
    Network(String),
}

/// Async HTTP operations the upstream clients need.
pub trait UpstreamHttp: Send + Sync {
    /// POSTs a URL-encoded form and returns the response body.
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, HttpFailure>> + Send;

    /// POSTs a JSON body and returns the response body.
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<Vec<u8>, HttpFailure>> + Send;

    /// POSTs a JSON body with a bearer token and returns the response body.
    fn post_json_with_bearer(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<Vec<u8>, HttpFailure>> + Send;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, HttpFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpFailure::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl UpstreamHttp for ReqwestHttp {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_body(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_body(response).await
    }

    async fn post_json_with_bearer(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_body(response).await
    }
}

/// Maps a reqwest error to a transport failure.
///
/// The URL is stripped from the error text: request URLs can carry API keys
/// as query parameters and must never leak into messages.
fn map_reqwest_error(error: reqwest::Error) -> HttpFailure {
    if error.is_timeout() {
        HttpFailure::TimedOut
    } else {
        HttpFailure::Network(error.without_url().to_string())
    }
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, HttpFailure> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    if status.is_success() {
        Ok(body.to_vec())
    } else {
        Err(HttpFailure::Status {
            code: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted transport: pops one canned response per call, counting
    /// calls per method.
    pub(crate) struct MockHttp {
        responses: Mutex<VecDeque<Result<Vec<u8>, HttpFailure>>>,
        pub form_calls: AtomicUsize,
        pub json_calls: AtomicUsize,
        pub bearer_calls: AtomicUsize,
    }

    impl MockHttp {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                form_calls: AtomicUsize::new(0),
                json_calls: AtomicUsize::new(0),
                bearer_calls: AtomicUsize::new(0),
            }
        }

        pub fn push_response(&self, response: Result<Vec<u8>, HttpFailure>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn next_response(&self) -> Result<Vec<u8>, HttpFailure> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock transport ran out of scripted responses")
        }
    }

    impl UpstreamHttp for MockHttp {
        async fn post_form(
            &self,
            _url: &str,
            _form: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpFailure> {
            self.form_calls.fetch_add(1, Ordering::SeqCst);
            self.next_response()
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<Vec<u8>, HttpFailure> {
            self.json_calls.fetch_add(1, Ordering::SeqCst);
            self.next_response()
        }

        async fn post_json_with_bearer(
            &self,
            _url: &str,
            _bearer_token: &str,
            _body: &serde_json::Value,
        ) -> Result<Vec<u8>, HttpFailure> {
            self.bearer_calls.fetch_add(1, Ordering::SeqCst);
            self.next_response()
        }
    }

    #[test]
    fn test_http_failure_display_omits_body() {
        let failure = HttpFailure::Status {
            code: 400,
            body: "secret-bearing payload".into(),
        };
        let text = failure.to_string();
        assert_eq!(text, "upstream returned HTTP 400");
        assert!(!text.contains("secret"));
    }

    #[tokio::test]
    async fn test_mock_pops_in_order() {
        let mock = MockHttp::new();
        mock.push_response(Ok(vec![1]));
        mock.push_response(Err(HttpFailure::TimedOut));

        assert_eq!(mock.post_form("u", &[]).await, Ok(vec![1]));
        assert_eq!(
            mock.post_json("u", &serde_json::json!({})).await,
            Err(HttpFailure::TimedOut)
        );
        assert_eq!(mock.form_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.json_calls.load(Ordering::SeqCst), 1);
    }
}
