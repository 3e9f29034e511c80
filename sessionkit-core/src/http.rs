use std::time::Duration;

use reqwest::{Method, RequestBuilder};

/// A thin wrapper on an HTTP client applying sensible defaults such as
/// timeouts, user-agent & ensuring HTTPS.
///
/// No transport-level retry; failed operations are re-driven end to end.
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        #[cfg(not(test))]
        assert!(url.starts_with("https"));

        self.client.request(method, url).timeout(self.timeout).header(
            "User-Agent",
            format!("sessionkit-core/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }
}
