//! HTTP transaction layer (spec §4.B)
//!
//! One call to [`Transport::execute`] is one outstanding request and exactly
//! one resolved [`RawResponse`] or [`ControllerError`] -- the async
//! equivalent of the spec's "response context": the request starts, the
//! body streams into a buffer, and the future resolves with exactly one
//! terminal outcome (parsed success, transport error, or cancellation).
//!
//! Two response headers are inspected on every response: `ziti-ctrl-address`
//! (a candidate new base URL for the controller, spec §4.C "rebinding") and
//! `ziti-instance-id` (the controller's restart identity, spec §4.C
//! "controller-instance tracking"). Neither is acted upon here -- this layer
//! only reports what it saw; [`crate::controller::client::Controller`]
//! decides what to do with it after its own terminal callback fires.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{ControllerError, ErrorKind};

/// The raw result of one HTTP exchange, before envelope parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// `status.canonical_reason()`, or a generic fallback.
    pub status_text: String,
    /// The accumulated response body.
    pub body: Bytes,
    /// `ziti-ctrl-address` header value, if present and non-empty.
    pub ctrl_address: Option<String>,
    /// `ziti-instance-id` header value, if present and non-empty.
    pub instance_id: Option<String>,
    /// `Content-Type` header value, if present.
    pub content_type: Option<String>,
}

impl RawResponse {
    /// Whether the HTTP status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one HTTP request and streams its body to completion.
///
/// Owns nothing; it is handed a `reqwest::Client` and a fully built
/// `reqwest::Request` (headers, body, method, URL) by the controller client,
/// which retains sole authority over session-token injection and URL
/// resolution (spec §4.C).
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
}

impl Transport {
    /// Wrap a pre-built `reqwest::Client`. The client owns the connection
    /// pool and TLS configuration; `Transport` itself is stateless.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Execute `request`, honoring `cancellation`.
    ///
    /// On transport failure this translates the error per spec §4.B: a
    /// cancellation becomes [`ErrorKind::Disabled`]; anything else becomes
    /// [`ErrorKind::ControllerUnavailable`]. Headers are inspected before the
    /// body is read so that a `ziti-ctrl-address`/`ziti-instance-id` pair is
    /// observed even if the body itself later fails to parse.
    pub async fn execute(
        &self,
        request: reqwest::Request,
        cancellation: &CancellationToken,
    ) -> Result<RawResponse, ControllerError> {
        let send_fut = self.http.execute(request);

        let response = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(ControllerError::disabled());
            }
            result = send_fut => result,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                if cancellation.is_cancelled() {
                    return Err(ControllerError::disabled());
                }
                return Err(ControllerError::new(ErrorKind::ControllerUnavailable, e.to_string()));
            }
        };

        let status = response.status();
        let status_text = status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();

        let ctrl_address = header_str(&response, "ziti-ctrl-address");
        let instance_id = header_str(&response, "ziti-instance-id");
        let content_type = header_str(&response, "content-type");

        let body_fut = response.bytes();
        let body = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(ControllerError::disabled());
            }
            result = body_fut => result,
        };

        let body = match body {
            Ok(b) => b,
            Err(e) => {
                if cancellation.is_cancelled() {
                    return Err(ControllerError::disabled());
                }
                return Err(ControllerError::new(ErrorKind::ControllerUnavailable, e.to_string()));
            }
        };

        Ok(RawResponse {
            status: status.as_u16(),
            status_text,
            body,
            ctrl_address,
            instance_id,
            content_type,
        })
    }
}

fn header_str(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn execute_surfaces_ctrl_address_and_instance_id_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ziti-ctrl-address", "https://b.example")
                    .insert_header("ziti-instance-id", "inst-1")
                    .set_body_string("{}"),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let transport = Transport::new(http.clone());
        let req = http.get(server.uri()).build().unwrap();
        let resp = transport
            .execute(req, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resp.ctrl_address.as_deref(), Some("https://b.example"));
        assert_eq!(resp.instance_id.as_deref(), Some("inst-1"));
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn cancellation_yields_disabled_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let transport = Transport::new(http.clone());
        let req = http.get(server.uri()).build().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = transport.execute(req, &token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Disabled);
    }

    #[tokio::test]
    async fn missing_optional_headers_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let transport = Transport::new(http.clone());
        let req = http.get(server.uri()).build().unwrap();
        let resp = transport
            .execute(req, &CancellationToken::new())
            .await
            .unwrap();

        assert!(resp.ctrl_address.is_none());
        assert!(resp.instance_id.is_none());
    }
}
