//! Controller client (spec §4.C)
//!
//! [`Controller`] is the typed, session-aware façade over every controller
//! operation in spec §4.C's table. It owns the HTTP client, the session
//! token, the base URL, and the controller-instance id (spec §3
//! "Ownership"). A non-pre-session operation rejects synchronously with
//! [`ErrorKind::AuthFailed`] when no session token is set -- no network I/O
//! is issued (spec §3 invariant).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::controller::pagination::{paginate, paged_path};
use crate::controller::transport::{RawResponse, Transport};
use crate::controller::types::*;
use crate::envelope::{self, Pagination};
use crate::error::{ControllerError, ErrorKind, Result};

/// Invoked once, after the in-flight operation's own result is ready, when a
/// `ziti-ctrl-address` response header differs from the current base URL
/// (spec §4.C "Controller rebinding").
pub type RedirectObserver = Arc<dyn Fn(&str) + Send + Sync>;

struct Inner {
    http: reqwest::Client,
    transport: Transport,
    base_url: RwLock<String>,
    edge_prefix: RwLock<String>,
    version: RwLock<Option<String>>,
    instance_id: RwLock<Option<String>>,
    session_token: RwLock<Option<String>>,
    session_id: RwLock<Option<String>>,
    page_size: usize,
    cancellation: CancellationToken,
    redirect_observer: Option<RedirectObserver>,
    bulk_unsupported: AtomicBool,
    sdk_info: SdkInfo,
}

/// The controller client (spec §4.C). Cheap to clone; clones share all
/// internal state (same pattern as the teacher's `JsonRpcClient::clone_shared`).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

/// Tracks, across however many HTTP exchanges a single public operation
/// issues (one for a simple op, many for a paged one), the last-seen
/// rebind/instance-id signal so it can be applied once the operation's own
/// result is ready -- never mid-operation (spec §4.C "Redirect vs rebind
/// precedence").
#[derive(Default)]
struct RebindSignal {
    ctrl_address: Option<String>,
    instance_id: Option<String>,
}

impl RebindSignal {
    fn observe(&mut self, raw: &RawResponse) {
        if raw.ctrl_address.is_some() {
            self.ctrl_address = raw.ctrl_address.clone();
        }
        if raw.instance_id.is_some() {
            self.instance_id = raw.instance_id.clone();
        }
    }
}

impl Controller {
    /// Build a new controller client from `config`.
    ///
    /// Returns [`ErrorKind::InvalidConfig`] if the HTTP client (TLS context,
    /// CA bundle) cannot be constructed -- the one fatal initialization
    /// failure spec §7 calls out.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .tcp_keepalive(None);

        if let Some(path) = &config.tls.ca_bundle_path {
            let pem = std::fs::read(path).map_err(|e| {
                ControllerError::new(
                    ErrorKind::InvalidConfig,
                    format!("failed to read CA bundle {}: {e}", path.display()),
                )
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ControllerError::new(ErrorKind::InvalidConfig, format!("invalid CA bundle: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|e| {
            ControllerError::new(ErrorKind::InvalidConfig, format!("failed to build http client: {e}"))
        })?;

        let inner = Inner {
            transport: Transport::new(http.clone()),
            http,
            base_url: RwLock::new(config.controller_url.as_str().trim_end_matches('/').to_string()),
            edge_prefix: RwLock::new(String::new()),
            version: RwLock::new(None),
            instance_id: RwLock::new(None),
            session_token: RwLock::new(None),
            session_id: RwLock::new(None),
            page_size: config.page_size,
            cancellation: CancellationToken::new(),
            redirect_observer: config.redirect_observer.clone(),
            bulk_unsupported: AtomicBool::new(false),
            sdk_info: config.sdk_info.clone(),
        };

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Current base URL (after any prior rebind).
    pub fn base_url(&self) -> String {
        self.inner.base_url.read().unwrap().clone()
    }

    /// Whether a session token is currently set.
    pub fn has_session(&self) -> bool {
        self.inner.session_token.read().unwrap().is_some()
    }

    /// The controller-instance id last observed, if any (spec §4.C).
    pub fn instance_id(&self) -> Option<String> {
        self.inner.instance_id.read().unwrap().clone()
    }

    /// The current API session id, if logged in (spec §4.E "must_send" --
    /// the posture engine compares this across ticks).
    pub fn current_api_session_id(&self) -> Option<String> {
        self.inner.session_id.read().unwrap().clone()
    }

    /// Whether `/posture-response-bulk` has been observed to be unsupported
    /// (HTTP 404) and per-id submission should be used instead (spec §4.E,
    /// §9 -- sticky for the lifetime of this controller).
    pub fn bulk_unsupported(&self) -> bool {
        self.inner.bulk_unsupported.load(Ordering::SeqCst)
    }

    /// Cancel every in-flight request; each fires its terminal `Err` with
    /// [`ErrorKind::Disabled`] (spec §5 "Cancellation").
    pub fn cancel_all(&self) {
        self.inner.cancellation.cancel();
    }

    /// `cancel_all` plus clearing cached identity/URL/version/session state.
    pub fn close(&self) {
        self.cancel_all();
        *self.inner.session_token.write().unwrap() = None;
        *self.inner.session_id.write().unwrap() = None;
        *self.inner.version.write().unwrap() = None;
        *self.inner.instance_id.write().unwrap() = None;
    }

    fn full_url(&self, path: &str, use_prefix: bool) -> String {
        let base = self.inner.base_url.read().unwrap();
        if use_prefix {
            let prefix = self.inner.edge_prefix.read().unwrap();
            format!("{base}{prefix}{path}")
        } else {
            format!("{base}{path}")
        }
    }

    fn apply_rebind(&self, signal: RebindSignal) {
        if let Some(new_instance_id) = signal.instance_id {
            let mut current = self.inner.instance_id.write().unwrap();
            if current.as_deref() != Some(new_instance_id.as_str()) {
                tracing::info!(new_instance_id, "controller instance id changed; restart detected");
                *current = Some(new_instance_id);
            }
        }
        if let Some(new_addr) = signal.ctrl_address {
            let mut base = self.inner.base_url.write().unwrap();
            if *base != new_addr {
                tracing::info!(old = %*base, new = %new_addr, "adopting controller rebind address");
                *base = new_addr.clone();
                drop(base);
                if let Some(observer) = &self.inner.redirect_observer {
                    observer(&new_addr);
                }
            }
        }
    }

    /// Issue one HTTP exchange. Returns [`ErrorKind::AuthFailed`] with no
    /// network I/O if `pre_session` is false and no session token is set.
    async fn send_one(
        &self,
        method: Method,
        path: &str,
        use_prefix: bool,
        body: Option<Bytes>,
        content_type: &str,
        accept: &str,
        pre_session: bool,
    ) -> Result<RawResponse> {
        if !pre_session && !self.has_session() {
            return Err(ControllerError::auth_failed_no_session());
        }

        let url = self.full_url(path, use_prefix);
        tracing::debug!(%method, %url, "controller request start");

        let mut builder = self
            .inner
            .http
            .request(method.clone(), &url)
            .header("Accept", accept);

        if body.is_some() {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(token) = self.inner.session_token.read().unwrap().clone() {
            builder = builder.header("zt-session", token);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let request = builder.build().map_err(|e| {
            ControllerError::new(ErrorKind::InvalidState, format!("failed to build request: {e}"))
        })?;

        let result = self.inner.transport.execute(request, &self.inner.cancellation).await;
        match &result {
            Ok(raw) => tracing::debug!(status = raw.status, %method, %url, "controller request finished"),
            Err(e) => tracing::debug!(?e.kind, %method, %url, "controller request failed"),
        }
        result
    }

    async fn send_json_op<B: Serialize, D: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        use_prefix: bool,
        body: Option<&B>,
        pre_session: bool,
    ) -> Result<D> {
        let body_bytes = match body {
            Some(b) => Some(Bytes::from(serde_json::to_vec(b)?)),
            None => None,
        };
        let mut signal = RebindSignal::default();
        let raw = self
            .send_one(method, path, use_prefix, body_bytes, "application/json", "application/json", pre_session)
            .await?;
        signal.observe(&raw);
        let decoded = decode_envelope(&raw);
        self.apply_rebind(signal);
        decoded
    }

    async fn send_json_op_no_body<D: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        pre_session: bool,
    ) -> Result<D> {
        self.send_json_op::<(), D>(method, path, true, None, pre_session).await
    }

    /// `GET /version` (spec §4.C table). Caches `version` and adopts the
    /// edge v1 path prefix for every subsequent request.
    pub async fn version(&self) -> Result<VersionInfo> {
        let mut signal = RebindSignal::default();
        let raw = self
            .send_one(Method::GET, "/version", false, None, "application/json", "application/json", true)
            .await?;
        signal.observe(&raw);
        let info: VersionInfo = decode_envelope(&raw)?;
        if let Some(entry) = info.api_versions.edge.get("v1") {
            *self.inner.edge_prefix.write().unwrap() = entry.path.clone();
        }
        *self.inner.version.write().unwrap() = Some(info.version.clone());
        self.apply_rebind(signal);
        Ok(info)
    }

    /// `POST /authenticate?method=cert` (spec §4.C table). Stores the
    /// returned token for injection on every subsequent request.
    pub async fn login(&self, config_types: Vec<String>) -> Result<LoginResult> {
        let req = LoginRequest {
            sdk_info: self.inner.sdk_info.clone(),
            env_info: EnvInfo {
                os: std::env::consts::OS.to_string(),
                os_version: String::new(),
                arch: std::env::consts::ARCH.to_string(),
            },
            config_types,
        };
        let result: LoginResult = self
            .send_json_op(Method::POST, "/authenticate?method=cert", true, Some(&req), true)
            .await?;
        *self.inner.session_token.write().unwrap() = Some(result.token.clone());
        *self.inner.session_id.write().unwrap() = Some(result.id.clone());
        Ok(result)
    }

    /// `GET /current-api-session` (spec §4.C table).
    pub async fn current_api_session(&self) -> Result<Identity> {
        self.send_json_op_no_body(Method::GET, "/current-api-session", false).await
    }

    /// `DELETE /current-api-session` (spec §4.C table). Clears the session
    /// token regardless of the outcome.
    pub async fn logout(&self) -> Result<()> {
        let result: Result<()> = self
            .send_json_op::<(), serde_json::Value>(Method::DELETE, "/current-api-session", true, None, false)
            .await
            .map(|_| ());
        *self.inner.session_token.write().unwrap() = None;
        *self.inner.session_id.write().unwrap() = None;
        result
    }

    /// `GET /current-identity` (spec §4.C table).
    pub async fn current_identity(&self) -> Result<Identity> {
        self.send_json_op_no_body(Method::GET, "/current-identity", false).await
    }

    /// `GET /current-api-session/service-updates` (spec §4.C table).
    pub async fn services_update(&self) -> Result<ServicesUpdate> {
        self.send_json_op_no_body(Method::GET, "/current-api-session/service-updates", false)
            .await
    }

    /// `GET /services`, paged (spec §4.C table, §4.C "Pagination algorithm").
    pub async fn services(&self) -> Result<Vec<Service>> {
        self.paged_get("/services").await
    }

    /// `GET /current-identity/edge-routers`, paged (spec §4.C table).
    pub async fn edge_routers(&self) -> Result<Vec<EdgeRouter>> {
        self.paged_get("/current-identity/edge-routers").await
    }

    /// `GET /services?filter=name="…"`; returns the first matching element
    /// (spec §4.C table).
    pub async fn service_by_name(&self, name: &str) -> Result<Service> {
        let escaped = name.replace('"', "\\\"");
        let path = format!("/services?filter=name=\"{escaped}\"");
        let page: Vec<Service> = self.send_json_op_no_body(Method::GET, &path, false).await?;
        page.into_iter()
            .next()
            .ok_or_else(|| ControllerError::new(ErrorKind::NotFound, format!("no service named {name}")))
    }

    /// `GET /sessions/{id}` (spec §4.C table).
    pub async fn session(&self, id: &str) -> Result<SessionInfo> {
        self.send_json_op_no_body(Method::GET, &format!("/sessions/{id}"), false).await
    }

    /// `POST /sessions` (spec §4.C table).
    pub async fn create_session(&self, service_id: &str, session_type: &str) -> Result<SessionInfo> {
        let req = CreateSessionRequest {
            service_id: service_id.to_string(),
            session_type: session_type.to_string(),
        };
        self.send_json_op(Method::POST, "/sessions", true, Some(&req), false).await
    }

    /// `GET /sessions`, paged (spec §4.C table).
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>> {
        self.paged_get("/sessions").await
    }

    /// `POST /enroll?method=…&token=…` (spec §4.C table). `body`/`content_type`
    /// vary by enrollment mode; CSR-based enrollment uses `text/plain` and
    /// the response is returned verbatim (spec §6).
    pub async fn enroll(
        &self,
        method: &str,
        token: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<EnrollResult> {
        let path = format!("/enroll?method={method}&token={token}");
        let raw = self
            .send_one(Method::POST, &path, false, Some(body), content_type, "application/json, application/x-pem-file", true)
            .await?;
        if raw.content_type.as_deref() == Some("application/x-pem-file") {
            if !raw.is_success() {
                return Err(ControllerError::with_http_status(
                    ErrorKind::ControllerUnavailable,
                    raw.status,
                    raw.status_text,
                ));
            }
            return Ok(EnrollResult {
                cert: String::from_utf8_lossy(&raw.body).into_owned(),
            });
        }
        decode_envelope(&raw)
    }

    /// `GET /.well-known/est/cacerts` (spec §4.C table). Plain-text PKCS#7,
    /// never JSON-parsed.
    pub async fn well_known_certs(&self) -> Result<Vec<u8>> {
        let raw = self
            .send_one(
                Method::GET,
                "/.well-known/est/cacerts",
                false,
                None,
                "",
                "application/pkcs7-mime",
                true,
            )
            .await?;
        if !raw.is_success() {
            return Err(ControllerError::with_http_status(
                ErrorKind::ControllerUnavailable,
                raw.status,
                raw.status_text,
            ));
        }
        Ok(raw.body.to_vec())
    }

    /// `POST /posture-response` (spec §4.C table, §4.E "send").
    pub async fn posture_response(&self, body: serde_json::Value) -> Result<()> {
        self.send_json_op(Method::POST, "/posture-response", true, Some(&body), false).await
    }

    /// `POST /posture-response-bulk` (spec §4.C table, §4.E "send").
    ///
    /// On HTTP 404 the `bulk_unsupported` flag is set permanently (spec §4.E,
    /// §9) and the 404 is surfaced as [`ErrorKind::NotFound`] so the caller
    /// can fall back to per-id submission for this and every future tick.
    pub async fn posture_response_bulk(&self, bodies: Vec<serde_json::Value>) -> Result<PostureBulkResult> {
        let body_bytes = Bytes::from(serde_json::to_vec(&bodies)?);
        let mut signal = RebindSignal::default();
        let raw = self
            .send_one(
                Method::POST,
                "/posture-response-bulk",
                true,
                Some(body_bytes),
                "application/json",
                "application/json",
                false,
            )
            .await?;
        signal.observe(&raw);
        if raw.status == 404 {
            self.inner.bulk_unsupported.store(true, Ordering::SeqCst);
            self.apply_rebind(signal);
            return Err(ControllerError::with_http_status(ErrorKind::NotFound, 404, "bulk posture endpoint not supported"));
        }
        let decoded = decode_envelope(&raw);
        self.apply_rebind(signal);
        decoded
    }

    /// `POST /current-identity/mfa` -- begin TOTP enrollment.
    pub async fn mfa_post(&self) -> Result<MfaEnrollment> {
        self.send_json_op::<(), MfaEnrollment>(Method::POST, "/current-identity/mfa", true, None, false)
            .await
    }

    /// `GET /current-identity/mfa`.
    pub async fn mfa_get(&self) -> Result<MfaEnrollment> {
        self.send_json_op_no_body(Method::GET, "/current-identity/mfa", false).await
    }

    /// `DELETE /current-identity/mfa`.
    pub async fn mfa_delete(&self, code: &str) -> Result<()> {
        let req = MfaCode { code: code.to_string() };
        self.send_json_op(Method::DELETE, "/current-identity/mfa", true, Some(&req), false)
            .await
    }

    /// `POST /current-identity/mfa/verify` -- complete TOTP enrollment.
    pub async fn mfa_verify(&self, code: &str) -> Result<()> {
        let req = MfaCode { code: code.to_string() };
        self.send_json_op(Method::POST, "/current-identity/mfa/verify", true, Some(&req), false)
            .await
    }

    /// `POST /authenticate/mfa` -- satisfy a pending MFA challenge.
    pub async fn mfa_login(&self, code: &str) -> Result<()> {
        let req = MfaCode { code: code.to_string() };
        self.send_json_op(Method::POST, "/authenticate/mfa", true, Some(&req), false)
            .await
    }

    /// `POST /current-identity/mfa/recovery-codes` -- regenerate recovery codes.
    pub async fn mfa_recovery(&self) -> Result<Vec<String>> {
        self.send_json_op::<(), Vec<String>>(Method::POST, "/current-identity/mfa/recovery-codes", true, None, false)
            .await
    }

    /// `POST /current-identity/authenticators/{id}/extend` (spec §4.C table).
    pub async fn extend_cert_auth(&self, authenticator_id: &str, csr_pem: &str) -> Result<ExtendedCert> {
        let req = ExtendCertRequest { client_cert_csr: csr_pem.to_string() };
        let path = format!("/current-identity/authenticators/{authenticator_id}/extend");
        self.send_json_op(Method::POST, &path, true, Some(&req), false).await
    }

    /// `POST /current-identity/authenticators/{id}/extend-verify` (spec §4.C table).
    pub async fn verify_extend(&self, authenticator_id: &str, new_cert_pem: &str) -> Result<()> {
        let req = VerifyExtendRequest { client_cert: new_cert_pem.to_string() };
        let path = format!("/current-identity/authenticators/{authenticator_id}/extend-verify");
        self.send_json_op(Method::POST, &path, true, Some(&req), false).await
    }

    /// `POST /current-api-session/certificates` (spec §4.C table).
    pub async fn create_api_cert(&self, csr_pem: &str) -> Result<ApiCert> {
        let req = CreateApiCertRequest { csr: csr_pem.to_string() };
        self.send_json_op(Method::POST, "/current-api-session/certificates", true, Some(&req), false)
            .await
    }

    /// Drive a paged `GET`, applying any rebind/instance-id signal observed
    /// across the whole walk only once the walk itself is done (spec §4.C
    /// "Redirect vs rebind precedence" -- every internal page fetch targets
    /// the same base URL the operation started with).
    async fn paged_get<T: DeserializeOwned>(&self, base_path: &str) -> Result<Vec<T>> {
        let limit = self.inner.page_size;
        let signal = Arc::new(std::sync::Mutex::new(RebindSignal::default()));
        let result = paginate(limit, |offset, limit| {
            let path = paged_path(base_path, limit, offset);
            let this = self.clone();
            let signal = Arc::clone(&signal);
            async move {
                let raw = this
                    .send_one(Method::GET, &path, true, None, "application/json", "application/json", false)
                    .await?;
                signal.lock().unwrap().observe(&raw);
                let envelope = envelope::parse_envelope(&raw.body, raw.status, &raw.status_text)?;
                if let Some(err) = envelope::error_from_envelope(&envelope, raw.status) {
                    return Err(err);
                }
                let pagination = envelope.meta.pagination.unwrap_or(Pagination {
                    limit,
                    offset,
                    total_count: 0,
                });
                let data = envelope.data.unwrap_or(serde_json::Value::Array(vec![]));
                let page: Vec<T> = serde_json::from_value(data)?;
                Ok((page, pagination))
            }
        })
        .await;

        let signal = Arc::try_unwrap(signal)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();
        self.apply_rebind(signal);
        result
    }
}

fn decode_envelope<T: DeserializeOwned>(raw: &RawResponse) -> Result<T> {
    let envelope = envelope::parse_envelope(&raw.body, raw.status, &raw.status_text)?;
    if let Some(err) = envelope::error_from_envelope(&envelope, raw.status) {
        return Err(err);
    }
    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TlsConfig};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> Config {
        Config {
            controller_url: url.parse().unwrap(),
            tls: TlsConfig { ca_bundle_path: None },
            page_size: 25,
            posture_interval_secs: 30,
            connect_timeout_secs: 15,
            sdk_info: SdkInfo {
                app_id: "test".into(),
                app_version: "0.0.0".into(),
                sdk_version: "0.0.0".into(),
            },
            redirect_observer: None,
        }
    }

    #[tokio::test]
    async fn non_pre_session_op_rejects_without_network_io() {
        let server = MockServer::start().await;
        // No mocks registered: if a request were actually sent, wiremock
        // would panic on an unexpected request when `.expect(0)` style
        // assertions are used; here we simply verify the error without ever
        // registering a mock, so any accidental request would 404 and the
        // error kind would not be AuthFailed, catching the regression.
        let controller = Controller::new(&test_config(server.uri())).unwrap();
        let err = controller.current_identity().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthFailed);
        assert_eq!(err.message, "no api session token set");
    }

    #[tokio::test]
    async fn login_stores_token_and_injects_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {},
                "data": { "id": "s1", "token": "T" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/current-identity"))
            .and(header("zt-session", "T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {},
                "data": { "id": "i1", "name": "me" }
            })))
            .mount(&server)
            .await;

        let controller = Controller::new(&test_config(server.uri())).unwrap();
        let login = controller.login(vec!["all".to_string()]).await.unwrap();
        assert_eq!(login.token, "T");
        assert!(controller.has_session());

        let identity = controller.current_identity().await.unwrap();
        assert_eq!(identity.id, "i1");
    }

    #[tokio::test]
    async fn services_drains_three_pages_of_57() {
        let server = MockServer::start().await;
        for (offset, n) in [(0, 25), (25, 25), (50, 7)] {
            let elements: Vec<_> = (0..n)
                .map(|i| serde_json::json!({"id": format!("svc-{}", offset + i), "name": "x", "postureQueries": []}))
                .collect();
            Mock::given(method("GET"))
                .and(path("/services"))
                .and(wiremock::matchers::query_param("offset", offset.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "meta": { "pagination": { "limit": 25, "offset": offset, "totalCount": 57 } },
                    "data": elements
                })))
                .mount(&server)
                .await;
        }

        let controller = Controller::new(&test_config(server.uri())).unwrap();
        // fake session for a non-pre-session paged op
        *controller.inner.session_token.write().unwrap() = Some("T".into());
        let services = controller.services().await.unwrap();
        assert_eq!(services.len(), 57);
    }

    #[tokio::test]
    async fn rebind_header_equal_to_current_url_does_not_adopt_or_notify() {
        let server = MockServer::start().await;
        let notified = Arc::new(std::sync::Mutex::new(Vec::new()));
        let notified2 = Arc::clone(&notified);
        let mut cfg = test_config(server.uri());
        cfg.redirect_observer = Some(Arc::new(move |addr: &str| notified2.lock().unwrap().push(addr.to_string())));
        let same_url = cfg.controller_url.as_str().trim_end_matches('/').to_string();

        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ziti-ctrl-address", same_url.as_str())
                    .set_body_json(serde_json::json!({"meta": {}, "data": {"version": "1.0", "revision": "x", "apiVersions": {"edge": {}}}})),
            )
            .mount(&server)
            .await;

        let controller = Controller::new(&cfg).unwrap();
        controller.version().await.unwrap();
        assert!(notified.lock().unwrap().is_empty());
        assert_eq!(controller.base_url(), same_url);
    }

    #[tokio::test]
    async fn posture_bulk_404_sets_sticky_flag_and_not_found_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posture-response-bulk"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let controller = Controller::new(&test_config(server.uri())).unwrap();
        *controller.inner.session_token.write().unwrap() = Some("T".into());
        let err = controller.posture_response_bulk(vec![]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(controller.bulk_unsupported());
    }
}
