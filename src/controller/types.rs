//! Wire types for controller operations (spec §4.C, §6)
//!
//! All types here derive `Serialize`/`Deserialize`. Field names are
//! `camelCase` on the wire via `#[serde(rename = "...")]` where the wire
//! shape and the idiomatic Rust field name diverge, matching the teacher's
//! convention in `mcp/types.rs`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `GET /version` response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Controller's reported version string.
    pub version: String,
    /// Build revision.
    #[serde(default)]
    pub revision: String,
    /// Per-API-family version table; the edge v1 entry's `path` becomes the
    /// path prefix used for every subsequent edge API request.
    #[serde(rename = "apiVersions", default)]
    pub api_versions: ApiVersions,
}

/// The `apiVersions` map of [`VersionInfo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiVersions {
    /// The `edge` API family's version table.
    #[serde(default)]
    pub edge: HashMap<String, ApiVersionEntry>,
}

/// One entry of an API family's version table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiVersionEntry {
    /// Path prefix to use for this API version (e.g. `/edge/v1`).
    pub path: String,
}

/// Body of `POST /authenticate?method=cert`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Host SDK identification, embedded per spec §6.
    pub sdk_info: SdkInfo,
    /// The deployment environment descriptor.
    pub env_info: EnvInfo,
    /// Config types the caller wants returned with the session (e.g. `"all"`).
    #[serde(rename = "configTypes")]
    pub config_types: Vec<String>,
}

/// SDK identity embedded in the login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkInfo {
    /// Application identifier of the host process.
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Application version of the host process.
    #[serde(rename = "appVersion")]
    pub app_version: String,
    /// This SDK's own version string.
    #[serde(rename = "version")]
    pub sdk_version: String,
}

/// Deployment environment descriptor embedded in the login payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvInfo {
    /// Host operating system name.
    #[serde(default)]
    pub os: String,
    /// Host operating system version.
    #[serde(default)]
    pub os_version: String,
    /// Host architecture (e.g. `"x86_64"`).
    #[serde(default)]
    pub arch: String,
}

/// `data` payload of a successful login response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    /// The API session identifier.
    pub id: String,
    /// The opaque session token sent as `zt-session` on subsequent requests.
    pub token: String,
}

/// `GET /current-api-session` / `GET /current-identity` shared identity shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Identity identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// `GET /services` element and `service(name)` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Service identifier.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Posture-query sets keyed by permission (dial/bind); each entry's
    /// `timeout` of `-1` means "no expiry" (spec §4.E step 3).
    #[serde(rename = "postureQueries", default)]
    pub posture_queries: Vec<PostureQuerySet>,
}

/// One posture-query-set entry of a service (spec §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureQuerySet {
    /// The individual posture checks this set requires.
    #[serde(rename = "postureQueries", default)]
    pub queries: Vec<PostureQuery>,
}

/// A single posture check requirement attached to a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureQuery {
    /// Check type: `"OS"`, `"MAC"`, `"DOMAIN"`, `"PROCESS"`, `"PROCESS_MULTI"`.
    #[serde(rename = "queryType")]
    pub query_type: String,
    /// Seconds until this check's last submission expires; `-1` means never.
    #[serde(default = "default_timeout")]
    pub timeout: i64,
    /// Absolute path for `PROCESS` checks.
    #[serde(default)]
    pub path: Option<String>,
    /// Absolute paths for `PROCESS_MULTI` checks.
    #[serde(default)]
    pub process_paths: Option<Vec<String>>,
}

fn default_timeout() -> i64 {
    -1
}

/// `GET /current-identity/edge-routers` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRouter {
    /// Router identifier.
    pub id: String,
    /// Router name.
    #[serde(default)]
    pub name: String,
}

/// `sessions` / `create-session` / `session(id)` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub id: String,
    /// Identifier of the service this session grants access to.
    #[serde(rename = "serviceId")]
    pub service_id: String,
    /// `"Dial"` or `"Bind"`.
    #[serde(rename = "type")]
    pub session_type: String,
    /// Opaque session token used by the data-plane (out of scope here).
    pub token: String,
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    /// Identifier of the service to create a session for.
    #[serde(rename = "serviceId")]
    pub service_id: String,
    /// `"Dial"` or `"Bind"`.
    #[serde(rename = "type")]
    pub session_type: String,
}

/// Per-id entry of a successful posture-bulk response (spec §4.E "send").
#[derive(Debug, Clone, Deserialize)]
pub struct PostureServiceTimeout {
    /// The service identifier this timeout applies to.
    pub id: String,
    /// Configured timeout, seconds.
    pub timeout: i64,
    /// Seconds remaining before this posture check expires.
    #[serde(rename = "timeoutRemaining")]
    pub timeout_remaining: i64,
}

/// `data` payload of a successful `POST /posture-response-bulk`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostureBulkResult {
    /// Per-service timeout/refresh signals (spec §4.E, §9 open question).
    #[serde(default)]
    pub services: Vec<PostureServiceTimeout>,
}

/// `POST /current-identity/mfa` enrollment start response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaEnrollment {
    /// Provisioning URL/secret for the authenticator app.
    #[serde(rename = "provisioningUrl")]
    pub provisioning_url: String,
}

/// Body of `POST /authenticate/mfa` and `POST /current-identity/mfa/verify`.
#[derive(Debug, Clone, Serialize)]
pub struct MfaCode {
    /// The time-based one-time code.
    pub code: String,
}

/// `data` payload of a successful certificate-extension response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedCert {
    /// Newly issued client certificate, PEM-encoded.
    #[serde(rename = "clientCert")]
    pub client_cert: String,
}

/// Body of `POST /current-identity/authenticators/{id}/extend`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtendCertRequest {
    /// PEM-encoded certificate signing request.
    #[serde(rename = "clientCertCsr")]
    pub client_cert_csr: String,
}

/// Body of `POST /current-identity/authenticators/{id}/extend-verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyExtendRequest {
    /// The newly issued certificate, echoed back for verification.
    #[serde(rename = "clientCert")]
    pub client_cert: String,
}

/// `data` payload of a successful API-session certificate creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCert {
    /// Newly issued certificate, PEM-encoded.
    pub certificate: String,
}

/// Body of `POST /current-api-session/certificates`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateApiCertRequest {
    /// PEM-encoded certificate signing request.
    pub csr: String,
}

/// `data` payload of `GET /current-api-session/service-updates`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesUpdate {
    /// Opaque "last change" token the caller can compare across polls.
    #[serde(rename = "lastChangeAt")]
    pub last_change_at: String,
}

/// `data` payload of a successful enrollment response.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollResult {
    /// The issued client certificate. For CSR-based enrollment this is the
    /// verbatim `application/x-pem-file` body (spec §6); for JWT-based
    /// enrollment it is extracted from the envelope `data`.
    pub cert: String,
}
