//! Posture probes (spec §4.D)
//!
//! A probe materializes the type-specific fields of one posture check's JSON
//! body (spec §6 "Posture request payload shapes"); the engine wraps the
//! result with `id`/`typeId` before caching or sending it. Every probe here
//! is `async` so overrides and the default implementations share one call
//! shape regardless of whether the work is synchronous (OS/MAC/domain) or
//! dispatched to a worker thread (process hashing).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha512};

/// A boxed, `Send` future -- the shape every probe and override returns.
pub type ProbeFuture = Pin<Box<dyn Future<Output = serde_json::Value> + Send>>;

/// Override for a host-level probe (OS, MAC, or domain): no input, one JSON body out.
pub type HostProbeOverride = Arc<dyn Fn() -> ProbeFuture + Send + Sync>;

/// Override for the process probe: takes the absolute path, one JSON body out.
pub type ProcessProbeOverride = Arc<dyn Fn(String, Arc<AtomicBool>) -> ProbeFuture + Send + Sync>;

/// Consumer-supplied overrides for any of the four probe kinds (spec §4.D
/// "Consumers MAY override any probe").
#[derive(Clone, Default)]
pub struct ProbeOverrides {
    pub os: Option<HostProbeOverride>,
    pub mac: Option<HostProbeOverride>,
    pub domain: Option<HostProbeOverride>,
    pub process: Option<ProcessProbeOverride>,
}

/// `{type, version, build}` sourced from the host OS (spec §4.D "OS probe").
///
/// Synchronous and in-memory; on Linux, `version` is read from
/// `/etc/os-release`'s `VERSION_ID` when present. Other platforms report the
/// architecture/OS constant only -- `version`/`build` are empty strings.
pub async fn probe_os() -> serde_json::Value {
    let os_type = std::env::consts::OS.to_string();
    let version = read_linux_version_id().unwrap_or_default();
    serde_json::json!({ "type": os_type, "version": version, "build": "" })
}

#[cfg(target_os = "linux")]
fn read_linux_version_id() -> Option<String> {
    let contents = std::fs::read_to_string("/etc/os-release").ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VERSION_ID=") {
            return Some(rest.trim_matches('"').to_string());
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_linux_version_id() -> Option<String> {
    None
}

/// `{macAddresses: […]}` -- every non-loopback interface's hardware address,
/// de-duplicated by interface name, formatted `aa:bb:…` (spec §4.D "MAC probe").
pub async fn probe_mac() -> serde_json::Value {
    serde_json::json!({ "macAddresses": list_mac_addresses() })
}

#[cfg(target_os = "linux")]
fn list_mac_addresses() -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir("/sys/class/net") else {
        return out;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "lo" || !seen.insert(name.clone()) {
            continue;
        }
        let addr_path = entry.path().join("address");
        let Ok(raw) = std::fs::read_to_string(&addr_path) else {
            continue;
        };
        let mac = raw.trim().to_lowercase();
        if mac.is_empty() || mac == "00:00:00:00:00:00" {
            continue;
        }
        out.push(mac);
    }
    out.sort();
    out
}

#[cfg(not(target_os = "linux"))]
fn list_mac_addresses() -> Vec<String> {
    Vec::new()
}

/// `{domain}` -- the joined Windows domain, empty string elsewhere (spec §4.D
/// "Domain probe").
pub async fn probe_domain() -> serde_json::Value {
    serde_json::json!({ "domain": joined_domain() })
}

#[cfg(windows)]
fn joined_domain() -> String {
    std::env::var("USERDOMAIN").unwrap_or_default()
}

#[cfg(not(windows))]
fn joined_domain() -> String {
    String::new()
}

/// `{path, isRunning, hash, signers: […]}` for one absolute process path
/// (spec §4.D "Process probe").
///
/// Runs on a blocking worker (spec §4.F, §5 "File-hashing / signer-extraction
/// workers") so the scheduler never blocks on file I/O. `cancelled` is
/// checked after the blocking work completes; if set, the caller must drop
/// the reply rather than deliver it (spec §4.D "Must be cancellable").
pub async fn probe_process(path: String, cancelled: Arc<AtomicBool>) -> serde_json::Value {
    let result = tokio::task::spawn_blocking({
        let path = path.clone();
        move || hash_and_inspect(&path)
    })
    .await;

    if cancelled.load(Ordering::SeqCst) {
        return serde_json::Value::Null;
    }

    let (is_running, hash, signers) = match result {
        Ok(v) => v,
        Err(_) => (false, String::new(), Vec::<String>::new()),
    };

    serde_json::json!({
        "path": path,
        "isRunning": is_running,
        "hash": hash,
        "signers": signers,
    })
}

/// Blocking body of the process probe: SHA-512 the file, check for a running
/// process with that image path, and (Windows only, currently unimplemented)
/// collect Authenticode signer thumbprints.
fn hash_and_inspect(path: &str) -> (bool, String, Vec<String>) {
    let hash = match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha512::new();
            hasher.update(&bytes);
            hex::encode(hasher.finalize())
        }
        Err(_) => String::new(),
    };
    let is_running = process_with_image_path_running(path);
    let signers = authenticode_signers(path);
    (is_running, hash, signers)
}

#[cfg(target_os = "linux")]
fn process_with_image_path_running(path: &str) -> bool {
    let Ok(target) = std::fs::canonicalize(path) else {
        return false;
    };
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let exe_link = entry.path().join("exe");
        if let Ok(resolved) = std::fs::read_link(&exe_link) {
            if resolved == target {
                return true;
            }
        }
    }
    false
}

#[cfg(not(target_os = "linux"))]
fn process_with_image_path_running(_path: &str) -> bool {
    false
}

/// SHA-1 thumbprints of the certificates in the file's Authenticode
/// signature; empty on non-Windows (spec §4.D). Authenticode/PE signature
/// parsing is not implemented on Windows either -- no signer thumbprints are
/// ever returned. TODO: parse the PE's WIN_CERTIFICATE directory and the
/// embedded PKCS#7 blob once a maintained crate for it is available.
fn authenticode_signers(_path: &str) -> Vec<String> {
    Vec::new()
}
