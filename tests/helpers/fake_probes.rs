//! In-process fake posture probes for deterministic engine tests.
//!
//! Mirrors the teacher's `FakeTransport` (`src/mcp/transport/fake.rs`): an
//! in-memory substitute for host I/O that a test can both drive (set the
//! value a probe returns) and observe (which probes actually ran, and in
//! what order), instead of depending on real OS/network/process state.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use edge_client::posture::ProbeOverrides;

#[derive(Default)]
struct State {
    os: serde_json::Value,
    mac: serde_json::Value,
    domain: serde_json::Value,
    process: HashMap<String, serde_json::Value>,
    calls: Vec<String>,
}

/// Drives and observes a [`ProbeOverrides`] set without touching the host.
pub struct FakeProbes {
    state: Mutex<State>,
}

impl FakeProbes {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                os: serde_json::json!({"type": "linux", "version": "", "build": ""}),
                mac: serde_json::json!({"macAddresses": []}),
                domain: serde_json::json!({"domain": ""}),
                process: HashMap::new(),
                calls: Vec::new(),
            }),
        })
    }

    pub fn set_os(&self, value: serde_json::Value) {
        self.state.lock().unwrap().os = value;
    }

    pub fn set_mac(&self, value: serde_json::Value) {
        self.state.lock().unwrap().mac = value;
    }

    pub fn set_domain(&self, value: serde_json::Value) {
        self.state.lock().unwrap().domain = value;
    }

    pub fn set_process(&self, path: &str, value: serde_json::Value) {
        self.state.lock().unwrap().process.insert(path.to_string(), value);
    }

    /// Probe kinds dispatched so far, in order (`"os"`, `"mac"`, `"domain"`,
    /// or `"process:<path>"`).
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn overrides(self: &Arc<Self>) -> ProbeOverrides {
        let os_self = Arc::clone(self);
        let mac_self = Arc::clone(self);
        let domain_self = Arc::clone(self);
        let process_self = Arc::clone(self);

        ProbeOverrides {
            os: Some(Arc::new(move || {
                let fake = Arc::clone(&os_self);
                Box::pin(async move {
                    let mut state = fake.state.lock().unwrap();
                    state.calls.push("os".to_string());
                    state.os.clone()
                })
            })),
            mac: Some(Arc::new(move || {
                let fake = Arc::clone(&mac_self);
                Box::pin(async move {
                    let mut state = fake.state.lock().unwrap();
                    state.calls.push("mac".to_string());
                    state.mac.clone()
                })
            })),
            domain: Some(Arc::new(move || {
                let fake = Arc::clone(&domain_self);
                Box::pin(async move {
                    let mut state = fake.state.lock().unwrap();
                    state.calls.push("domain".to_string());
                    state.domain.clone()
                })
            })),
            process: Some(Arc::new(move |path: String, _cancelled: Arc<AtomicBool>| {
                let fake = Arc::clone(&process_self);
                Box::pin(async move {
                    let mut state = fake.state.lock().unwrap();
                    state.calls.push(format!("process:{path}"));
                    state
                        .process
                        .get(&path)
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({"path": path, "isRunning": false, "hash": "", "signers": []}))
                })
            })),
        }
    }
}
