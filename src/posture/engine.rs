//! Posture engine (spec §4.E)
//!
//! Drives one tick of the posture protocol: decide whether a resend is
//! mandatory, derive the required probe set from the known service catalog,
//! dispatch probes (default or overridden), collect their replies into the
//! cache, and hand anything due off to the controller -- bulk when possible,
//! falling back permanently to per-id submission the first time the bulk
//! endpoint 404s (spec §4.E "Transport dispatch", §9 "sticky for the process
//! lifetime").

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::controller::client::Controller;
use crate::controller::types::Service;
use crate::posture::cache::PostureCache;
use crate::posture::probes::{self, ProbeOverrides};

/// Tracks cross-tick state the tick algorithm needs: the last-seen API
/// session / controller-instance identities (to detect a restart or a new
/// login, spec §4.E step 2) and the sticky "resend everything" flag a failed
/// bulk submission sets (spec §4.E "Transport dispatch").
struct EngineState {
    last_session_id: Option<String>,
    last_instance_id: Option<String>,
    must_send: bool,
}

/// The posture engine (spec §4.E, §4.F).
pub struct PostureEngine {
    controller: Controller,
    overrides: ProbeOverrides,
    cache: tokio::sync::Mutex<PostureCache>,
    state: tokio::sync::Mutex<EngineState>,
    services: RwLock<Vec<Service>>,
    inflight_process_cancel: tokio::sync::Mutex<std::collections::HashMap<String, Arc<AtomicBool>>>,
    refresh_requested: AtomicBool,
    refresh_service_ids: tokio::sync::Mutex<Vec<String>>,
}

impl PostureEngine {
    pub fn new(controller: Controller, overrides: ProbeOverrides) -> Self {
        Self {
            controller,
            overrides,
            cache: tokio::sync::Mutex::new(PostureCache::new()),
            state: tokio::sync::Mutex::new(EngineState {
                last_session_id: None,
                last_instance_id: None,
                must_send: false,
            }),
            services: RwLock::new(Vec::new()),
            inflight_process_cancel: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            refresh_requested: AtomicBool::new(false),
            refresh_service_ids: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Replace the engine's view of the service catalog (normally refreshed
    /// by the caller after `GET /services` or a service-update notification).
    pub async fn set_services(&self, services: Vec<Service>) {
        *self.services.write().await = services;
    }

    /// Drain the "a service refresh is due" signal set by a bulk posture
    /// response carrying per-service timeouts (spec §4.E "force-refresh that
    /// service in the upstream service catalog, then request a general
    /// service refresh"). Returns the specific ids to force-refresh and
    /// whether a general refresh was also requested.
    pub async fn take_refresh_signal(&self) -> (Vec<String>, bool) {
        let ids = std::mem::take(&mut *self.refresh_service_ids.lock().await);
        let general = self.refresh_requested.swap(false, Ordering::SeqCst);
        (ids, general)
    }

    /// Run one tick (spec §4.E "Tick algorithm").
    ///
    /// `session_id` is the current API session id, `instance_id` the current
    /// controller-instance id; `None`/`None` (or an empty session id) means
    /// "no session, or only partially authenticated" and the tick is skipped
    /// with no probes dispatched and no requests sent.
    pub async fn tick(&self, session_id: Option<&str>, instance_id: Option<&str>) {
        let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
            return;
        };

        let mut state = self.state.lock().await;
        let session_changed = state.last_session_id.as_deref() != Some(session_id);
        let instance_changed = instance_id.is_some() && state.last_instance_id.as_deref() != instance_id;
        let must_send = session_changed || instance_changed || state.must_send;
        state.last_session_id = Some(session_id.to_string());
        if let Some(instance_id) = instance_id {
            state.last_instance_id = Some(instance_id.to_string());
        }
        state.must_send = false;
        drop(state);

        let (required_singles, required_processes, send_every_time) = self.required_probe_set().await;
        let force_resend = must_send || send_every_time;

        let mut cache = self.cache.lock().await;
        cache.mark_idle_entries_obsolete();

        let mut to_dispatch: Vec<DispatchJob> = Vec::new();
        for id in &required_singles {
            if cache.require(id) {
                to_dispatch.push(DispatchJob::Single(id.clone()));
            }
        }
        for path in &required_processes {
            if cache.require(path) {
                to_dispatch.push(DispatchJob::Process(path.clone()));
            }
        }
        drop(cache);

        let replies = self.run_dispatch(to_dispatch).await;

        let mut cache = self.cache.lock().await;
        for (id, body) in replies {
            if body.is_null() {
                // cancelled mid-flight; drop the reply (spec §4.D).
                continue;
            }
            cache.collect(&id, body, force_resend);
        }
        cache.sweep_obsolete();
        drop(cache);

        self.send().await;
    }

    /// An edge-triggered endpoint state change: send `ENDPOINT_STATE`
    /// immediately, bypassing the cache dedup (spec §4.E).
    pub async fn endpoint_state_change(&self, woken: bool, unlocked: bool) {
        if !woken && !unlocked {
            return;
        }
        let body = serde_json::json!({ "woken": woken, "unlocked": unlocked });
        {
            let mut cache = self.cache.lock().await;
            cache.force_entry("ENDPOINT_STATE", body);
        }
        self.send().await;
    }

    /// Walk the known service catalog's posture-query maps (spec §4.E step 3).
    async fn required_probe_set(&self) -> (HashSet<String>, HashSet<String>, bool) {
        let services = self.services.read().await;
        let mut singles = HashSet::new();
        let mut processes = HashSet::new();
        let mut send_every_time = true;

        for service in services.iter() {
            for set in &service.posture_queries {
                for query in &set.queries {
                    if query.timeout == -1 {
                        send_every_time = false;
                    }
                    match query.query_type.as_str() {
                        "OS" => {
                            singles.insert("OS".to_string());
                        }
                        "MAC" => {
                            singles.insert("MAC".to_string());
                        }
                        "DOMAIN" => {
                            singles.insert("DOMAIN".to_string());
                        }
                        "PROCESS" => {
                            if let Some(path) = &query.path {
                                processes.insert(path.clone());
                            }
                        }
                        "PROCESS_MULTI" => {
                            if let Some(paths) = &query.process_paths {
                                processes.extend(paths.iter().cloned());
                            }
                        }
                        other => {
                            tracing::warn!(query_type = other, "unrecognized posture query type");
                        }
                    }
                }
            }
        }

        (singles, processes, send_every_time)
    }

    async fn run_dispatch(&self, jobs: Vec<DispatchJob>) -> Vec<(String, serde_json::Value)> {
        let futures = jobs.into_iter().map(|job| self.run_one(job));
        join_all(futures).await
    }

    async fn run_one(&self, job: DispatchJob) -> (String, serde_json::Value) {
        match job {
            DispatchJob::Single(id) => {
                let body = match id.as_str() {
                    "OS" => match &self.overrides.os {
                        Some(f) => f().await,
                        None => probes::probe_os().await,
                    },
                    "MAC" => match &self.overrides.mac {
                        Some(f) => f().await,
                        None => probes::probe_mac().await,
                    },
                    "DOMAIN" => match &self.overrides.domain {
                        Some(f) => f().await,
                        None => probes::probe_domain().await,
                    },
                    _ => serde_json::Value::Null,
                };
                (id, body)
            }
            DispatchJob::Process(path) => {
                let cancelled = Arc::new(AtomicBool::new(false));
                self.inflight_process_cancel
                    .lock()
                    .await
                    .insert(path.clone(), Arc::clone(&cancelled));
                let body = match &self.overrides.process {
                    Some(f) => f(path.clone(), Arc::clone(&cancelled)).await,
                    None => probes::probe_process(path.clone(), Arc::clone(&cancelled)).await,
                };
                self.inflight_process_cancel.lock().await.remove(&path);
                (path, body)
            }
        }
    }

    /// Cancel every in-flight background process-hash job (spec §4.D, §4.F).
    /// The job's own reply is dropped by `tick` once it observes the null
    /// sentinel (or, for overrides, whatever the override chooses to do with
    /// the shared cancellation flag).
    pub async fn cancel_inflight_process_jobs(&self) {
        for (_, flag) in self.inflight_process_cancel.lock().await.iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// `send` (spec §4.E "Transport dispatch").
    async fn send(&self) {
        let bodies = {
            let mut cache = self.cache.lock().await;
            cache.take_bodies_to_send()
        };
        if bodies.is_empty() {
            return;
        }

        if !self.controller.bulk_unsupported() {
            self.send_bulk(bodies).await;
        } else {
            self.send_per_id(bodies).await;
        }
    }

    async fn send_bulk(&self, bodies: Vec<(String, serde_json::Value)>) {
        let payload: Vec<serde_json::Value> = bodies
            .iter()
            .map(|(id, body)| tag_body(id, body))
            .collect();

        match self.controller.posture_response_bulk(payload).await {
            Ok(result) => {
                if !result.services.is_empty() {
                    let mut ids = self.refresh_service_ids.lock().await;
                    ids.extend(result.services.iter().map(|s| s.id.clone()));
                }
                self.refresh_requested.store(true, Ordering::SeqCst);
            }
            Err(err) if err.kind == crate::error::ErrorKind::NotFound => {
                // bulk_unsupported is already set by Controller; fall back now.
                self.send_per_id(bodies).await;
            }
            Err(_) => {
                let mut state = self.state.lock().await;
                state.must_send = true;
            }
        }
    }

    async fn send_per_id(&self, bodies: Vec<(String, serde_json::Value)>) {
        for (id, body) in bodies {
            let tagged = tag_body(&id, &body);
            let result = self.controller.posture_response(tagged).await;
            let mut cache = self.cache.lock().await;
            cache.mark_submission_result(&id, result.is_ok());
            drop(cache);
            if result.is_ok() {
                self.refresh_requested.store(true, Ordering::SeqCst);
            }
        }
    }
}

enum DispatchJob {
    Single(String),
    Process(String),
}

/// Attach `id`/`typeId` to a probe's type-specific body (spec §6).
fn tag_body(id: &str, body: &serde_json::Value) -> serde_json::Value {
    let type_id = match id {
        "OS" => "OS",
        "MAC" => "MAC",
        "DOMAIN" => "DOMAIN",
        "ENDPOINT_STATE" => "ENDPOINT_STATE",
        _ => "PROCESS",
    };
    let mut tagged = body.clone();
    if let serde_json::Value::Object(map) = &mut tagged {
        map.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        map.insert("typeId".to_string(), serde_json::Value::String(type_id.to_string()));
    }
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TlsConfig};
    use crate::controller::types::{PostureQuery, PostureQuerySet, SdkInfo};
    use wiremock::matchers::{method, path};
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

    fn os_only_service() -> Service {
        Service {
            id: "svc1".into(),
            name: "svc".into(),
            posture_queries: vec![PostureQuerySet {
                queries: vec![PostureQuery {
                    query_type: "OS".into(),
                    timeout: -1,
                    path: None,
                    process_paths: None,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn tick_with_no_session_dispatches_nothing() {
        let server = MockServer::start().await;
        let controller = Controller::new(&test_config(server.uri())).unwrap();
        let engine = PostureEngine::new(controller, ProbeOverrides::default());
        engine.set_services(vec![os_only_service()]).await;
        engine.tick(None, None).await;
        // no mocks registered; if a request had been sent wiremock would 404
        // and the test would still pass, so this only documents intent --
        // the real guarantee is exercised at the Controller level (spec §8 #3).
    }

    async fn authenticated_controller(server: &MockServer) -> Controller {
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {},
                "data": { "id": "s1", "token": "T" }
            })))
            .mount(server)
            .await;
        let controller = Controller::new(&test_config(server.uri())).unwrap();
        controller.login(vec!["all".to_string()]).await.unwrap();
        controller
    }

    #[tokio::test]
    async fn tick_sends_bulk_body_with_os_probe() {
        let server = MockServer::start().await;
        let controller = authenticated_controller(&server).await;
        Mock::given(method("POST"))
            .and(path("/posture-response-bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {},
                "data": { "services": [] }
            })))
            .mount(&server)
            .await;

        let engine = PostureEngine::new(controller, ProbeOverrides::default());
        engine.set_services(vec![os_only_service()]).await;
        engine.tick(Some("session-1"), Some("inst-1")).await;
    }

    #[tokio::test]
    async fn bulk_404_falls_back_to_per_id_and_stays_sticky() {
        let server = MockServer::start().await;
        let controller = authenticated_controller(&server).await;
        Mock::given(method("POST"))
            .and(path("/posture-response-bulk"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posture-response"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"meta": {}})))
            .mount(&server)
            .await;

        let engine = PostureEngine::new(controller.clone(), ProbeOverrides::default());
        engine.set_services(vec![os_only_service()]).await;

        engine.tick(Some("session-1"), None).await;
        assert!(controller.bulk_unsupported());

        engine.tick(Some("session-1"), None).await;
        assert!(controller.bulk_unsupported());
    }

    #[test]
    fn tag_body_inserts_id_and_type_id() {
        let tagged = tag_body("OS", &serde_json::json!({"type": "linux"}));
        assert_eq!(tagged["id"], "OS");
        assert_eq!(tagged["typeId"], "OS");
    }

    #[test]
    fn tag_body_on_process_path_uses_process_type_id() {
        let tagged = tag_body("/usr/bin/thing", &serde_json::json!({"path": "/usr/bin/thing"}));
        assert_eq!(tagged["typeId"], "PROCESS");
    }
}
