//! Edge client core for a zero-trust overlay network SDK.
//!
//! [`EdgeClient`] ties together three pieces, each its own module:
//!
//! - [`controller`] -- the controller HTTP client: session lifecycle,
//!   pagination, rebinding, envelope/error taxonomy.
//! - [`posture`] -- host-fact probing (OS/MAC/domain/process) and the
//!   per-tick dedup/dispatch algorithm that decides what to submit.
//! - [`scheduler`] -- the periodic timer that drives posture ticks.

pub mod config;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod posture;
pub mod scheduler;

pub use config::Config;
pub use controller::Controller;
pub use error::{ControllerError, ErrorKind, Result};
pub use posture::{PostureCache, PostureEngine, ProbeOverrides};
pub use scheduler::Scheduler;

use std::sync::Arc;
use std::time::Duration;

use controller::types::Service;

/// The assembled edge client: a [`Controller`], a [`PostureEngine`] sitting
/// on top of it, and the [`Scheduler`] driving the engine's tick loop.
///
/// Consumers build one per endpoint context (spec §4.F), call [`Self::start`]
/// once a session exists, and poll [`Self::drain_service_refresh`] after each
/// tick to learn which services the posture engine wants refreshed.
pub struct EdgeClient {
    controller: Controller,
    engine: Arc<PostureEngine>,
    scheduler: Scheduler,
    posture_interval: Duration,
}

impl EdgeClient {
    /// Build a client from `config`. Does not perform any network I/O; call
    /// [`Controller::login`] (via [`Self::controller`]) before [`Self::start`].
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_overrides(config, ProbeOverrides::default())
    }

    /// Like [`Self::new`], but with posture probe overrides installed (used
    /// by tests and embedders that supply their own host-fact sources).
    pub fn with_overrides(config: &Config, overrides: ProbeOverrides) -> Result<Self> {
        let controller = Controller::new(config)?;
        let engine = Arc::new(PostureEngine::new(controller.clone(), overrides));
        Ok(Self {
            controller,
            engine,
            scheduler: Scheduler::new(),
            posture_interval: Duration::from_secs(config.posture_interval_secs),
        })
    }

    /// The underlying controller client, for operations [`EdgeClient`]
    /// doesn't wrap directly (login, service listing, enrollment, ...).
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// The posture engine driving this client's ticks.
    pub fn posture_engine(&self) -> &Arc<PostureEngine> {
        &self.engine
    }

    /// Install the service catalog the posture engine derives its required
    /// probe set from (spec §4.E). Call again after [`Self::drain_service_refresh`]
    /// reports a refresh is needed.
    pub async fn set_services(&self, services: Vec<Service>) {
        self.engine.set_services(services).await;
    }

    /// Start the recurring posture tick (spec §4.E, §4.F). Only one loop
    /// should run per [`EdgeClient`]; calling this twice leaks the first
    /// loop's task, which is only ever stopped by [`Self::stop`].
    pub fn start(&self) {
        let engine = Arc::clone(&self.engine);
        let controller = self.controller.clone();
        self.scheduler.spawn_posture_loop(engine, self.posture_interval, move || {
            (controller.current_api_session_id(), controller.instance_id())
        });
    }

    /// Stop the posture tick loop and cancel any in-flight process probe.
    pub fn stop(&self) {
        self.scheduler.cancel();
    }

    /// Drain the posture engine's pending service-refresh signal (spec
    /// §4.E bulk-success path: "force-refresh that service in the upstream
    /// service catalog, then request a general service refresh"). Returns
    /// the ids needing a targeted refresh and whether a general refresh was
    /// also requested; the caller re-fetches [`Controller::services`] and
    /// feeds the result back through [`Self::set_services`].
    pub async fn drain_service_refresh(&self) -> (Vec<String>, bool) {
        self.engine.take_refresh_signal().await
    }
}
