//! Posture engine (spec §4.D, §4.E, §4.F)
//!
//! - `probes` -- OS/MAC/domain/process probe implementations and the
//!   consumer-override hooks.
//! - `cache` -- the per-probe-id cache and its dedup/sticky-retry bookkeeping.
//! - `engine` -- [`engine::PostureEngine`], the tick algorithm tying the
//!   above together with the controller client.

pub mod cache;
pub mod engine;
pub mod probes;

pub use cache::PostureCache;
pub use engine::PostureEngine;
pub use probes::ProbeOverrides;
