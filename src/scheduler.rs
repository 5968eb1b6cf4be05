//! Scheduler / timer glue (spec §4.F)
//!
//! Single periodic timer driving one posture tick; cancellation unwinds both
//! the timer and any in-flight process-hash worker (spec §5). Grounded on
//! the teacher's `start_read_loop` (`mcp/client.rs`): a `tokio::spawn`ed loop
//! selecting between a `CancellationToken` and the next scheduled event.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::posture::PostureEngine;

/// Owns the posture loop's cancellation and lifetime. One per endpoint
/// context, matching spec §4.F "single periodic timer per endpoint context".
pub struct Scheduler {
    cancellation: CancellationToken,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
        }
    }

    /// A token that cancels along with this scheduler; pass to anything that
    /// should unwind alongside the timer.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Stop the timer and any in-flight work it spawned.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Spawn the recurring posture tick (spec §4.E "Trigger": a recurring
    /// timer, first fire ~1ms after start). `current_identity` is polled on
    /// every tick for the API-session id and controller-instance id the
    /// engine needs to decide `must_send`.
    pub fn spawn_posture_loop<F>(
        &self,
        engine: Arc<PostureEngine>,
        period: Duration,
        current_identity: F,
    ) -> JoinHandle<()>
    where
        F: Fn() -> (Option<String>, Option<String>) + Send + 'static,
    {
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            // tokio::time::interval's first tick resolves immediately,
            // matching the "first fire ~1ms after start" requirement closely
            // enough without a dedicated reset.
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;

                    _ = cancellation.cancelled() => {
                        engine.cancel_inflight_process_jobs().await;
                        break;
                    }

                    _ = ticker.tick() => {
                        let (session_id, instance_id) = current_identity();
                        engine.tick(session_id.as_deref(), instance_id.as_deref()).await;
                    }
                }
            }
        })
    }
}
