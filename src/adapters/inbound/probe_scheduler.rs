//! Probe Scheduler
//!
//! Periodic driver for the selector service. The core itself never
//! decides when to re-probe; this adapter is the scheduler that
//! calls into it.

use crate::application::SelectorService;
use crate::domain::ports::ProfileStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Drives a full selection run on a fixed interval.
pub struct ProbeScheduler {
    service: Arc<SelectorService>,
    profiles: Arc<dyn ProfileStore>,
    interval: Duration,
}

impl ProbeScheduler {
    /// Create a new scheduler.
    pub fn new(
        service: Arc<SelectorService>,
        profiles: Arc<dyn ProfileStore>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            profiles,
            interval,
        }
    }

    /// Start the selection loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;

                let candidates = self.profiles.candidate_ids();
                if candidates.is_empty() {
                    tracing::debug!("no candidates to probe");
                    continue;
                }

                match self.service.auto_select_best_proxy(&candidates).await {
                    Some(id) => tracing::info!("selection run promoted {}", id),
                    None => tracing::warn!(
                        "selection run over {} candidates produced no winner",
                        candidates.len()
                    ),
                }
            }
        })
    }
}
