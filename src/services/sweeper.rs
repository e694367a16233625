//! Periodic completion sweep
//!
//! Marks booking records of events that have already ended as completed.
//! It only touches elapsed events, so it can run alongside bookings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::database::EventStore;
use crate::utils::errors::Result;
use crate::utils::helpers::now_micros;
use crate::utils::logging::log_completion_sweep;

/// Run one sweep with `now` as the cutoff
pub async fn sweep_completed(store: &dyn EventStore, now: DateTime<Utc>) -> Result<u64> {
    let started = Instant::now();
    let marked = store.mark_completed(now).await?;
    log_completion_sweep(marked, started.elapsed().as_millis() as u64);
    Ok(marked)
}

/// Background task running [`sweep_completed`] on a fixed interval
pub struct CompletionSweeper {
    store: Arc<dyn EventStore>,
    interval: Duration,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl CompletionSweeper {
    pub fn new(store: Arc<dyn EventStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("Completion sweeper is already running");
            return;
        }

        let store = Arc::clone(&self.store);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if let Err(e) = sweep_completed(store.as_ref(), now_micros()).await {
                    error!("Completion sweep failed: {}", e);
                }
            }
        });

        self.handle = Some(handle);
        info!("Started completion sweeper with interval {:?}", self.interval);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Stopped completion sweeper");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for CompletionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
