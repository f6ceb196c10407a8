//! Per-feed timers. Each (user, feed) pair gets its own loop: run the
//! pipeline, re-read the cadence, sleep, repeat. Ticks never overlap on
//! one feed; different feeds run fully independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::{get_or_create_settings, Settings};
use crate::pipeline::Pipeline;

/// Immediate acknowledgment for a manual run request; the run itself is
/// fulfilled asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunNowAck {
    /// A run was started.
    Started,
    /// A run for this feed is already in flight; the request coalesces
    /// into it.
    AlreadyRunning,
    /// No timer is registered for this (user, feed).
    NotScheduled,
}

struct FeedTimer {
    cancel: CancellationToken,
    /// Overlap guard shared between the timer loop and manual runs.
    guard: Arc<tokio::sync::Mutex<()>>,
    handle: JoinHandle<()>,
}

/// Registry of running feed timers, keyed by (user id, feed id).
pub struct Scheduler {
    pipeline: Pipeline,
    timers: Mutex<HashMap<(String, i64), FeedTimer>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Start the timer loop for one feed. A no-op if it is already
    /// running.
    pub fn start_feed(&self, user_id: &str, feed_id: i64) {
        let key = (user_id.to_string(), feed_id);
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if timers.contains_key(&key) {
            debug!(user_id, feed_id, "Feed timer already running");
            return;
        }

        let cancel = CancellationToken::new();
        let guard = Arc::new(tokio::sync::Mutex::new(()));
        let handle = tokio::spawn(timer_loop(
            self.pipeline.clone(),
            user_id.to_string(),
            feed_id,
            guard.clone(),
            cancel.clone(),
        ));

        info!(user_id, feed_id, "Feed timer started");
        timers.insert(
            key,
            FeedTimer {
                cancel,
                guard,
                handle,
            },
        );
    }

    /// Stop one feed's timer. An in-flight run is not interrupted; only
    /// the inter-tick sleep is cancelled.
    pub fn stop_feed(&self, user_id: &str, feed_id: i64) {
        let key = (user_id.to_string(), feed_id);
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(timer) = timers.remove(&key) {
            timer.cancel.cancel();
            info!(user_id, feed_id, "Feed timer stopped");
        }
    }

    /// Trigger an immediate run for one feed, outside its cadence.
    ///
    /// Returns right away; if a run is already in flight the request
    /// coalesces into it instead of queueing a second run.
    pub fn run_now(&self, user_id: &str, feed_id: i64) -> RunNowAck {
        let key = (user_id.to_string(), feed_id);
        let guard = {
            let timers = match self.timers.lock() {
                Ok(timers) => timers,
                Err(poisoned) => poisoned.into_inner(),
            };
            match timers.get(&key) {
                Some(timer) => timer.guard.clone(),
                None => return RunNowAck::NotScheduled,
            }
        };

        let Ok(permit) = guard.try_lock_owned() else {
            debug!(user_id, feed_id, "Run already in flight, coalescing");
            return RunNowAck::AlreadyRunning;
        };

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = pipeline.run_feed(feed_id).await {
                warn!(feed_id, "Manual feed run failed: {e:#}");
            }
        });

        RunNowAck::Started
    }

    /// Stop every timer and wait for in-flight runs to finish, so their
    /// writes persist before shutdown.
    pub async fn stop_all(&self) {
        let timers: Vec<(String, i64, FeedTimer)> = {
            let mut map = match self.timers.lock() {
                Ok(timers) => timers,
                Err(poisoned) => poisoned.into_inner(),
            };
            map.drain()
                .map(|((user_id, feed_id), timer)| (user_id, feed_id, timer))
                .collect()
        };

        for (_, _, timer) in &timers {
            timer.cancel.cancel();
        }
        for (user_id, feed_id, timer) in timers {
            if let Err(e) = timer.handle.await {
                warn!(user_id, feed_id, "Feed timer task panicked: {e}");
            }
        }
        info!("All feed timers stopped");
    }

    /// Number of registered timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        match self.timers.lock() {
            Ok(timers) => timers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// One feed's timer loop: run, re-read cadence, sleep, repeat. The
/// cadence is re-read every tick so settings changes take effect on the
/// next tick without a restart.
async fn timer_loop(
    pipeline: Pipeline,
    user_id: String,
    feed_id: i64,
    guard: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
) {
    loop {
        {
            let _permit = guard.lock().await;
            if let Err(e) = pipeline.run_feed(feed_id).await {
                warn!(feed_id, "Feed run failed: {e:#}");
            }
        }

        let period = match get_or_create_settings(pipeline.db().pool(), &user_id).await {
            Ok(settings) => settings.effective_frequency(),
            Err(e) => {
                warn!(feed_id, "Failed to read settings for cadence: {e:#}");
                std::time::Duration::from_secs(
                    u64::try_from(Settings::MIN_POST_FREQUENCY_MINUTES).unwrap_or(15) * 60,
                )
            }
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }
    }
    debug!(user_id = %user_id, feed_id, "Feed timer loop exited");
}
