//! Periodic reclamation of idle sessions.

use crate::metrics::{
    ACTIVE_UPLOAD_SESSIONS, STREAM_SESSIONS_EVICTED, SWEEP_DURATION, UPLOAD_SESSIONS_EVICTED,
};
use crate::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub uploads_evicted: usize,
    pub streams_evicted: usize,
    /// Idle-looking sessions whose lock was held by a live request.
    pub skipped_busy: usize,
}

/// Evicts upload sessions idle past the timeout and stream sessions that are
/// both idle and unwatched.
pub struct Reclaimer {
    registry: Arc<SessionRegistry>,
    interval: Duration,
    idle_timeout: Duration,
}

impl Reclaimer {
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            registry,
            interval,
            idle_timeout,
        }
    }

    /// Run one pass over both tables as of `now`.
    ///
    /// Never waits on a session lock: a session in use by a request is not
    /// idle and is left for a later pass. Close failures are logged and
    /// otherwise ignored.
    pub async fn sweep(&self, now: Instant) -> SweepStats {
        let started = std::time::Instant::now();
        let mut stats = SweepStats::default();

        for (id, session) in self.registry.uploads.snapshot() {
            if session.idle_for(now) <= self.idle_timeout {
                continue;
            }

            let Ok(mut io) = session.io.try_lock() else {
                stats.skipped_busy += 1;
                continue;
            };

            // Progress only moves under `io`, so this re-check is stable
            if io.retired || session.idle_for(now) <= self.idle_timeout {
                continue;
            }

            // Leave the registry before releasing the lock so waiters retry
            // against a fresh session
            io.retired = true;
            let removed = self.registry.uploads.remove_if_same(&id, &session);
            if let Some(handle) = io.handle.take()
                && let Err(e) = handle.close().await
            {
                tracing::warn!(id = %id, error = %e, "Ignoring close failure for evicted upload");
            }
            drop(io);

            if removed {
                stats.uploads_evicted += 1;
                UPLOAD_SESSIONS_EVICTED.inc();
                ACTIVE_UPLOAD_SESSIONS.dec();
                tracing::info!(
                    id = %id,
                    written = session.progress().written,
                    declared_size = session.declared_size(),
                    "Evicted idle upload session"
                );
            }
        }

        for (id, session) in self.registry.streams.snapshot() {
            let Some(mut state) = session.state.try_lock() else {
                stats.skipped_busy += 1;
                continue;
            };

            let idle = now.saturating_duration_since(state.last_accessed);
            if state.retired || state.viewers > 0 || idle <= self.idle_timeout {
                continue;
            }

            state.retired = true;
            let removed = self.registry.streams.remove_if_same(&id, &session);
            drop(state);

            if removed {
                stats.streams_evicted += 1;
                STREAM_SESSIONS_EVICTED.inc();
                tracing::info!(id = %id, idle_secs = idle.as_secs(), "Evicted idle stream session");
            }
        }

        SWEEP_DURATION.observe(started.elapsed().as_secs_f64());
        stats
    }

    /// Run [`sweep`](Self::sweep) every interval until `shutdown` is cancelled.
    ///
    /// The first sweep happens one full interval after the call.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Reclaimer stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let stats = self.sweep(Instant::now()).await;
                        if stats != SweepStats::default() {
                            tracing::info!(
                                uploads_evicted = stats.uploads_evicted,
                                streams_evicted = stats.streams_evicted,
                                skipped_busy = stats.skipped_busy,
                                "Reclamation sweep finished"
                            );
                        } else {
                            tracing::debug!("Reclamation sweep found nothing to evict");
                        }
                    }
                }
            }
        })
    }
}
