//! Liveness reaper — ends sessions whose clients stopped sending heartbeats.
//!
//! Every instance runs its own reaper; there is no leader. Two instances
//! reaping the same session race harmlessly because `reap_if_stale` only
//! reports a transition to one of them, and only that one announces the
//! leave. The same conditional update spares a session that heartbeated
//! after the staleness query listed it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use schemasync_core::config::PresenceConfig;
use schemasync_core::result::AppResult;
use schemasync_core::traits::{PresenceNotifier, SessionStore};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sessions returned by the staleness query
    pub stale_found: usize,
    /// Sessions this sweep transitioned to inactive
    pub reaped: usize,
    /// Sessions that were no longer stale at transition time: ended
    /// elsewhere, or revived by a heartbeat after the listing
    pub skipped: usize,
    /// Sessions whose transition failed; retried next tick
    pub failed: usize,
}

/// Periodic sweep over stale sessions.
#[derive(Debug)]
pub struct LivenessReaper {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn PresenceNotifier>,
    threshold: Duration,
    interval: Duration,
}

impl LivenessReaper {
    /// Create a reaper using the presence timing configuration
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn PresenceNotifier>,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            threshold: config.heartbeat_timeout(),
            interval: config.sweep_interval(),
        }
    }

    /// Run a single sweep.
    ///
    /// Fails only when the stale sessions cannot be listed. Per-session
    /// failures are counted in the report and left for the next tick.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let stale = self.store.list_stale(self.threshold).await?;
        let mut report = SweepReport {
            stale_found: stale.len(),
            ..SweepReport::default()
        };

        for session in &stale {
            match self.store.reap_if_stale(session.id, self.threshold).await {
                Ok(true) => {
                    tracing::debug!(
                        "Reaped session {} (project={}, last_ping_at={})",
                        session.id,
                        session.project_id,
                        session.last_ping_at
                    );
                    self.notifier.session_reaped(session).await;
                    report.reaped += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) if e.is_benign() => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to reap session {}: {}", session.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.stale_found > 0 {
            tracing::info!(
                "Liveness sweep: stale={}, reaped={}, skipped={}, failed={}",
                report.stale_found,
                report.reaped,
                report.skipped,
                report.failed
            );
        }

        Ok(report)
    }

    /// Sweep on every tick until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Liveness reaper started: threshold={}s, interval={}s",
            self.threshold.as_secs(),
            self.interval.as_secs()
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Liveness reaper received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!("Liveness sweep failed, retrying next tick: {}", e);
                    }
                }
            }
        }

        tracing::info!("Liveness reaper stopped");
    }

    /// Run the reaper on its own task
    pub fn spawn(self: Arc<Self>, cancel: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use schemasync_core::error::AppError;
    use schemasync_core::model::Session;
    use schemasync_core::types::clock::ManualClock;
    use schemasync_core::types::Clock;
    use schemasync_core::types::id::{ProjectId, SessionId, UserId};
    use schemasync_database::memory::MemorySessionStore;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        reaped: Mutex<Vec<SessionId>>,
    }

    impl RecordingNotifier {
        fn reaped(&self) -> Vec<SessionId> {
            self.reaped.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PresenceNotifier for RecordingNotifier {
        async fn session_reaped(&self, session: &Session) {
            self.reaped.lock().unwrap().push(session.id);
        }
    }

    /// Store whose staleness query always fails.
    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn create(&self, _: ProjectId, _: UserId, _: &str) -> AppResult<Session> {
            Err(AppError::database("down"))
        }
        async fn find_by_id(&self, _: SessionId) -> AppResult<Option<Session>> {
            Err(AppError::database("down"))
        }
        async fn update_cursor(&self, _: SessionId, _: f64, _: f64) -> AppResult<()> {
            Err(AppError::database("down"))
        }
        async fn heartbeat(&self, _: SessionId) -> AppResult<()> {
            Err(AppError::database("down"))
        }
        async fn set_inactive(&self, _: SessionId) -> AppResult<bool> {
            Err(AppError::database("down"))
        }
        async fn reap_if_stale(&self, _: SessionId, _: Duration) -> AppResult<bool> {
            Err(AppError::database("down"))
        }
        async fn list_active_by_project(&self, _: ProjectId) -> AppResult<Vec<Session>> {
            Err(AppError::database("down"))
        }
        async fn list_stale(&self, _: Duration) -> AppResult<Vec<Session>> {
            Err(AppError::database("down"))
        }
    }

    /// Store whose clients all heartbeat right after the staleness query.
    #[derive(Debug)]
    struct LateHeartbeatStore {
        inner: Arc<MemorySessionStore>,
    }

    #[async_trait]
    impl SessionStore for LateHeartbeatStore {
        async fn create(&self, p: ProjectId, u: UserId, c: &str) -> AppResult<Session> {
            self.inner.create(p, u, c).await
        }
        async fn find_by_id(&self, id: SessionId) -> AppResult<Option<Session>> {
            self.inner.find_by_id(id).await
        }
        async fn update_cursor(&self, id: SessionId, x: f64, y: f64) -> AppResult<()> {
            self.inner.update_cursor(id, x, y).await
        }
        async fn heartbeat(&self, id: SessionId) -> AppResult<()> {
            self.inner.heartbeat(id).await
        }
        async fn set_inactive(&self, id: SessionId) -> AppResult<bool> {
            self.inner.set_inactive(id).await
        }
        async fn reap_if_stale(&self, id: SessionId, threshold: Duration) -> AppResult<bool> {
            self.inner.reap_if_stale(id, threshold).await
        }
        async fn list_active_by_project(&self, p: ProjectId) -> AppResult<Vec<Session>> {
            self.inner.list_active_by_project(p).await
        }
        async fn list_stale(&self, threshold: Duration) -> AppResult<Vec<Session>> {
            let stale = self.inner.list_stale(threshold).await?;
            for session in &stale {
                self.inner.heartbeat(session.id).await?;
            }
            Ok(stale)
        }
    }

    fn setup() -> (Arc<MemorySessionStore>, Arc<ManualClock>, Arc<RecordingNotifier>, LivenessReaper) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemorySessionStore::with_clock(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let reaper = LivenessReaper::new(store.clone(), notifier.clone(), &PresenceConfig::default());
        (store, clock, notifier, reaper)
    }

    #[tokio::test]
    async fn test_sweep_reaps_only_stale_sessions() {
        let (store, clock, notifier, reaper) = setup();
        let project = ProjectId::new();
        let silent = store.create(project, UserId::new(), "red").await.unwrap();
        let alive = store.create(project, UserId::new(), "blue").await.unwrap();

        clock.advance(ChronoDuration::seconds(20));
        store.heartbeat(alive.id).await.unwrap();
        clock.advance(ChronoDuration::seconds(15));

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.stale_found, 1);
        assert_eq!(report.reaped, 1);
        assert_eq!(notifier.reaped(), vec![silent.id]);

        let active: Vec<SessionId> = store
            .list_active_by_project(project)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec![alive.id]);
    }

    #[tokio::test]
    async fn test_heartbeat_after_listing_keeps_session_alive() {
        let clock = Arc::new(ManualClock::new());
        let inner = Arc::new(MemorySessionStore::with_clock(clock.clone()));
        let store = Arc::new(LateHeartbeatStore { inner: inner.clone() });
        let notifier = Arc::new(RecordingNotifier::default());
        let reaper = LivenessReaper::new(store, notifier.clone(), &PresenceConfig::default());

        let session = inner.create(ProjectId::new(), UserId::new(), "red").await.unwrap();
        clock.advance(ChronoDuration::seconds(31));

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.stale_found, 1);
        assert_eq!(report.reaped, 0);
        assert_eq!(report.skipped, 1);
        assert!(notifier.reaped().is_empty());

        let stored = inner.find_by_id(session.id).await.unwrap().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.last_ping_at, clock.now());
    }

    #[tokio::test]
    async fn test_second_sweep_finds_nothing() {
        let (store, clock, notifier, reaper) = setup();
        store.create(ProjectId::new(), UserId::new(), "red").await.unwrap();
        clock.advance(ChronoDuration::seconds(31));

        assert_eq!(reaper.sweep().await.unwrap().reaped, 1);
        assert_eq!(reaper.sweep().await.unwrap(), SweepReport::default());
        assert_eq!(notifier.reaped().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reapers_announce_once() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemorySessionStore::with_clock(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = PresenceConfig::default();
        let first = LivenessReaper::new(store.clone(), notifier.clone(), &config);
        let second = LivenessReaper::new(store.clone(), notifier.clone(), &config);

        for _ in 0..5 {
            store.create(ProjectId::new(), UserId::new(), "red").await.unwrap();
        }
        clock.advance(ChronoDuration::seconds(60));

        let (a, b) = tokio::join!(first.sweep(), second.sweep());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.reaped + b.reaped, 5);
        assert_eq!(notifier.reaped().len(), 5);
    }

    #[tokio::test]
    async fn test_sweep_surfaces_listing_failure() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reaper = LivenessReaper::new(Arc::new(BrokenStore), notifier, &PresenceConfig::default());
        assert!(reaper.sweep().await.unwrap_err().is_storage());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_failures_and_stops_on_cancel() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reaper = Arc::new(LivenessReaper::new(
            Arc::new(BrokenStore),
            notifier,
            &PresenceConfig::default(),
        ));
        let (tx, rx) = watch::channel(false);
        let handle = reaper.spawn(rx);

        time::sleep(Duration::from_secs(35)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
