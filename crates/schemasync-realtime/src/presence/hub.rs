//! Per-instance presence fan-out.
//!
//! The hub owns this instance's locally-connected clients, grouped by
//! project, together with the last-known presence view of each watched
//! project. Events announced here are stamped with the instance id,
//! delivered to local clients right away, and queued for the bus. Events
//! coming back from the bus with this instance's stamp are skipped, so
//! local delivery never depends on the bus and never happens twice.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use schemasync_core::config::PresenceConfig;
use schemasync_core::error::AppError;
use schemasync_core::events::{PresenceEvent, PresenceEventKind};
use schemasync_core::model::Session;
use schemasync_core::result::AppResult;
use schemasync_core::traits::{PresenceNotifier, ProjectAccess, SessionStore};
use schemasync_core::types::color::assign_color;
use schemasync_core::types::id::{InstanceId, ProjectId, SessionId, UserId};

use super::snapshot::{DEFAULT_DEPARTED_RETENTION, ProjectSnapshot, SessionPresence};
use super::throttle::{Admission, CursorThrottle};
use crate::bridge::{BusMode, PresenceBus, PresenceStream, PublishQueue};
use crate::connection::sink::{ClientFeed, ClientSink, PushOutcome};
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::metrics::PresenceMetrics;

/// Capacity of the queue between the hub and the bus.
const PUBLISH_QUEUE_CAPACITY: usize = 1_024;

/// Pause before resubscribing after a project stream ends.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Local state for one watched project.
#[derive(Debug)]
struct ProjectState {
    sinks: HashMap<SessionId, Arc<ClientSink>>,
    snapshot: ProjectSnapshot,
    consumer: Option<JoinHandle<()>>,
}

impl ProjectState {
    fn new(departed_retention: chrono::Duration) -> Self {
        Self {
            sinks: HashMap::new(),
            snapshot: ProjectSnapshot::with_retention(departed_retention),
            consumer: None,
        }
    }
}

/// Presence hub for one application instance.
#[derive(Debug)]
pub struct LocalPresenceHub {
    /// Handle for tasks spawned from `&self` methods
    me: Weak<Self>,
    instance_id: InstanceId,
    store: Arc<dyn SessionStore>,
    bus: Arc<dyn PresenceBus>,
    access: Arc<dyn ProjectAccess>,
    config: PresenceConfig,
    /// Session → local sink
    locals: DashMap<SessionId, Arc<ClientSink>>,
    /// Project → sinks, snapshot, and bus consumer
    projects: DashMap<ProjectId, ProjectState>,
    throttle: CursorThrottle,
    metrics: Arc<PresenceMetrics>,
    outbox: PublishQueue,
    /// How long a departed session id stays blocked in project views
    departed_retention: chrono::Duration,
}

impl LocalPresenceHub {
    /// Create a hub. Must be called inside a Tokio runtime.
    pub fn new(
        store: Arc<dyn SessionStore>,
        bus: Arc<dyn PresenceBus>,
        access: Arc<dyn ProjectAccess>,
        config: PresenceConfig,
    ) -> Arc<Self> {
        let metrics = Arc::new(PresenceMetrics::new());
        let outbox = PublishQueue::start(bus.clone(), PUBLISH_QUEUE_CAPACITY, metrics.clone());
        let instance_id = InstanceId::new();

        info!(%instance_id, bus = %bus.mode(), "Presence hub started");

        let departed_retention = chrono::Duration::from_std(config.heartbeat_timeout())
            .unwrap_or(DEFAULT_DEPARTED_RETENTION);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            instance_id,
            store,
            bus,
            access,
            throttle: CursorThrottle::new(config.cursor_max_per_second),
            config,
            locals: DashMap::new(),
            projects: DashMap::new(),
            metrics,
            outbox,
            departed_retention,
        })
    }

    /// Id stamped on every event this instance publishes
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Bus transport in use
    pub fn bus_mode(&self) -> BusMode {
        self.bus.mode()
    }

    /// Presence counters
    pub fn metrics(&self) -> &Arc<PresenceMetrics> {
        &self.metrics
    }

    /// Create a session for a user with access to the project and announce it.
    pub async fn join(&self, project_id: ProjectId, user_id: UserId) -> AppResult<Session> {
        if !self.access.authorize(user_id, project_id).await? {
            warn!(%user_id, %project_id, "Presence join denied");
            return Err(AppError::authorization(format!(
                "User {user_id} has no access to project {project_id}"
            )));
        }

        let session = self
            .store
            .create(project_id, user_id, assign_color(user_id))
            .await?;
        self.metrics.inc_joined();
        info!(
            session_id = %session.id,
            %project_id,
            %user_id,
            color = %session.color,
            "Session joined"
        );

        self.announce(PresenceEvent::join(&session));
        Ok(session)
    }

    /// Attach a local client to an active session.
    ///
    /// The returned feed starts with a snapshot of every active session in
    /// the project, followed by deltas.
    pub async fn register_local_client(
        self: &Arc<Self>,
        project_id: ProjectId,
        session_id: SessionId,
    ) -> AppResult<ClientFeed> {
        let session = self
            .store
            .find_by_id(session_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::session_not_found(format!("Session {session_id} is not active")))?;
        if session.project_id != project_id {
            return Err(AppError::validation(format!(
                "Session {session_id} does not belong to project {project_id}"
            )));
        }

        let (sink, feed) = ClientSink::channel(
            project_id,
            session_id,
            session.user_id,
            self.config.client_queue_capacity,
        );
        match self.locals.entry(session_id) {
            Entry::Occupied(_) => {
                return Err(AppError::validation(format!(
                    "Session {session_id} already has a local client"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(sink.clone());
            }
        }

        // Subscribe before reading the store so no delta falls in between.
        let needs_consumer = self
            .projects
            .get(&project_id)
            .is_none_or(|state| state.consumer.is_none());
        let mut stream = if needs_consumer {
            Some(self.bus.subscribe(project_id).await)
        } else {
            None
        };

        let missing_consumer = {
            let mut state = self
                .projects
                .entry(project_id)
                .or_insert_with(|| ProjectState::new(self.departed_retention));
            state.sinks.insert(session_id, sink.clone());
            match (state.consumer.is_none(), stream.take()) {
                (true, Some(stream)) => {
                    state.consumer = Some(self.spawn_consumer(project_id, stream));
                    false
                }
                (missing, _) => missing,
            }
        };
        if missing_consumer {
            self.ensure_consumer(project_id).await;
        }

        let sessions = match self.store.list_active_by_project(project_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                self.release(session_id).await;
                return Err(e);
            }
        };
        if let Some(mut state) = self.projects.get_mut(&project_id) {
            state.snapshot.seed(&sessions);
        }

        let collaborators = sessions.len();
        sink.prime(OutboundMessage::Snapshot {
            project_id,
            sessions,
        });

        info!(%session_id, %project_id, collaborators, "Local client registered");
        Ok(feed)
    }

    /// Route a client frame to the matching presence operation.
    pub async fn handle_client_message(
        &self,
        session_id: SessionId,
        msg: InboundMessage,
    ) -> AppResult<()> {
        match msg {
            InboundMessage::Cursor { x, y } => self.cursor(session_id, x, y).await,
            InboundMessage::Heartbeat => self.heartbeat(session_id).await,
            InboundMessage::Leave => self.unregister(session_id).await,
        }
    }

    /// Record a cursor move and announce it, subject to the rate cap.
    ///
    /// A move held back by the cap is not lost: the newest held position is
    /// announced when the session's window closes.
    pub async fn cursor(&self, session_id: SessionId, x: f64, y: f64) -> AppResult<()> {
        if !x.is_finite() || !y.is_finite() {
            return Err(AppError::validation("Cursor coordinates must be finite"));
        }

        match self.store.update_cursor(session_id, x, y).await {
            Ok(()) => {}
            Err(e) if e.is_benign() => {
                debug!(%session_id, "Cursor update for departed session ignored");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if let Admission::Deferred { flush_at } = self.throttle.admit(session_id, x, y) {
            self.metrics.inc_throttled();
            if let Some(flush_at) = flush_at {
                self.schedule_cursor_flush(session_id, flush_at);
            }
            return Ok(());
        }

        let Some((project_id, user_id)) = self.identity(session_id).await? else {
            return Ok(());
        };
        self.announce(PresenceEvent::new(
            project_id,
            session_id,
            user_id,
            PresenceEventKind::Cursor { x, y },
        ));
        Ok(())
    }

    /// Keep a session alive.
    pub async fn heartbeat(&self, session_id: SessionId) -> AppResult<()> {
        match self.store.heartbeat(session_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_benign() => {
                debug!(%session_id, "Heartbeat for departed session ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Detach a local client and end its session.
    ///
    /// Delivery to the client stops before anything else happens. The leave
    /// event is only announced by the call that actually ended the session.
    pub async fn unregister(&self, session_id: SessionId) -> AppResult<()> {
        let detached = self.release(session_id).await;
        self.throttle.forget(session_id);

        match self.store.set_inactive(session_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%session_id, "Session already inactive, no leave announced");
                return Ok(());
            }
            Err(e) if e.is_benign() => {
                debug!(%session_id, "Unregister for unknown session ignored");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let identity = match detached {
            Some(sink) => Some((sink.project_id, sink.user_id)),
            None => self.identity(session_id).await?,
        };
        if let Some((project_id, user_id)) = identity {
            self.metrics.inc_left();
            info!(%session_id, %project_id, "Session left");
            self.announce(PresenceEvent::new(
                project_id,
                session_id,
                user_id,
                PresenceEventKind::Leave,
            ));
        }
        Ok(())
    }

    /// Apply an event received from the bus.
    pub fn handle_inbound_event(&self, event: PresenceEvent) {
        if event.origin == Some(self.instance_id) {
            self.metrics.inc_self_echo();
            return;
        }

        self.deliver(&event);

        // Another instance ended a session that still has a client here.
        if event.is_leave() && self.detach_sink(event.session_id).is_some() {
            self.throttle.forget(event.session_id);
            debug!(session_id = %event.session_id, "Closed local client of departed session");
        }
    }

    /// This instance's current view of a project.
    pub fn local_snapshot(&self, project_id: ProjectId) -> Vec<SessionPresence> {
        self.projects
            .get(&project_id)
            .map(|state| state.snapshot.sessions())
            .unwrap_or_default()
    }

    /// Active sessions of a project according to the store.
    pub async fn active_sessions(&self, project_id: ProjectId) -> AppResult<Vec<Session>> {
        self.store.list_active_by_project(project_id).await
    }

    /// Number of locally-connected clients
    pub fn local_client_count(&self) -> usize {
        self.locals.len()
    }

    /// Number of projects with at least one local client
    pub fn watched_project_count(&self) -> usize {
        self.projects.len()
    }

    /// Close every local client and stop all consumers.
    pub fn shutdown(&self) {
        for entry in self.locals.iter() {
            entry.value().close();
        }
        self.locals.clear();

        for mut entry in self.projects.iter_mut() {
            if let Some(consumer) = entry.consumer.take() {
                consumer.abort();
            }
        }
        self.projects.clear();
        self.outbox.close();
        info!(instance_id = %self.instance_id, "Presence hub stopped");
    }

    fn schedule_cursor_flush(&self, session_id: SessionId, flush_at: Instant) {
        let hub = self.me.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(flush_at).await;
            if let Some(hub) = hub.upgrade() {
                hub.flush_cursor(session_id).await;
            }
        });
    }

    /// Announce the position held back for a session, if it is still around.
    async fn flush_cursor(&self, session_id: SessionId) {
        let Some((x, y)) = self.throttle.take_pending(session_id) else {
            return;
        };
        let session = match self.store.find_by_id(session_id).await {
            Ok(Some(session)) if session.is_active => session,
            Ok(_) => return,
            Err(e) => {
                warn!(%session_id, error = %e, "Dropped held cursor position");
                return;
            }
        };
        self.announce(PresenceEvent::cursor(&session, x, y));
    }

    /// Re-read a project from the store and send every local client a fresh
    /// snapshot. Runs after the bus subscription was re-established, since
    /// deltas published during the gap never reached this instance.
    async fn resync_project(&self, project_id: ProjectId) {
        let sessions = match self.store.list_active_by_project(project_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(%project_id, error = %e, "Presence resync failed");
                return;
            }
        };

        let targets: Vec<Arc<ClientSink>> = {
            let Some(mut state) = self.projects.get_mut(&project_id) else {
                return;
            };
            state.snapshot.reset(&sessions);
            state.sinks.values().cloned().collect()
        };

        for sink in &targets {
            sink.push(OutboundMessage::Snapshot {
                project_id,
                sessions: sessions.clone(),
            });
        }
        info!(%project_id, clients = targets.len(), collaborators = sessions.len(), "Presence resynced");
    }

    /// Stamp, deliver locally, and queue for the bus.
    fn announce(&self, event: PresenceEvent) {
        let event = event.with_origin(self.instance_id);
        self.deliver(&event);
        self.outbox.enqueue(event);
    }

    /// Update the project view and push to every local client except the
    /// one the event is about.
    fn deliver(&self, event: &PresenceEvent) {
        let targets: Vec<Arc<ClientSink>> = {
            let Some(mut state) = self.projects.get_mut(&event.project_id) else {
                return;
            };
            if !state.snapshot.apply(event) {
                return;
            }
            state
                .sinks
                .iter()
                .filter_map(|(session_id, sink)| {
                    if *session_id == event.session_id {
                        self.metrics.inc_echo_suppressed();
                        None
                    } else {
                        Some(sink.clone())
                    }
                })
                .collect()
        };

        for sink in targets {
            match sink.push(OutboundMessage::Presence {
                event: event.clone(),
            }) {
                PushOutcome::Queued => self.metrics.inc_delivered(),
                PushOutcome::DroppedOldest => {
                    self.metrics.inc_delivered();
                    self.metrics.inc_dropped();
                    debug!(session_id = %sink.session_id, "Client queue full, dropped oldest");
                }
                PushOutcome::Closed => {}
            }
        }
    }

    /// Project and user of a session, preferring the local sink.
    async fn identity(&self, session_id: SessionId) -> AppResult<Option<(ProjectId, UserId)>> {
        if let Some(sink) = self.locals.get(&session_id) {
            return Ok(Some((sink.project_id, sink.user_id)));
        }
        Ok(self
            .store
            .find_by_id(session_id)
            .await?
            .map(|s| (s.project_id, s.user_id)))
    }

    /// Close and remove a local sink. The flag reports whether the project
    /// has no local clients left.
    fn detach_sink(&self, session_id: SessionId) -> Option<(Arc<ClientSink>, bool)> {
        let (_, sink) = self.locals.remove(&session_id)?;
        sink.close();
        let idle = match self.projects.get_mut(&sink.project_id) {
            Some(mut state) => {
                state.sinks.remove(&session_id);
                state.sinks.is_empty()
            }
            None => false,
        };
        Some((sink, idle))
    }

    /// Detach a sink and drop the project subscription if it was the last one.
    async fn release(&self, session_id: SessionId) -> Option<Arc<ClientSink>> {
        let (sink, idle) = self.detach_sink(session_id)?;
        if idle {
            self.stop_consumer(sink.project_id).await;
        }
        Some(sink)
    }

    async fn stop_consumer(&self, project_id: ProjectId) {
        let Some((_, state)) = self
            .projects
            .remove_if(&project_id, |_, state| state.sinks.is_empty())
        else {
            return;
        };
        if let Some(consumer) = state.consumer {
            consumer.abort();
            let _ = consumer.await;
        }
        self.bus.unsubscribe(project_id).await;
        debug!(%project_id, "Stopped watching project");
    }

    /// Forget an idle project. Returns whether it was removed.
    fn release_if_idle(&self, project_id: ProjectId) -> bool {
        self.projects
            .remove_if(&project_id, |_, state| state.sinks.is_empty())
            .is_some()
    }

    async fn ensure_consumer(self: &Arc<Self>, project_id: ProjectId) {
        let stream = self.bus.subscribe(project_id).await;
        if let Some(mut state) = self.projects.get_mut(&project_id) {
            if state.consumer.is_none() {
                state.consumer = Some(self.spawn_consumer(project_id, stream));
            }
        }
    }

    fn spawn_consumer(self: &Arc<Self>, project_id: ProjectId, stream: PresenceStream) -> JoinHandle<()> {
        debug!(%project_id, "Watching project");
        tokio::spawn(consume(Arc::downgrade(self), project_id, stream))
    }
}

/// Subscription consumer for one project.
///
/// Holds only a weak reference so a dropped hub ends the task.
async fn consume(hub: Weak<LocalPresenceHub>, project_id: ProjectId, mut stream: PresenceStream) {
    'resubscribe: loop {
        while let Some(event) = stream.next().await {
            let Some(hub) = hub.upgrade() else {
                return;
            };
            if event.project_id != project_id {
                continue;
            }
            hub.handle_inbound_event(event);
            if hub.release_if_idle(project_id) {
                break 'resubscribe;
            }
        }

        let Some(current) = hub.upgrade() else {
            return;
        };
        if current.bus.mode() == BusMode::Disabled {
            return;
        }
        drop(current);

        warn!(%project_id, "Presence stream ended, resubscribing");
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;

        let Some(current) = hub.upgrade() else {
            return;
        };
        stream = current.bus.subscribe(project_id).await;
        current.resync_project(project_id).await;
    }

    drop(stream);
    if let Some(hub) = hub.upgrade() {
        hub.bus.unsubscribe(project_id).await;
        debug!(%project_id, "Stopped watching project");
    }
}

#[async_trait]
impl PresenceNotifier for LocalPresenceHub {
    async fn session_reaped(&self, session: &Session) {
        self.metrics.inc_reaped();
        self.release(session.id).await;
        self.throttle.forget(session.id);
        info!(session_id = %session.id, project_id = %session.project_id, "Session reaped");
        self.announce(PresenceEvent::leave(session));
    }
}

impl Drop for LocalPresenceHub {
    fn drop(&mut self) {
        for mut entry in self.projects.iter_mut() {
            if let Some(consumer) = entry.consumer.take() {
                consumer.abort();
            }
        }
    }
}
