//! Session lifecycle and registry
//!
//! A session is one logical stream plus its pending reply queue, addressed by
//! an unguessable handle. The registry owns the handle map; retirement is the
//! only path that frees a session and is always an atomic state transition,
//! so producers racing the reaper observe either a live session or none.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::transport::queue::{OutboundFrame, OutboundQueue, PushOutcome};

const HANDLE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stream attached, accepting deliveries.
    Open,
    /// Stream writer gone; the queue keeps buffering until the reaper runs.
    Detached,
    /// Terminal. The handle no longer resolves.
    Closed,
}

struct SessionMeta {
    state: SessionState,
    last_activity: Instant,
    detached_at: Option<Instant>,
}

pub struct Session {
    handle: String,
    created_at: DateTime<Utc>,
    queue: OutboundQueue,
    meta: Mutex<SessionMeta>,
}

impl Session {
    fn new(queue_capacity: usize) -> Self {
        Self {
            handle: generate_handle(),
            created_at: Utc::now(),
            queue: OutboundQueue::new(queue_capacity),
            meta: Mutex::new(SessionMeta {
                state: SessionState::Open,
                last_activity: Instant::now(),
                detached_at: None,
            }),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.meta.lock().state
    }

    /// Stamp the activity clock. Called on every successful enqueue and
    /// every frame written to the stream, pings included.
    pub fn touch(&self) {
        self.meta.lock().last_activity = Instant::now();
    }

    pub fn enqueue(&self, frame: OutboundFrame) -> PushOutcome {
        let outcome = self.queue.push(frame);
        if outcome == PushOutcome::Queued {
            self.touch();
        }
        outcome
    }

    pub async fn next_for_delivery(&self) -> Option<OutboundFrame> {
        self.queue.next_for_delivery().await
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    fn mark_detached(&self, now: Instant) {
        let mut meta = self.meta.lock();
        if meta.state == SessionState::Open {
            meta.state = SessionState::Detached;
            meta.detached_at = Some(now);
        }
    }

    fn close(&self) {
        self.meta.lock().state = SessionState::Closed;
        self.queue.close();
    }

    fn is_expired(&self, now: Instant, detach_grace: Duration, idle_timeout: Duration) -> bool {
        let meta = self.meta.lock();
        let idle = now.saturating_duration_since(meta.last_activity) >= idle_timeout;
        match meta.state {
            SessionState::Closed => true,
            SessionState::Detached => {
                idle || meta
                    .detached_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= detach_grace)
            }
            SessionState::Open => idle,
        }
    }
}

fn generate_handle() -> String {
    let mut bytes = [0u8; HANDLE_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let mut handle = String::with_capacity(HANDLE_BYTES * 2);
    for byte in bytes {
        write!(handle, "{byte:02x}").expect("hex handle formatting");
    }
    handle
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverOutcome {
    Delivered,
    /// Handle was never issued or has been retired.
    SessionNotFound,
    /// Push raced retirement; best-effort loss, the client re-establishes.
    DroppedClosed,
    /// Payload could not be buffered; the session has been retired.
    OverflowRetired,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue_capacity,
        }
    }

    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(self.queue_capacity));
        self.sessions
            .write()
            .insert(session.handle().to_string(), Arc::clone(&session));
        session
    }

    pub fn resolve(&self, handle: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(handle).cloned()
    }

    /// Stream writer gone. The session keeps buffering deliveries until the
    /// reaper's grace period expires, covering replies already in flight.
    pub fn mark_detached(&self, handle: &str) {
        if let Some(session) = self.resolve(handle) {
            session.mark_detached(Instant::now());
            debug!(session = handle, "stream detached");
        }
    }

    /// Drop the session and shut its queue down. Idempotent; pending frames
    /// remain drainable by a still-attached writer.
    pub fn retire(&self, handle: &str) {
        let removed = self.sessions.write().remove(handle);
        if let Some(session) = removed {
            session.close();
            info!(session = handle, "session retired");
        }
    }

    /// Push a frame to the session's queue, enforcing the overflow policy:
    /// a payload frame that cannot be buffered retires the session, with a
    /// best-effort terminal notice for a still-attached stream.
    pub fn deliver(&self, handle: &str, frame: OutboundFrame) -> DeliverOutcome {
        let Some(session) = self.resolve(handle) else {
            return DeliverOutcome::SessionNotFound;
        };

        match session.enqueue(frame) {
            PushOutcome::Queued => DeliverOutcome::Delivered,
            PushOutcome::Closed => DeliverOutcome::DroppedClosed,
            PushOutcome::Overflow => {
                let notice = json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32000,
                        "message": "outbound queue overflow, session retired"
                    }
                });
                session.queue.push_unbounded(OutboundFrame::message(notice.to_string()));
                self.retire(handle);
                warn!(session = handle, "outbound queue overflow, session retired");
                DeliverOutcome::OverflowRetired
            }
        }
    }

    /// One garbage-collection pass. `now` is injected so staleness policy is
    /// testable without waiting out real clocks.
    pub fn reap(&self, now: Instant, detach_grace: Duration, idle_timeout: Duration) -> usize {
        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, session)| session.is_expired(now, detach_grace, idle_timeout))
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in &expired {
            self.retire(handle);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(8)
    }

    #[test]
    fn handles_are_64_hex_chars_and_unique() {
        let registry = registry();
        let first = registry.create();
        let second = registry.create();

        assert_eq!(first.handle().len(), 64);
        assert!(first.handle().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first.handle(), second.handle());
    }

    #[test]
    fn resolve_finds_created_sessions() {
        let registry = registry();
        let session = registry.create();

        let resolved = registry.resolve(session.handle()).expect("session resolves");
        assert_eq!(resolved.handle(), session.handle());
        assert_eq!(resolved.state(), SessionState::Open);
        assert!(registry.resolve("not-a-handle").is_none());
    }

    #[test]
    fn mark_detached_transitions_open_sessions_only() {
        let registry = registry();
        let session = registry.create();

        registry.mark_detached(session.handle());
        assert_eq!(session.state(), SessionState::Detached);

        registry.retire(session.handle());
        registry.mark_detached(session.handle());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn retire_is_idempotent_and_unresolvable() {
        let registry = registry();
        let session = registry.create();
        let handle = session.handle().to_string();

        registry.retire(&handle);
        registry.retire(&handle);

        assert!(registry.resolve(&handle).is_none());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn deliver_to_unknown_handle_reports_not_found() {
        let registry = registry();
        let outcome = registry.deliver("missing", OutboundFrame::message("x"));
        assert_eq!(outcome, DeliverOutcome::SessionNotFound);
    }

    #[tokio::test]
    async fn deliver_overflow_retires_session_with_terminal_notice() {
        let registry = SessionRegistry::new(1);
        let session = registry.create();
        let handle = session.handle().to_string();

        assert_eq!(
            registry.deliver(&handle, OutboundFrame::message("m1")),
            DeliverOutcome::Delivered
        );
        assert_eq!(
            registry.deliver(&handle, OutboundFrame::message("m2")),
            DeliverOutcome::OverflowRetired
        );

        // Not resurrectable under the same handle.
        assert!(registry.resolve(&handle).is_none());
        assert_eq!(
            registry.deliver(&handle, OutboundFrame::message("m3")),
            DeliverOutcome::SessionNotFound
        );

        // A still-attached writer drains the pending frame plus the notice.
        let first = session.next_for_delivery().await.expect("pending frame");
        assert_eq!(first.payload, "m1");
        let notice = session.next_for_delivery().await.expect("overload notice");
        assert!(notice.payload.contains("overflow"));
        assert_eq!(session.next_for_delivery().await, None);
    }

    #[test]
    fn reap_retires_detached_sessions_past_grace() {
        let registry = registry();
        let session = registry.create();
        registry.mark_detached(session.handle());

        let grace = Duration::from_secs(30);
        let idle = Duration::from_secs(300);

        assert_eq!(registry.reap(Instant::now(), grace, idle), 0);
        assert_eq!(
            registry.reap(Instant::now() + Duration::from_secs(31), grace, idle),
            1
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn reap_retires_idle_open_sessions_past_ceiling() {
        let registry = registry();
        let _session = registry.create();

        let grace = Duration::from_secs(30);
        let idle = Duration::from_secs(300);

        assert_eq!(registry.reap(Instant::now(), grace, idle), 0);
        assert_eq!(
            registry.reap(Instant::now() + Duration::from_secs(301), grace, idle),
            1
        );
    }

    #[test]
    fn successful_delivery_stamps_activity() {
        let registry = registry();
        let session = registry.create();

        let grace = Duration::from_secs(30);
        let idle = Duration::from_secs(300);

        assert_eq!(
            registry.deliver(session.handle(), OutboundFrame::message("x")),
            DeliverOutcome::Delivered
        );
        assert_eq!(registry.reap(Instant::now(), grace, idle), 0);
        assert_eq!(
            registry.reap(Instant::now() + Duration::from_secs(301), grace, idle),
            1
        );
    }
}
