//! Per-session outbound frame buffer
//!
//! Ordered FIFO of frames awaiting delivery to the session's stream. Pushes
//! never block the producer; the attached stream writer suspends on
//! `next_for_delivery` until a frame arrives or the queue shuts down.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    EndpointAnnouncement,
    JsonrpcPayload,
    Ping,
}

impl FrameKind {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::EndpointAnnouncement => "endpoint",
            Self::JsonrpcPayload => "message",
            Self::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub kind: FrameKind,
    pub payload: String,
}

impl OutboundFrame {
    pub fn endpoint(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::EndpointAnnouncement,
            payload: payload.into(),
        }
    }

    pub fn message(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::JsonrpcPayload,
            payload: payload.into(),
        }
    }

    pub fn ping(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Ping,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame buffered; delivery order matches push order.
    Queued,
    /// Queue already shut down (producer raced session retirement); the
    /// frame is discarded and the loss is the caller's to log.
    Closed,
    /// Capacity exhausted with only payload frames pending. The frame was
    /// not buffered; the session must be retired so the loss is not silent.
    Overflow,
}

struct QueueState {
    frames: VecDeque<OutboundFrame>,
    closed: bool,
}

pub struct OutboundQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append a frame without blocking. At capacity, the oldest pending ping
    /// is evicted before any payload frame; if only payload frames remain the
    /// push fails with `Overflow`.
    pub fn push(&self, frame: OutboundFrame) -> PushOutcome {
        {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            if state.frames.len() >= self.capacity {
                match state
                    .frames
                    .iter()
                    .position(|pending| pending.kind == FrameKind::Ping)
                {
                    Some(index) => {
                        let _ = state.frames.remove(index);
                    }
                    None => return PushOutcome::Overflow,
                }
            }

            state.frames.push_back(frame);
        }

        self.notify.notify_one();
        PushOutcome::Queued
    }

    /// Append past capacity. Reserved for the terminal overload notice that
    /// precedes retirement; silently discarded if the queue is closed.
    pub fn push_unbounded(&self, frame: OutboundFrame) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.frames.push_back(frame);
        }

        self.notify.notify_one();
    }

    /// Next frame in push order. Suspends while the queue is empty; resolves
    /// to `None` once the queue is closed and fully drained.
    pub async fn next_for_delivery(&self) -> Option<OutboundFrame> {
        loop {
            // Arm the waiter before checking state so a push between the
            // check and the await cannot be missed.
            let notified = self.notify.notified();

            {
                let mut state = self.state.lock();
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Shut the queue down. Pending frames stay drainable; subsequent pushes
    /// are no-ops and a suspended consumer wakes up.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn delivers_in_push_order() {
        let queue = OutboundQueue::new(8);
        assert_eq!(queue.push(OutboundFrame::message("a")), PushOutcome::Queued);
        assert_eq!(queue.push(OutboundFrame::message("b")), PushOutcome::Queued);
        assert_eq!(queue.push(OutboundFrame::message("c")), PushOutcome::Queued);

        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("a".to_string()));
        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("b".to_string()));
        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("c".to_string()));
    }

    #[tokio::test]
    async fn consumer_wakes_on_push() {
        let queue = Arc::new(OutboundQueue::new(8));
        let consumer = Arc::clone(&queue);

        let waiter = tokio::spawn(async move { consumer.next_for_delivery().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(OutboundFrame::message("wake"));

        let frame = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("consumer should wake")
            .expect("consumer task")
            .expect("frame delivered");
        assert_eq!(frame.payload, "wake");
    }

    #[tokio::test]
    async fn drops_oldest_ping_before_payload_frames() {
        let queue = OutboundQueue::new(2);
        queue.push(OutboundFrame::ping("p1"));
        queue.push(OutboundFrame::message("m1"));

        assert_eq!(queue.push(OutboundFrame::message("m2")), PushOutcome::Queued);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("m1".to_string()));
        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("m2".to_string()));
    }

    #[tokio::test]
    async fn overflow_with_only_payload_frames_is_signalled() {
        let queue = OutboundQueue::new(2);
        queue.push(OutboundFrame::message("m1"));
        queue.push(OutboundFrame::message("m2"));

        assert_eq!(
            queue.push(OutboundFrame::message("m3")),
            PushOutcome::Overflow
        );
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn push_after_close_is_a_noop() {
        let queue = OutboundQueue::new(8);
        queue.close();

        assert_eq!(
            queue.push(OutboundFrame::message("late")),
            PushOutcome::Closed
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn close_drains_pending_then_ends() {
        let queue = OutboundQueue::new(8);
        queue.push(OutboundFrame::message("last"));
        queue.close();

        assert_eq!(queue.next_for_delivery().await.map(|f| f.payload), Some("last".to_string()));
        assert_eq!(queue.next_for_delivery().await, None);
    }

    #[tokio::test]
    async fn close_wakes_suspended_consumer() {
        let queue = Arc::new(OutboundQueue::new(8));
        let consumer = Arc::clone(&queue);

        let waiter = tokio::spawn(async move { consumer.next_for_delivery().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let frame = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("consumer should wake on close")
            .expect("consumer task");
        assert_eq!(frame, None);
    }
}
