//! Event-stream writer
//!
//! Drives one open stream: announces the message endpoint first, then races
//! the session's outbound queue against the ping timer. Dropping the stream
//! (client disconnect, write failure) detaches the session; the reaper frees
//! it after the grace period.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::Event;
use chrono::{SecondsFormat, Utc};
use futures::{stream, Stream};

use crate::transport::queue::OutboundFrame;
use crate::transport::session::{Session, SessionRegistry};
use crate::transport::{MESSAGE_PATH, SESSION_ID_PARAM};

enum WriterPhase {
    Announcing,
    Streaming,
}

/// The body of one `GET /sse` response. Ends when the session is retired;
/// the `Drop` impl covers every other exit path, including the client
/// vanishing mid-stream.
pub struct SessionEventStream {
    inner: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>,
    registry: Arc<SessionRegistry>,
    handle: String,
}

impl SessionEventStream {
    pub fn attach(
        session: Arc<Session>,
        registry: Arc<SessionRegistry>,
        ping_interval: Duration,
    ) -> Self {
        let handle = session.handle().to_string();

        let inner = stream::unfold(WriterPhase::Announcing, move |phase| {
            let session = Arc::clone(&session);
            async move {
                match phase {
                    WriterPhase::Announcing => {
                        let frame = OutboundFrame::endpoint(format!(
                            "{MESSAGE_PATH}?{SESSION_ID_PARAM}={}",
                            session.handle()
                        ));
                        session.touch();
                        Some((Ok(frame_event(&frame)), WriterPhase::Streaming))
                    }
                    WriterPhase::Streaming => {
                        // biased: a ready payload frame always beats an
                        // elapsed ping timer.
                        let frame = tokio::select! {
                            biased;
                            queued = session.next_for_delivery() => match queued {
                                Some(frame) => frame,
                                None => return None,
                            },
                            () = tokio::time::sleep(ping_interval) => OutboundFrame::ping(
                                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                            ),
                        };
                        session.touch();
                        Some((Ok(frame_event(&frame)), WriterPhase::Streaming))
                    }
                }
            }
        });

        Self {
            inner: Box::pin(inner),
            registry,
            handle,
        }
    }
}

fn frame_event(frame: &OutboundFrame) -> Event {
    Event::default()
        .event(frame.kind.event_name())
        .data(&frame.payload)
}

impl Stream for SessionEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for SessionEventStream {
    fn drop(&mut self) {
        self.registry.mark_detached(&self.handle);
    }
}
