//! Session-addressed streaming transport
//!
//! Clients open a long-lived event stream, receive a unique session handle in
//! the first frame, and POST JSON-RPC requests against that handle; replies
//! travel back asynchronously down the stream.

pub mod ingress;
pub mod queue;
pub mod reaper;
pub mod session;
pub mod stream;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGE_PATH: &str = "/sse/message";
pub const SESSION_ID_PARAM: &str = "sessionId";
