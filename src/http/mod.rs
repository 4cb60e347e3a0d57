//! HTTP surface for the streaming transport
//!
//! Provides the stream-open endpoint, the session-addressed message endpoint,
//! and general metadata endpoints.

pub mod handlers;
