//! Inbound JSON-RPC acceptance
//!
//! The HTTP handler acknowledges a request as soon as the session handle
//! resolves; the method itself runs here as a background task so slow
//! backend calls never tie up the acceptance path. Replies are pushed onto
//! the session's outbound queue and travel back over the stream.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::tools::build_tools_list;
use crate::mcp::rpc::is_json_rpc_error;
use crate::mcp::server::handle_json_rpc_value;
use crate::transport::queue::OutboundFrame;
use crate::transport::session::DeliverOutcome;
use crate::AppState;

/// Accept an already-validated request for asynchronous dispatch.
pub fn accept(state: AppState, handle: String, payload: Value) {
    tokio::spawn(dispatch(state, handle, payload));
}

pub async fn dispatch(state: AppState, handle: String, payload: Value) {
    let method = payload
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let Some(reply) = handle_json_rpc_value(&state, payload).await else {
        // Notification; nothing travels back.
        return;
    };

    let succeeded = !is_json_rpc_error(&reply);
    deliver_payload(&state, &handle, reply);

    // Clients that initialize but never ask for the catalog still get it.
    if succeeded && method.as_deref() == Some("initialize") {
        deliver_payload(&state, &handle, tools_changed_notification());
    }
}

fn tools_changed_notification() -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/tools/list_changed",
        "params": {
            "tools": build_tools_list()
        }
    })
}

fn deliver_payload(state: &AppState, handle: &str, payload: Value) {
    let frame = OutboundFrame::message(payload.to_string());
    match state.sessions.deliver(handle, frame) {
        DeliverOutcome::Delivered => {}
        DeliverOutcome::SessionNotFound | DeliverOutcome::DroppedClosed => {
            debug!(session = handle, "reply dropped, session retired before delivery");
        }
        DeliverOutcome::OverflowRetired => {
            warn!(session = handle, "reply overflowed outbound queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tools_changed_notification;

    #[test]
    fn catalog_notification_carries_all_tools() {
        let notification = tools_changed_notification();

        assert_eq!(notification["jsonrpc"], "2.0");
        assert_eq!(notification["method"], "notifications/tools/list_changed");
        assert_eq!(
            notification["params"]["tools"]
                .as_array()
                .map(Vec::len),
            Some(5)
        );
    }
}
