//! Periodic session garbage collection
//!
//! The only path that frees sessions: detached streams past their grace
//! period and sessions idle past the absolute ceiling, whatever their state.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::TransportConfig;
use crate::transport::session::SessionRegistry;

pub fn spawn(registry: Arc<SessionRegistry>, options: TransportConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(options.reap_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let retired = registry.reap(
                Instant::now(),
                options.detach_grace,
                options.idle_timeout,
            );
            if retired > 0 {
                debug!(retired, remaining = registry.len(), "reaped stale sessions");
            }
        }
    })
}
