//! Event system for UI decoupling.
//!
//! Allows a CLI (or any other front-end) to follow a relay session without
//! reaching into the pump loop.

use crate::capture::Direction;

/// Events emitted by a relay session.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Both endpoints are open and the pump is starting.
    SessionStarted {
        device: String,
        client_path: String,
    },
    /// One chunk moved across, already logged and forwarded.
    Chunk { direction: Direction, len: usize },
    /// The session reached its final state, with per-direction totals.
    SessionStopped {
        from_client: u64,
        from_device: u64,
    },
    /// Fatal endpoint failure; the session is forced to stop.
    Failed { message: String },
}

/// Observer trait for receiving relay events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait RelayObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &RelayEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl RelayObserver for NullObserver {
    fn on_event(&self, _event: &RelayEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_event(&self, event: &RelayEvent) {
        match event {
            RelayEvent::SessionStarted {
                device,
                client_path,
            } => {
                tracing::info!(device = %device, client_path = %client_path, "Relay started");
            }
            RelayEvent::Chunk { direction, len } => {
                tracing::debug!(direction = %direction, len = len, "Chunk relayed");
            }
            RelayEvent::SessionStopped {
                from_client,
                from_device,
            } => {
                tracing::info!(from_client, from_device, "Relay stopped");
            }
            RelayEvent::Failed { message } => {
                tracing::error!("Relay failed: {}", message);
            }
        }
    }
}
