//! Read-mostly concurrency engine built on immutable versioned snapshots.
//!
//! Shared state is published as immutable instances behind atomically
//! exchangeable references. Readers open short critical sections against a
//! grace domain and render from whatever they capture; writers build a
//! replacement, exchange the reference, and retire the superseded instance
//! through the domain, which destroys it only once no reader from before
//! the exchange is still inside its section. Readers are never blocked by
//! writers and never observe a torn value.
//!
//! Two writers exist: a one-shot background publisher and the recovery
//! controller, which raises the recovery flag, waits out the grace period,
//! transforms the payload under its write lock, and lowers the flag again.
//! Readers render a fixed degraded response while the flag is visible.

/// Engine and worker configuration.
pub mod config;
/// Engine lifecycle: task spawning, explicit recovery trigger, shutdown.
pub mod engine;
/// Error types for the write paths and startup.
pub mod error;
/// Reader workers and render sinks.
pub mod reader;
/// The shared server context.
pub mod server;
/// Snapshot entities and the exchangeable cell publishing them.
pub mod snapshot;
/// The payload-transform seam.
pub mod transform;

mod publisher;
mod recovery;

pub use config::{EngineConfig, WorkerSpec};
pub use engine::Engine;
pub use error::{EngineError, Result, SnapshotKind};
pub use reader::{MemorySink, RenderSink, Rendered, STATUS_OK, STATUS_UNAVAILABLE, TracingSink};
pub use server::Server;
pub use snapshot::{ClockStamp, Headers, OperationalState, Payload, SnapshotCell};
pub use transform::{DefaultTransform, PayloadTransform};
