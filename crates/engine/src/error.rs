//! Error types for the engine's write paths and startup.

use thiserror::Error;

/// Snapshot entity kinds, named in errors and trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
	/// The operational-state snapshot.
	State,
	/// The payload snapshot.
	Payload,
	/// The clock snapshot.
	Clock,
	/// The headers snapshot.
	Headers,
}

impl std::fmt::Display for SnapshotKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::State => "state",
			Self::Payload => "payload",
			Self::Clock => "clock",
			Self::Headers => "headers",
		};
		f.write_str(name)
	}
}

/// Errors raised by the engine's write paths.
///
/// Readers never raise: a degraded render is a designed response, not a
/// failure. Cancellation is likewise not an error; loops observe their
/// token and return normally.
#[derive(Debug, Error)]
pub enum EngineError {
	/// A writer could not build its replacement snapshot. The transition is
	/// aborted and the previously-published snapshot stays authoritative;
	/// the initiating writer retries on its next cycle.
	#[error("failed to build {kind} snapshot: {reason}")]
	SnapshotBuild {
		/// Which snapshot could not be built.
		kind: SnapshotKind,
		/// What went wrong.
		reason: String,
	},

	/// The engine could not be brought up. Startup is all-or-nothing: either
	/// every initial snapshot is published or nothing runs.
	#[error("engine startup failed: {0}")]
	Startup(&'static str),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
